use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::backend::MadBackend;

/// Reference-counted owner of a process-wide MAD library.
///
/// The library is initialized when the first lease is taken and finalized
/// when the last lease is dropped, so init/done calls stay balanced no
/// matter how many devices use it or how their setup fails.
pub struct MadSubsystem {
    backend: Box<dyn MadBackend>,
    users: Mutex<usize>,
    next_tid: AtomicU64,
}

impl fmt::Debug for MadSubsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MadSubsystem")
            .field("users", &self.users())
            .finish()
    }
}

impl MadSubsystem {
    /// Wrap a MAD library. The library is not initialized until the first
    /// [`acquire`](Self::acquire).
    pub fn new(backend: impl MadBackend + 'static) -> Arc<Self> {
        Arc::new(Self {
            backend: Box::new(backend),
            users: Mutex::new(0),
            next_tid: AtomicU64::new((std::process::id() as u64) << 32),
        })
    }

    fn lock_users(&self) -> MutexGuard<'_, usize> {
        self.users.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the underlying MAD library.
    #[inline]
    pub fn backend(&self) -> &dyn MadBackend {
        self.backend.as_ref()
    }

    /// Take a lease on the library, initializing it if this is the first one.
    ///
    /// If initialization fails, no lease is taken and the next call retries.
    pub fn acquire(self: &Arc<Self>) -> io::Result<SubsystemLease> {
        let mut users = self.lock_users();
        if *users == 0 {
            self.backend.init()?;
            log::debug!("ece: MAD subsystem initialized");
        }
        *users += 1;
        Ok(SubsystemLease {
            subsys: Arc::clone(self),
        })
    }

    fn release(&self) {
        let mut users = self.lock_users();
        debug_assert!(*users > 0, "unbalanced MAD subsystem release");
        *users -= 1;
        if *users == 0 {
            self.backend.done();
            log::debug!("ece: MAD subsystem finalized");
        }
    }

    /// Number of live leases.
    pub fn users(&self) -> usize {
        *self.lock_users()
    }

    /// Get a fresh MAD transaction ID.
    pub fn next_tid(&self) -> u64 {
        self.next_tid.fetch_add(1, Ordering::Relaxed)
    }
}

/// A live reference on a [`MadSubsystem`]. Released on drop.
#[must_use]
pub struct SubsystemLease {
    subsys: Arc<MadSubsystem>,
}

impl SubsystemLease {
    /// Get the leased subsystem.
    #[inline]
    pub fn subsystem(&self) -> &Arc<MadSubsystem> {
        &self.subsys
    }
}

impl fmt::Debug for SubsystemLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SubsystemLease").field(&self.subsys).finish()
    }
}

impl Drop for SubsystemLease {
    fn drop(&mut self) {
        self.subsys.release();
    }
}
