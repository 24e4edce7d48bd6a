//! Enhanced Connection Establishment (ECE) capability negotiation.
//!
//! ECE lets two RDMA CM peers exchange a `ClassPortInfo` MAD on the
//! Communication Manager class before or during connection establishment.
//! Whenever the exchange cannot happen, whether because the system has no
//! MAD support, the process may not open `umad` devices, or the peer never
//! answers, the connection silently falls back to legacy semantics.
//!
//! # Locking
//!
//! [`EceDevice::init`] and [`EceDevice::close`] take `&mut self`, while the
//! exchanges take `&self`. Put the device behind an `RwLock` (or a `Mutex`)
//! shared with the rest of the connection manager; exchanges on different
//! ports may then run concurrently under the read lock.
//!
//! # Example
//!
//! ```rust,ignore
//! use rrddmma_ece::prelude::*;
//!
//! let mut dev = EceDevice::new("mlx5_0", 1, rrddmma_ece::mad::umad::global())?;
//! dev.init()?;
//! match dev.request_capability(1)? {
//!     CapOutcome::Exchanged(reply) => println!("peer speaks ECE: {:?}", reply.mad),
//!     CapOutcome::Skipped(reason) => println!("legacy connection: {:?}", reason),
//! }
//! dev.close();
//! ```

mod channel;
mod negotiate;

use std::fmt;
use std::sync::Arc;

pub use self::channel::*;
pub use self::negotiate::*;
use crate::config::{DeviceFilter, EceConfig};
use crate::error::{EceError, Result};
use crate::mad::MadSubsystem;

/// ECE state of one RDMA device.
pub struct EceDevice {
    /// Device name, e.g., `mlx5_0`.
    name: String,

    /// Number of physical ports.
    port_cnt: u8,

    subsys: Arc<MadSubsystem>,
    config: EceConfig,
    filter: DeviceFilter,

    /// Per-port channels. `None` means ECE is disabled for this device.
    ece: Option<EceChannels>,
}

impl fmt::Debug for EceDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EceDevice")
            .field("name", &self.name)
            .field("port_cnt", &self.port_cnt)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl EceDevice {
    /// Create the ECE state of a device with the default configuration.
    /// No channel is opened until [`init`](Self::init).
    pub fn new(name: impl Into<String>, port_cnt: u8, subsys: Arc<MadSubsystem>) -> Result<Self> {
        Self::with_config(name, port_cnt, subsys, EceConfig::default())
    }

    /// Create the ECE state of a device.
    pub fn with_config(
        name: impl Into<String>,
        port_cnt: u8,
        subsys: Arc<MadSubsystem>,
        config: EceConfig,
    ) -> Result<Self> {
        if port_cnt == 0 {
            return Err(EceError::InvalidPortCount(port_cnt));
        }
        let filter = config.device_filter()?;
        Ok(Self {
            name: name.into(),
            port_cnt,
            subsys,
            config,
            filter,
            ece: None,
        })
    }

    /// Get the device name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of physical ports.
    #[inline]
    pub fn port_cnt(&self) -> u8 {
        self.port_cnt
    }

    /// Get the configuration.
    #[inline]
    pub fn config(&self) -> &EceConfig {
        &self.config
    }

    /// Check whether the per-port channels are set up.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.ece.is_some()
    }

    /// Get the per-port channels, if ECE is enabled.
    #[inline]
    pub fn channels(&self) -> Option<&EceChannels> {
        self.ece.as_ref()
    }
}
