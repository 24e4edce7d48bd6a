//! Per-port CM MAD channels.

use std::fmt;

use super::EceDevice;
use crate::error::{EceError, Result};
use crate::mad::*;

/// An opened `umad` port with a registered CM agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortChannel {
    /// Port number (1-based).
    pub port_num: u8,

    /// Port file descriptor.
    pub fd: PortFd,

    /// CM class agent.
    pub agent: AgentId,
}

/// CM MAD channels of every port of a device.
///
/// Dropping this unregisters and closes every port, then releases the MAD
/// subsystem.
pub struct EceChannels {
    ports: Vec<PortChannel>,

    // Declared after `ports`: dropped only after every port is closed.
    lease: SubsystemLease,
}

impl EceChannels {
    /// Get the channel of a port (1-based).
    #[inline]
    pub fn port(&self, port_num: u8) -> Option<&PortChannel> {
        port_num
            .checked_sub(1)
            .and_then(|idx| self.ports.get(idx as usize))
    }

    /// Get all channels, indexed by port number minus one.
    #[inline]
    pub fn ports(&self) -> &[PortChannel] {
        &self.ports
    }

    #[inline]
    pub(super) fn subsystem(&self) -> &MadSubsystem {
        self.lease.subsystem()
    }
}

impl fmt::Debug for EceChannels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.ports).finish()
    }
}

impl Drop for EceChannels {
    fn drop(&mut self) {
        let backend = self.lease.subsystem().backend();
        for port in self.ports.drain(..) {
            backend.unregister(port.fd, port.agent);
            backend.close_port(port.fd);
        }
    }
}

/// A port opened but without an agent yet. Closed on drop.
struct OpenedPort<'a> {
    backend: &'a dyn MadBackend,
    port_num: u8,
    fd: PortFd,
}

impl OpenedPort<'_> {
    fn register(self, attr: &RegAttr) -> std::io::Result<PortChannel> {
        let agent = self.backend.register(self.fd, attr)?;
        let chan = PortChannel {
            port_num: self.port_num,
            fd: self.fd,
            agent,
        };
        std::mem::forget(self);
        Ok(chan)
    }
}

impl Drop for OpenedPort<'_> {
    fn drop(&mut self) {
        self.backend.close_port(self.fd);
    }
}

impl EceDevice {
    /// Open and register a CM MAD channel on every port of the device.
    ///
    /// Does nothing if the channels are already set up. On return, either
    /// every port has a channel, or none has; in the latter case ECE stays
    /// disabled for this device. Missing MAD support or missing permission
    /// to open a port disables ECE and still returns `Ok(())`.
    pub fn init(&mut self) -> Result<()> {
        if self.ece.is_some() {
            return Ok(());
        }
        if !self.config.enabled {
            log::debug!("ece: disabled by configuration");
            return Ok(());
        }
        if !self.filter.matches(&self.name) {
            log::info!("ece: {} excluded by device filter", self.name);
            return Ok(());
        }

        let mut ports = Vec::new();
        ports
            .try_reserve_exact(self.port_cnt as usize)
            .map_err(|_| EceError::OutOfMemory)?;

        let lease = match self.subsys.acquire() {
            Ok(lease) => lease,
            Err(e) => {
                // No MAD support on this system, fall back to legacy mode.
                log::info!("ece: MAD subsystem unavailable ({}), ECE disabled", e);
                return Ok(());
            }
        };

        // Any early return below drops `chans`, which tears down the ports
        // set up so far and then the lease.
        let mut chans = EceChannels { ports, lease };
        let backend = self.subsys.backend();
        for port_num in 1..=self.port_cnt {
            let fd = match backend.open_port(&self.name, port_num) {
                OpenOutcome::Opened(fd) => fd,
                OpenOutcome::PermissionDenied => {
                    log::info!(
                        "ece: no permission to open {}:{}, ECE disabled",
                        self.name,
                        port_num
                    );
                    return Ok(());
                }
                OpenOutcome::Failed(source) => {
                    log::warn!("ece: cannot open {}:{}: {}", self.name, port_num, source);
                    return Err(EceError::OpenPort {
                        dev_name: self.name.clone(),
                        port_num,
                        source,
                    });
                }
            };

            let opened = OpenedPort {
                backend,
                port_num,
                fd,
            };
            let chan = opened.register(&RegAttr::CM).map_err(|source| {
                log::warn!(
                    "ece: cannot register CM agent on {}:{}: {}",
                    self.name,
                    port_num,
                    source
                );
                EceError::Register {
                    dev_name: self.name.clone(),
                    port_num,
                    source,
                }
            })?;
            chans.ports.push(chan);
        }

        log::debug!("ece: CM channels ready on {}: {:?}", self.name, chans);
        self.ece = Some(chans);
        Ok(())
    }

    /// Unregister and close the CM MAD channels of every port.
    ///
    /// Does nothing if the channels are not set up.
    pub fn close(&mut self) {
        if let Some(chans) = self.ece.take() {
            log::debug!("ece: closing CM channels on {}", self.name);
            drop(chans);
        }
    }
}
