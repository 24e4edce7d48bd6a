//! One-shot `ClassPortInfo` exchange.
//!
//! ```text
//! initiator: IDLE -> send GET  -> AWAIT_REPLY -> { timeout: SKIP | reply: DONE }
//! responder: IDLE -> AWAIT_QUERY -> { timeout: SKIP | query: send SEND -> DONE }
//! ```
//!
//! Both sides are terminal after one round and never retry.

use super::{EceChannels, EceDevice, PortChannel};
use crate::error::{EceError, Result};
use crate::mad::*;

/// Why an exchange did not happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// ECE is not set up for this device.
    Disabled,

    /// The peer did not speak within the timeout; it is a legacy peer.
    PeerSilent,
}

/// Result of a capability exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapOutcome {
    /// No exchange; go on with legacy connection establishment.
    Skipped(SkipReason),

    /// The exchange completed. Holds the MAD received from the peer: the
    /// reply for the initiator, the query for the responder.
    Exchanged(Datagram),
}

impl CapOutcome {
    /// Check whether the exchange was skipped.
    #[inline]
    pub fn is_skipped(&self) -> bool {
        matches!(self, CapOutcome::Skipped(_))
    }

    /// Get the MAD received from the peer, if any.
    #[inline]
    pub fn datagram(&self) -> Option<&Datagram> {
        match self {
            CapOutcome::Exchanged(datagram) => Some(datagram),
            CapOutcome::Skipped(_) => None,
        }
    }
}

impl EceDevice {
    /// Get the channels and the channel of a port, or `None` if ECE is off.
    fn port_channel(&self, port_num: u8) -> Result<Option<(&EceChannels, PortChannel)>> {
        let Some(chans) = self.ece.as_ref() else {
            return Ok(None);
        };
        let chan = chans.port(port_num).ok_or(EceError::InvalidPort {
            port_num,
            port_count: self.port_cnt,
        })?;
        Ok(Some((chans, *chan)))
    }

    /// Initiator side: query the peer behind the permissive LID for ECE
    /// support.
    ///
    /// See [`request_capability_to`](Self::request_capability_to).
    #[inline]
    pub fn request_capability(&self, port_num: u8) -> Result<CapOutcome> {
        self.request_capability_to(port_num, MadAddr::default())
    }

    /// Initiator side: send a `ClassPortInfo` `Get()` to `peer` and wait for
    /// its reply.
    ///
    /// Returns [`CapOutcome::Skipped`] without touching the port if ECE is
    /// disabled, or if no reply arrives in time. Other transport errors are
    /// returned as-is.
    pub fn request_capability_to(&self, port_num: u8, peer: MadAddr) -> Result<CapOutcome> {
        let Some((chans, chan)) = self.port_channel(port_num)? else {
            return Ok(CapOutcome::Skipped(SkipReason::Disabled));
        };
        let subsys = chans.subsystem();
        let backend = subsys.backend();
        let timeout = self.config.timeout();

        let query = Datagram {
            addr: peer,
            mad: Mad::class_port_info(UMAD_METHOD_GET, subsys.next_tid(), self.config.attr_mod),
        };
        let start = quanta::Instant::now();
        backend
            .send(chan.fd, chan.agent, &query, timeout)
            .map_err(|source| EceError::Send { port_num, source })?;

        match backend.recv(chan.fd, timeout) {
            Ok(RecvOutcome::TimedOut) => {
                log::debug!(
                    "ece: no reply on {}:{} within {:?}, peer has no ECE",
                    self.name,
                    port_num,
                    timeout
                );
                Ok(CapOutcome::Skipped(SkipReason::PeerSilent))
            }
            Ok(RecvOutcome::Received(reply)) => {
                log::debug!(
                    "ece: reply on {}:{} after {:?}: {:?}",
                    self.name,
                    port_num,
                    quanta::Instant::now().duration_since(start),
                    reply.mad
                );
                Ok(CapOutcome::Exchanged(reply))
            }
            Err(source) => Err(EceError::Recv { port_num, source }),
        }
    }

    /// Responder side: wait for the peer's `ClassPortInfo` query and answer
    /// it with a `Send()`.
    ///
    /// Returns [`CapOutcome::Skipped`] without sending anything if ECE is
    /// disabled, or if no query arrives in time.
    pub fn reply_capability(&self, port_num: u8) -> Result<CapOutcome> {
        let Some((chans, chan)) = self.port_channel(port_num)? else {
            return Ok(CapOutcome::Skipped(SkipReason::Disabled));
        };
        let backend = chans.subsystem().backend();
        let timeout = self.config.timeout();

        let query = match backend.recv(chan.fd, timeout) {
            Ok(RecvOutcome::Received(query)) => query,
            Ok(RecvOutcome::TimedOut) => {
                log::debug!(
                    "ece: no query on {}:{} within {:?}, peer has no ECE",
                    self.name,
                    port_num,
                    timeout
                );
                return Ok(CapOutcome::Skipped(SkipReason::PeerSilent));
            }
            Err(source) => return Err(EceError::Recv { port_num, source }),
        };

        let reply = Datagram {
            addr: query.addr,
            mad: Mad::class_port_info(UMAD_METHOD_SEND, query.mad.hdr.tid, self.config.attr_mod),
        };
        backend
            .send(chan.fd, chan.agent, &reply, timeout)
            .map_err(|source| EceError::Send { port_num, source })?;
        log::debug!(
            "ece: answered query {:#x} on {}:{}",
            query.mad.hdr.tid,
            self.name,
            port_num
        );
        Ok(CapOutcome::Exchanged(query))
    }
}
