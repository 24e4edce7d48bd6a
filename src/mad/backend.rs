use std::io;
use std::time::Duration;

use super::wire::*;

/// File descriptor of an opened `umad` port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct PortFd(pub i32);

/// ID of a registered management class agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct AgentId(pub u32);

/// Management class registration attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegAttr {
    pub mgmt_class: u8,
    pub mgmt_class_version: u8,

    /// Methods of unsolicited MADs the agent wants to receive, one bit per
    /// method number. Without them, an agent only sees responses to its own
    /// requests.
    pub method_mask: [u64; 2],
}

impl RegAttr {
    /// The Communication Manager class, receiving the peer's `Get()` query
    /// and `Send()` reply.
    pub const CM: Self = Self {
        mgmt_class: UMAD_CLASS_CM,
        mgmt_class_version: UMAD_CM_CLASS_VERSION,
        method_mask: [(1 << UMAD_METHOD_GET) | (1 << UMAD_METHOD_SEND), 0],
    };

    /// Check whether unsolicited MADs of `method` reach the agent.
    #[inline]
    pub fn accepts(&self, method: u8) -> bool {
        let (word, bit) = ((method / 64) as usize, method % 64);
        self.method_mask
            .get(word)
            .is_some_and(|mask| mask & (1 << bit) != 0)
    }
}

/// Result of opening a `umad` port.
///
/// Missing permission is kept apart from other failures, as it only means
/// that the process may not use MADs and must not be reported as an error.
#[derive(Debug)]
pub enum OpenOutcome {
    /// The port is open.
    Opened(PortFd),

    /// The process lacks the privilege to open the port.
    PermissionDenied,

    /// Opening the port failed for any other reason.
    Failed(io::Error),
}

/// Result of a successful receive call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecvOutcome {
    /// A MAD arrived in time.
    Received(Datagram),

    /// Nothing arrived within the timeout.
    TimedOut,
}

/// A management datagram library.
///
/// Implementations own no per-device state: the channel manager keeps the
/// descriptors and agents and hands them back in every call.
pub trait MadBackend: Send + Sync {
    /// Initialize the library. Paired with [`MadBackend::done`].
    fn init(&self) -> io::Result<()>;

    /// Finalize the library.
    fn done(&self);

    /// Open the `umad` device of the given port (1-based).
    fn open_port(&self, dev_name: &str, port_num: u8) -> OpenOutcome;

    /// Close a port opened by [`MadBackend::open_port`].
    fn close_port(&self, fd: PortFd);

    /// Register a management class agent on an opened port.
    fn register(&self, fd: PortFd, attr: &RegAttr) -> io::Result<AgentId>;

    /// Unregister an agent. Must happen before its port is closed.
    fn unregister(&self, fd: PortFd, agent: AgentId);

    /// Send a MAD through an agent.
    fn send(
        &self,
        fd: PortFd,
        agent: AgentId,
        datagram: &Datagram,
        timeout: Duration,
    ) -> io::Result<()>;

    /// Wait for a MAD on a port.
    fn recv(&self, fd: PortFd, timeout: Duration) -> io::Result<RecvOutcome>;
}
