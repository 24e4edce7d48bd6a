//! Test utilities: an in-memory MAD library with fault injection.

use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::mad::*;

/// Injected `open_port` result.
#[derive(Debug, Clone, Copy)]
pub(crate) enum OpenFault {
    PermissionDenied,
    Failed(io::ErrorKind),
}

/// Scripted `recv` result.
#[derive(Debug, Clone)]
pub(crate) enum ScriptedRecv {
    Datagram(Datagram),
    TimedOut,
    Failed(io::ErrorKind),
}

/// Observable state of [`MockBackend`].
#[derive(Debug, Default)]
pub(crate) struct MockState {
    // Fault injection.
    pub fail_init: bool,
    pub open_faults: HashMap<u8, OpenFault>,
    pub register_faults: HashSet<u8>,
    pub send_fault: Option<io::ErrorKind>,
    /// Per-port receive script; an empty script times out.
    pub recv_script: HashMap<u8, VecDeque<ScriptedRecv>>,

    // Call counters.
    pub init_calls: usize,
    pub done_calls: usize,
    pub opens: usize,
    pub closes: usize,
    pub registers: usize,
    pub unregisters: usize,
    pub recvs: usize,

    /// Sent datagrams with the port they went out of.
    pub sent: Vec<(u8, AgentId, Datagram)>,

    /// Currently open ports: fd -> port number.
    pub open_fds: HashMap<i32, u8>,
    /// Currently registered agents: fd -> agent.
    pub agents: HashMap<i32, AgentId>,

    /// Protocol violations, e.g. closing a port with a live agent.
    pub violations: Vec<String>,

    next_fd: i32,
    next_agent: u32,
}

/// In-memory [`MadBackend`]. Clones share state.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockBackend(Arc<Mutex<MockState>>);

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.0.lock().unwrap()
    }

    /// Queue a receive result on a port.
    pub fn script_recv(&self, port_num: u8, recv: ScriptedRecv) {
        self.state()
            .recv_script
            .entry(port_num)
            .or_default()
            .push_back(recv);
    }

    /// Assert that every acquired resource has been released.
    pub fn assert_balanced(&self) {
        let state = self.state();
        assert!(state.violations.is_empty(), "{:?}", state.violations);
        assert!(state.open_fds.is_empty(), "leaked ports {:?}", state.open_fds);
        assert!(state.agents.is_empty(), "leaked agents {:?}", state.agents);
        assert_eq!(state.opens, state.closes);
        assert_eq!(state.registers, state.unregisters);
        assert_eq!(state.init_calls, state.done_calls);
    }
}

impl MadBackend for MockBackend {
    fn init(&self) -> io::Result<()> {
        let mut state = self.state();
        if state.fail_init {
            return Err(io::Error::new(io::ErrorKind::Unsupported, "no umad"));
        }
        state.init_calls += 1;
        Ok(())
    }

    fn done(&self) {
        let mut state = self.state();
        if !state.open_fds.is_empty() {
            state.violations.push("done with open ports".to_owned());
        }
        state.done_calls += 1;
    }

    fn open_port(&self, _dev_name: &str, port_num: u8) -> OpenOutcome {
        let mut state = self.state();
        if state.init_calls <= state.done_calls {
            state.violations.push(format!("open port {} before init", port_num));
        }
        match state.open_faults.get(&port_num) {
            Some(OpenFault::PermissionDenied) => return OpenOutcome::PermissionDenied,
            Some(OpenFault::Failed(kind)) => return OpenOutcome::Failed((*kind).into()),
            None => {}
        }

        state.next_fd += 1;
        let fd = state.next_fd + 2;
        state.opens += 1;
        state.open_fds.insert(fd, port_num);
        OpenOutcome::Opened(PortFd(fd))
    }

    fn close_port(&self, fd: PortFd) {
        let mut state = self.state();
        if state.agents.contains_key(&fd.0) {
            state.violations.push(format!("close fd {} with a live agent", fd.0));
        }
        if state.open_fds.remove(&fd.0).is_none() {
            state.violations.push(format!("close unknown fd {}", fd.0));
        }
        state.closes += 1;
    }

    fn register(&self, fd: PortFd, attr: &RegAttr) -> io::Result<AgentId> {
        let mut state = self.state();
        assert_eq!(*attr, RegAttr::CM);
        let Some(&port_num) = state.open_fds.get(&fd.0) else {
            state.violations.push(format!("register on unknown fd {}", fd.0));
            return Err(io::ErrorKind::InvalidInput.into());
        };
        if !attr.accepts(UMAD_METHOD_GET) || !attr.accepts(UMAD_METHOD_SEND) {
            state
                .violations
                .push(format!("agent on fd {} deaf to unsolicited MADs", fd.0));
        }
        if state.register_faults.contains(&port_num) {
            return Err(io::ErrorKind::InvalidInput.into());
        }

        let agent = AgentId(state.next_agent);
        state.next_agent += 1;
        state.registers += 1;
        state.agents.insert(fd.0, agent);
        Ok(agent)
    }

    fn unregister(&self, fd: PortFd, agent: AgentId) {
        let mut state = self.state();
        if state.agents.remove(&fd.0) != Some(agent) {
            state
                .violations
                .push(format!("unregister unknown agent {:?} on fd {}", agent, fd.0));
        }
        state.unregisters += 1;
    }

    fn send(
        &self,
        fd: PortFd,
        agent: AgentId,
        datagram: &Datagram,
        _timeout: Duration,
    ) -> io::Result<()> {
        let mut state = self.state();
        if let Some(kind) = state.send_fault {
            return Err(kind.into());
        }
        if state.agents.get(&fd.0) != Some(&agent) {
            state.violations.push(format!("send through unknown agent on fd {}", fd.0));
        }
        let port_num = state.open_fds.get(&fd.0).copied().unwrap_or(0);
        state.sent.push((port_num, agent, datagram.clone()));
        Ok(())
    }

    fn recv(&self, fd: PortFd, _timeout: Duration) -> io::Result<RecvOutcome> {
        let mut state = self.state();
        state.recvs += 1;
        let port_num = state.open_fds.get(&fd.0).copied().unwrap_or(0);
        let next = state
            .recv_script
            .get_mut(&port_num)
            .and_then(|script| script.pop_front());
        match next {
            Some(ScriptedRecv::Datagram(datagram)) => Ok(RecvOutcome::Received(datagram)),
            Some(ScriptedRecv::TimedOut) | None => Ok(RecvOutcome::TimedOut),
            Some(ScriptedRecv::Failed(kind)) => Err(kind.into()),
        }
    }
}
