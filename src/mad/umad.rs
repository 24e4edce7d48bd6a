//! [`MadBackend`] on top of libibumad.

use std::ffi::CString;
use std::io;
use std::os::raw::{c_int, c_void};
use std::slice;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use super::*;
use crate::bindings::*;
use crate::utils::interop::{from_c_neg, from_c_ret};

/// libibumad.
///
/// Use [`global`] to get the shared, reference-counted instance; libibumad
/// keeps process-wide state, so there should be only one.
#[derive(Debug, Default, Clone, Copy)]
pub struct Umad;

/// Get the process-wide libibumad subsystem.
pub fn global() -> Arc<MadSubsystem> {
    static GLOBAL: OnceLock<Arc<MadSubsystem>> = OnceLock::new();
    Arc::clone(GLOBAL.get_or_init(|| MadSubsystem::new(Umad)))
}

/// `umad_open_port` errors that mean "no access to `/dev/infiniband/umad*`".
fn is_permission_errno(errno: c_int) -> bool {
    matches!(errno, libc::EIO | libc::EACCES | libc::EPERM)
}

#[inline]
fn timeout_ms(timeout: Duration) -> c_int {
    timeout.as_millis().min(c_int::MAX as u128) as c_int
}

/// A user MAD buffer: `struct ib_user_mad` followed by the MAD itself.
struct UmadBuf(Vec<u64>);

impl UmadBuf {
    fn new() -> Self {
        // SAFETY: FFI.
        let len = unsafe { umad_size() } + IB_MAD_SIZE;
        Self(vec![0; len.div_ceil(8)])
    }

    #[inline]
    fn as_mut_ptr(&mut self) -> *mut c_void {
        self.0.as_mut_ptr() as _
    }
}

impl MadBackend for Umad {
    fn init(&self) -> io::Result<()> {
        // SAFETY: FFI.
        let ret = unsafe { umad_init() };
        if ret < 0 {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "libibumad cannot be initialized",
            ));
        }
        Ok(())
    }

    fn done(&self) {
        // SAFETY: FFI.
        unsafe { umad_done() };
    }

    fn open_port(&self, dev_name: &str, port_num: u8) -> OpenOutcome {
        let Ok(name) = CString::new(dev_name) else {
            return OpenOutcome::Failed(io::Error::new(
                io::ErrorKind::InvalidInput,
                "device name contains a NUL byte",
            ));
        };

        // SAFETY: FFI; `name` is a valid C string.
        let ret = unsafe { umad_open_port(name.as_ptr(), port_num as c_int) };
        match from_c_neg(ret) {
            Ok(fd) => OpenOutcome::Opened(PortFd(fd)),
            Err(_) if is_permission_errno(-ret) => OpenOutcome::PermissionDenied,
            Err(e) => OpenOutcome::Failed(e),
        }
    }

    fn close_port(&self, fd: PortFd) {
        // SAFETY: FFI.
        unsafe { umad_close_port(fd.0) };
    }

    fn register(&self, fd: PortFd, attr: &RegAttr) -> io::Result<AgentId> {
        let mut reg_attr = umad_reg_attr {
            mgmt_class: attr.mgmt_class,
            mgmt_class_version: attr.mgmt_class_version,
            method_mask: attr.method_mask,
            ..Default::default()
        };
        let mut agent = 0u32;

        // SAFETY: FFI.
        let ret = unsafe { umad_register2(fd.0, &mut reg_attr, &mut agent) };
        from_c_ret(ret).map(|_| AgentId(agent))
    }

    fn unregister(&self, fd: PortFd, agent: AgentId) {
        // SAFETY: FFI.
        unsafe { umad_unregister(fd.0, agent.0 as c_int) };
    }

    fn send(
        &self,
        fd: PortFd,
        agent: AgentId,
        datagram: &Datagram,
        timeout: Duration,
    ) -> io::Result<()> {
        let mut buf = UmadBuf::new();
        let addr = &datagram.addr;
        let mad = datagram.mad.to_bytes();

        // SAFETY: FFI; `buf` is large enough for a user MAD header plus a MAD.
        let ret = unsafe {
            umad_set_addr(
                buf.as_mut_ptr(),
                addr.lid as c_int,
                addr.qpn as c_int,
                addr.sl as c_int,
                addr.qkey as c_int,
            );
            let dst = umad_get_mad(buf.as_mut_ptr()) as *mut u8;
            dst.copy_from_nonoverlapping(mad.as_ptr(), IB_MAD_SIZE);
            umad_send(
                fd.0,
                agent.0 as c_int,
                buf.as_mut_ptr(),
                IB_MAD_SIZE as c_int,
                timeout_ms(timeout),
                0,
            )
        };
        from_c_neg(ret).map(|_| ())
    }

    fn recv(&self, fd: PortFd, timeout: Duration) -> io::Result<RecvOutcome> {
        let mut buf = UmadBuf::new();
        let mut len = IB_MAD_SIZE as c_int;

        // SAFETY: FFI; `len` is the capacity of the MAD part of `buf`.
        let ret = unsafe { umad_recv(fd.0, buf.as_mut_ptr(), &mut len, timeout_ms(timeout)) };
        if ret == -libc::ETIMEDOUT {
            return Ok(RecvOutcome::TimedOut);
        }
        from_c_neg(ret)?;

        // SAFETY: `umad_recv` filled in the address and `len` bytes of MAD.
        let (addr, mad) = unsafe {
            let raw = &*umad_get_mad_addr(buf.as_mut_ptr());
            let addr = MadAddr {
                lid: u16::from_be(raw.lid),
                qpn: u32::from_be(raw.qpn),
                qkey: u32::from_be(raw.qkey),
                sl: raw.sl,
            };
            let len = (len.max(0) as usize).min(IB_MAD_SIZE);
            let mad = slice::from_raw_parts(umad_get_mad(buf.as_mut_ptr()) as *const u8, len);
            (addr, Mad::from_bytes(mad))
        };
        let mad = mad.map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(RecvOutcome::Received(Datagram { addr, mad }))
    }
}
