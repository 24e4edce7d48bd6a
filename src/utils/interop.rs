use std::io;

/// Converts a C return value (`0` on success, an errno of either sign on
/// failure) to a Rust `Result`.
#[inline(always)]
pub(crate) fn from_c_ret(ret: i32) -> io::Result<()> {
    match ret {
        0 => Ok(()),
        _ => Err(io::Error::from_raw_os_error(ret.saturating_abs())),
    }
}

/// Converts a C return value (non-negative on success, a negated errno on
/// failure) to a Rust `Result`.
#[inline(always)]
pub(crate) fn from_c_neg(ret: i32) -> io::Result<i32> {
    if ret >= 0 {
        Ok(ret)
    } else {
        Err(io::Error::from_raw_os_error(ret.saturating_neg()))
    }
}
