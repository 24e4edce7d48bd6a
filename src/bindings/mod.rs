//! Bindings of libibumad C interfaces.

#![allow(non_snake_case)]
#![allow(non_camel_case_types)]
#![allow(non_upper_case_globals)]
#![allow(deref_nullptr)]
#![allow(clippy::missing_safety_doc)]
#![allow(clippy::too_many_arguments)]
#![allow(unused)]

mod private {
    use libc::*;
    include!(concat!(env!("OUT_DIR"), "/umad_bindings.rs"));
}

/// Initialize the libibumad library.
///
/// Returns a negative value if the library cannot be used on this system.
pub use self::private::umad_init;

/// Finalize the libibumad library.
pub use self::private::umad_done;

/// Open the `umad` device of a port and get its file descriptor.
///
/// Returns a negative errno on failure.
pub use self::private::umad_open_port;

/// Close a port opened by [`umad_open_port`].
pub use self::private::umad_close_port;

/// Register a management class agent on an opened port.
pub use self::private::umad_register2;

/// Unregister a management class agent.
pub use self::private::umad_unregister;

/// Management class registration attributes.
pub use self::private::umad_reg_attr;

/// Size of the user MAD header that precedes every MAD buffer.
pub use self::private::umad_size;

/// Get the MAD part of a user MAD buffer.
pub use self::private::umad_get_mad;

/// Get the address part of a user MAD buffer.
pub use self::private::umad_get_mad_addr;

/// Set the destination address of a user MAD buffer.
pub use self::private::umad_set_addr;

/// Send a MAD.
pub use self::private::umad_send;

/// Receive a MAD.
///
/// Returns the agent ID on success, or a negative errno on failure.
pub use self::private::umad_recv;

/// MAD address.
pub use self::private::ib_mad_addr;
