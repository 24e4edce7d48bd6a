//! Management datagram (MAD) plumbing.
//!
//! - [`MadBackend`] abstracts the MAD library (libibumad in production).
//! - [`MadSubsystem`] reference-counts the library's process-wide
//!   initialization.
//! - [`Mad`], [`MadHeader`], [`MadAddr`] and [`Datagram`] describe what goes
//!   on the wire.

mod backend;
mod subsystem;
mod wire;

#[cfg(feature = "umad")]
pub mod umad;

pub use self::backend::*;
pub use self::subsystem::*;
pub use self::wire::*;
