//! ECE (Enhanced Connection Establishment) capability negotiation for RDMA
//! CM over InfiniBand management datagrams.
//!
//! An [`ece::EceDevice`] owns one CM MAD channel per physical port of an
//! RDMA device. Before or during connection establishment, the active side
//! calls [`ece::EceDevice::request_capability`] and the passive side calls
//! [`ece::EceDevice::reply_capability`] to exchange a `ClassPortInfo` MAD.
//! ECE is strictly best-effort: if the system has no MAD support, the
//! process lacks access to `/dev/infiniband/umad*`, or the peer never
//! answers, the exchange is skipped and the connection proceeds in legacy
//! mode without any error.
//!
//! The MAD library is abstracted by [`mad::MadBackend`]. Enable the `umad`
//! feature to get the libibumad implementation in [`mad::umad`]; this
//! requires `libibumad` to be discoverable by `pkg-config`.
//!
//! # Example
//!
//! ```rust,ignore
//! use rrddmma_ece::prelude::*;
//! use std::sync::RwLock;
//!
//! let dev = RwLock::new(EceDevice::new("mlx5_0", 2, rrddmma_ece::mad::umad::global())?);
//! dev.write().unwrap().init()?;
//!
//! // Later, while connecting through port 1:
//! let outcome = dev.read().unwrap().request_capability(1)?;
//! if outcome.is_skipped() {
//!     // Legacy peer, or ECE unavailable on this host.
//! }
//! ```

#[cfg(feature = "umad")]
mod bindings;
#[cfg(feature = "umad")]
mod utils;

mod error;
pub use error::{EceError, Result};

pub mod config;
pub mod ece;
pub mod mad;
pub mod prelude;

#[cfg(test)]
mod test_utils;
