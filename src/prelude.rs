//! The ECE prelude.
//!
//! The purpose of this module is to alleviate imports of common ECE
//! functionalities.

pub use crate::config::EceConfig;
pub use crate::ece::{CapOutcome, EceDevice, SkipReason};
pub use crate::error::{EceError, Result};
pub use crate::mad::{Datagram, Mad, MadAddr, MadBackend, MadSubsystem};
