//! Error types.

use std::io;

use thiserror::Error;

/// ECE error type.
///
/// Lack of MAD support on the system, lack of permission to open a `umad`
/// device, and receive timeouts are *not* errors: they silently disable ECE
/// or skip the exchange instead.
#[derive(Debug, Error)]
pub enum EceError {
    /// Cannot allocate the per-port channel array.
    #[error("cannot allocate ECE channels")]
    OutOfMemory,

    /// A device must have at least one physical port.
    #[error("invalid port count {0}")]
    InvalidPortCount(u8),

    /// The port number is not in `1..=port_count`.
    #[error("invalid port number {port_num} (device has {port_count} ports)")]
    InvalidPort {
        /// The requested port number.
        port_num: u8,
        /// Number of physical ports of the device.
        port_count: u8,
    },

    /// Opening the `umad` device of a port failed for a reason other than
    /// missing permission.
    #[error("cannot open MAD port {dev_name}:{port_num}")]
    OpenPort {
        /// Device name.
        dev_name: String,
        /// The port number (1-based).
        port_num: u8,
        /// Error reported by the MAD library.
        #[source]
        source: io::Error,
    },

    /// Registering the CM class agent failed.
    #[error("cannot register CM agent on {dev_name}:{port_num}")]
    Register {
        /// Device name.
        dev_name: String,
        /// The port number (1-based).
        port_num: u8,
        /// Error reported by the MAD library.
        #[source]
        source: io::Error,
    },

    /// Sending a MAD failed.
    #[error("cannot send MAD on port {port_num}")]
    Send {
        /// The port number (1-based).
        port_num: u8,
        /// Error reported by the MAD library.
        #[source]
        source: io::Error,
    },

    /// Receiving a MAD failed for a reason other than timing out.
    #[error("cannot receive MAD on port {port_num}")]
    Recv {
        /// The port number (1-based).
        port_num: u8,
        /// Error reported by the MAD library.
        #[source]
        source: io::Error,
    },

    /// The buffer is too short to contain a MAD header.
    #[error("MAD buffer too short ({0} bytes)")]
    ShortMad(usize),

    /// Configuration is missing or invalid.
    #[error("bad ECE configuration: {0}")]
    Config(String),

    /// Cannot read the configuration file.
    #[error("cannot read ECE configuration")]
    ConfigIo(#[from] io::Error),

    /// Malformed TOML configuration.
    #[error("malformed TOML configuration")]
    Toml(#[from] toml::de::Error),

    /// Malformed JSON configuration.
    #[error("malformed JSON configuration")]
    Json(#[from] serde_json::Error),

    /// Invalid device name pattern.
    #[error("invalid device name pattern")]
    Regex(#[from] regex::Error),
}

/// Result type for ECE operations.
pub type Result<T> = std::result::Result<T, EceError>;

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn test_port_errors_carry_source() {
        let err = EceError::OpenPort {
            dev_name: "mlx5_0".to_owned(),
            port_num: 2,
            source: io::ErrorKind::NotFound.into(),
        };
        assert_eq!(err.to_string(), "cannot open MAD port mlx5_0:2");
        let source = err.source().and_then(|e| e.downcast_ref::<io::Error>());
        assert_eq!(source.map(|e| e.kind()), Some(io::ErrorKind::NotFound));

        let err = EceError::Recv {
            port_num: 1,
            source: io::ErrorKind::BrokenPipe.into(),
        };
        assert_eq!(err.to_string(), "cannot receive MAD on port 1");
        assert!(err.source().is_some());
    }
}
