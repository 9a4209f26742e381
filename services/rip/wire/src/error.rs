//! Wire protocol error types.

use thiserror::Error;

/// Wire protocol errors
#[derive(Error, Debug)]
pub enum WireError {
    /// Empty frame (no version byte)
    #[error("empty frame")]
    Empty,

    /// Unsupported protocol version
    #[error("version unsupported: {0}")]
    Version(u8),

    /// Size limit exceeded
    #[error("size limit exceeded: {0}")]
    Size(usize),

    /// CBOR body could not be produced
    #[error("encode failed: {0}")]
    Encode(String),

    /// CBOR body could not be parsed
    #[error("malformed frame: {0}")]
    Malformed(String),
}
