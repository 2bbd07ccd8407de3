//! Error types for the line codec.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Protocol-level errors.
///
/// Decoding never produces a malformed-line error: bad input is degraded
/// or dropped so that one bad line cannot end the stream.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Underlying transport failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The input line was empty after stripping the line terminator.
    #[error("empty message")]
    EmptyMessage,

    /// An outbound line contained an embedded line break.
    #[error("illegal control character in outbound line: {0:?}")]
    IllegalControlChar(char),

    /// An outbound line exceeded the configured maximum.
    #[error("message too long: {actual} bytes (limit {limit})")]
    MessageTooLong {
        /// Actual length in bytes.
        actual: usize,
        /// Configured limit in bytes.
        limit: usize,
    },
}
