use std::{error::Error, fmt::Display, io};

use crate::protocol::Command;

/// Errors a request/response transaction can end in.
///
/// Parser-level outcomes (no sync marker, incomplete frame, malformed
/// command byte) are resolved inside [`crate::parser::StreamParser`] and
/// never appear here.
#[derive(Debug)]
pub enum TransactionError {
    /// An operation needed the transport but no channel is attached.
    NotConnected,
    /// No complete, valid response arrived within the configured bound.
    Timeout,
    /// A structurally valid frame arrived but its CRC check failed.
    ChecksumMismatch,
    /// The response command does not match the request that was sent.
    UnexpectedResponse { expected: Command, received: Command },
    /// The transport failed, including end-of-stream mid-transaction.
    IoError(io::Error),
}

impl From<io::Error> for TransactionError {
    fn from(value: io::Error) -> Self {
        TransactionError::IoError(value)
    }
}

impl Display for TransactionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionError::NotConnected => {
                write!(f, "Attempt to perform a transaction without a connection")
            }
            TransactionError::Timeout => write!(f, "Timeout waiting for response"),
            TransactionError::ChecksumMismatch => write!(f, "Bad CRC in response"),
            TransactionError::UnexpectedResponse { expected, received } => write!(
                f,
                "Expected a {} response but received a {} response",
                expected, received
            ),
            TransactionError::IoError(error) => write!(f, "{}", error),
        }
    }
}

impl Error for TransactionError {}
