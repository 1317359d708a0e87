//! Error types for transport setup

use std::fmt;

/// Result type alias for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Failures that abort a run before monitoring starts
#[derive(Debug)]
pub enum TransportError {
    /// Could not reach or handshake with the transport
    Connect(String),

    /// A channel subscription could not be established
    Subscribe { channel: String, reason: String },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Connect(msg) => write!(f, "failed to connect to transport: {}", msg),
            TransportError::Subscribe { channel, reason } => {
                write!(f, "failed to subscribe to {}: {}", channel, reason)
            }
        }
    }
}

impl std::error::Error for TransportError {}
