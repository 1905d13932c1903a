//! Channel error types
//!
//! Defines the errors raised by the live-update channel. Only
//! [`ChannelError`] ever reaches the caller; decode and transport errors are
//! recovered inside the channel and surface through logs and state.

use thiserror::Error;

/// Errors returned from the channel lifecycle API
#[derive(Error, Debug)]
pub enum ChannelError {
    /// The requested operation is not allowed in the current state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// The hosting page location cannot be turned into a channel URL
    #[error("Invalid page URL: {0}")]
    InvalidPageUrl(String),
}

/// Errors produced while decoding an inbound payload
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Payload is not a JSON object
    #[error("Malformed payload: {0}")]
    Malformed(String),

    /// The `event` field is absent or not a string
    #[error("Missing event kind")]
    MissingKind,

    /// A `new` event without a usable `id`
    #[error("Missing content id for '{0}' event")]
    MissingContentId(String),

    /// Binary frame whose bytes are not UTF-8
    #[error("Payload is not valid UTF-8")]
    NotUtf8,
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::Malformed(err.to_string())
    }
}

/// Errors raised by a transport implementation
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection could not be established
    #[error("Connect failed: {0}")]
    Connect(String),

    /// Connection attempt did not finish in time
    #[error("Connect timed out after {0}ms")]
    Timeout(u64),

    /// Error on an established connection
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        TransportError::Protocol(err.to_string())
    }
}

/// Result type alias for channel lifecycle operations
pub type ChannelResult<T> = Result<T, ChannelError>;
