//! Room transport error types

use thiserror::Error;

/// Room transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to the room server
    #[error("Failed to connect to room server: {0}")]
    ConnectionFailed(String),

    /// Server rejected the API key or secret
    #[error("Authentication failed: invalid API key or secret")]
    AuthenticationFailed,

    /// Unexpected message or framing from the server
    #[error("Room protocol error: {0}")]
    ProtocolError(String),

    /// Operation did not complete in time
    #[error("Room operation timed out after {0}ms")]
    Timeout(u64),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),

    /// Failed to serialize or parse a message
    #[error("Failed to serialize message: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Payload was not valid base64
    #[error("Invalid payload encoding: {0}")]
    PayloadEncoding(#[from] base64::DecodeError),

    /// Failed to build the upgrade request
    #[error("Failed to build HTTP request: {0}")]
    HttpError(String),

    /// Connection closed
    #[error("Room connection closed")]
    ConnectionClosed,

    /// Invalid connection parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Server returned an error message
    #[error("Server error: {0}")]
    ServerError(String),

    /// `send` called before a transmit key was installed
    #[error("No transmit key set")]
    MissingTransmitKey,

    /// Key material has the wrong size or encoding
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Sealing or opening a payload failed
    #[error("Payload encryption error: {0}")]
    Crypto(String),

    /// Part of a payload reached the room before `source` occurred
    ///
    /// `committed` counts payload bytes already published; a retry must
    /// resume after them.
    #[error("Sent {committed} bytes before failing: {source}")]
    PartialSend {
        committed: usize,
        #[source]
        source: Box<TransportError>,
    },
}

impl TransportError {
    /// Whether repeating the operation may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::ConnectionFailed(_)
            | TransportError::Timeout(_)
            | TransportError::WebSocketError(_) => true,
            TransportError::PartialSend { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Whether the error comes from key setup
    pub fn is_key_error(&self) -> bool {
        matches!(
            self,
            TransportError::MissingTransmitKey | TransportError::InvalidKey(_)
        )
    }
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

impl From<tokio_tungstenite::tungstenite::http::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::http::Error) -> Self {
        TransportError::HttpError(err.to_string())
    }
}
