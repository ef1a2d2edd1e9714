//! Application-level error handling
//!
//! Aggregates every module error into one type and maps it to a stable
//! error code and a process exit status.
//!
//! # Exit status
//!
//! | Status | Phase |
//! |--------|-------|
//! | 0 | success |
//! | 1 | connection, usage, device, negotiation or ring overflow |
//! | 2 | key setup |
//! | 3 | I/O failure while streaming |
//!
//! # Example
//!
//! ```
//! use roomcast_lib::network::TransportError;
//! use roomcast_lib::pipeline::BridgeError;
//! use roomcast_lib::utils::error::{AppError, ErrorCode};
//!
//! let err = AppError::from(BridgeError::Send(TransportError::ConnectionClosed));
//! assert_eq!(err.code(), ErrorCode::StreamIoFailed);
//! assert_eq!(err.exit_code(), 3);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::error::AudioError;
use crate::config::ConfigError;
use crate::network::error::TransportError;
use crate::pipeline::error::BridgeError;
use crate::stream::{FaultKind, StateError};

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Stream state error: {0}")]
    State(#[from] StateError),

    #[error("{0}")]
    Bridge(#[from] BridgeError),

    /// Bad command line
    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stable identifier for each failure class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Audio
    AudioDeviceNotFound,
    AudioBackendNotAvailable,
    AudioNegotiationFailed,
    AudioStreamError,
    RingOverflow,

    // Room
    RoomConnectionFailed,
    RoomAuthFailed,
    RoomTimeout,
    KeySetupFailed,
    StreamIoFailed,

    // Config and usage
    ConfigLoadFailed,
    ConfigInvalid,
    UsageError,

    InternalError,
}

/// User-facing description of an error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    pub code: ErrorCode,
    /// Short message for the terminal
    pub message: String,
    /// Full error chain for logs
    pub detail: Option<String>,
    pub recovery_hint: Option<String>,
    pub recoverable: bool,
}

impl ErrorContext {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            detail: None,
            recovery_hint: None,
            recoverable: true,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_recovery_hint(mut self, hint: impl Into<String>) -> Self {
        self.recovery_hint = Some(hint.into());
        self
    }

    pub fn not_recoverable(mut self) -> Self {
        self.recoverable = false;
        self
    }
}

fn audio_code(err: &AudioError) -> ErrorCode {
    match err {
        AudioError::DeviceNotFound | AudioError::InvalidDeviceName => ErrorCode::AudioDeviceNotFound,
        AudioError::BackendNotAvailable(_) => ErrorCode::AudioBackendNotAvailable,
        e if e.is_negotiation_error() => ErrorCode::AudioNegotiationFailed,
        e if e.is_overflow() => ErrorCode::RingOverflow,
        _ => ErrorCode::AudioStreamError,
    }
}

fn transport_code(err: &TransportError) -> ErrorCode {
    match err {
        TransportError::AuthenticationFailed => ErrorCode::RoomAuthFailed,
        TransportError::Timeout(_) => ErrorCode::RoomTimeout,
        e if e.is_key_error() => ErrorCode::KeySetupFailed,
        _ => ErrorCode::RoomConnectionFailed,
    }
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Audio(e) => audio_code(e),
            AppError::Transport(e) => transport_code(e),

            AppError::Config(ConfigError::Io(_)) => ErrorCode::ConfigLoadFailed,
            AppError::Config(ConfigError::InvalidKey { .. }) => ErrorCode::KeySetupFailed,
            AppError::Config(_) => ErrorCode::ConfigInvalid,

            AppError::Bridge(BridgeError::Connect(e)) => transport_code(e),
            AppError::Bridge(BridgeError::KeySetup(_)) => ErrorCode::KeySetupFailed,
            AppError::Bridge(BridgeError::Audio(e)) => audio_code(e),
            AppError::Bridge(BridgeError::Fault(FaultKind::RingOverflow)) => ErrorCode::RingOverflow,
            AppError::Bridge(BridgeError::Send(_) | BridgeError::Receive(_) | BridgeError::Fault(_)) => {
                ErrorCode::StreamIoFailed
            }

            AppError::Usage(_) => ErrorCode::UsageError,
            AppError::State(_) | AppError::Bridge(BridgeError::State(_)) | AppError::Internal(_) => {
                ErrorCode::InternalError
            }
        }
    }

    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self.code() {
            ErrorCode::KeySetupFailed => 2,
            ErrorCode::StreamIoFailed => 3,
            _ => 1,
        }
    }

    pub fn user_message(&self) -> String {
        match self.code() {
            ErrorCode::AudioDeviceNotFound => "No matching audio device found".to_string(),
            ErrorCode::AudioBackendNotAvailable => "Audio backend is not available".to_string(),
            ErrorCode::AudioNegotiationFailed => {
                "The audio device offers no usable stream configuration".to_string()
            }
            ErrorCode::AudioStreamError => "Audio stream failed".to_string(),
            ErrorCode::RingOverflow => {
                "Audio arrived faster than it could be forwarded".to_string()
            }
            ErrorCode::RoomConnectionFailed => "Could not connect to the room".to_string(),
            ErrorCode::RoomAuthFailed => "The room server rejected the API key".to_string(),
            ErrorCode::RoomTimeout => "Timed out talking to the room server".to_string(),
            ErrorCode::KeySetupFailed => "Could not install room keys".to_string(),
            ErrorCode::StreamIoFailed => "Streaming stopped on an I/O failure".to_string(),
            ErrorCode::ConfigLoadFailed => "Could not read the configuration file".to_string(),
            ErrorCode::ConfigInvalid => "The configuration file is invalid".to_string(),
            ErrorCode::UsageError => "Invalid command line".to_string(),
            ErrorCode::InternalError => format!("Internal error: {}", self),
        }
    }

    pub fn context(&self) -> ErrorContext {
        let mut ctx = ErrorContext::new(self.code(), self.user_message()).with_detail(self.to_string());
        ctx.recovery_hint = self.recovery_hint();

        if !self.is_recoverable() {
            ctx = ctx.not_recoverable();
        }
        ctx
    }

    pub fn recovery_hint(&self) -> Option<String> {
        match self.code() {
            ErrorCode::AudioDeviceNotFound => {
                Some("List devices for the backend and pass a valid --device".to_string())
            }
            ErrorCode::AudioBackendNotAvailable => {
                Some("Omit --backend to use the platform default".to_string())
            }
            ErrorCode::RoomAuthFailed => Some("Check room.api_key and room.api_secret".to_string()),
            ErrorCode::RoomConnectionFailed | ErrorCode::RoomTimeout => {
                Some("Check that the room server is reachable at room.host".to_string())
            }
            ErrorCode::KeySetupFailed => {
                Some("Keys must be 32 bytes, base64 encoded".to_string())
            }
            ErrorCode::RingOverflow => {
                Some("Increase audio.capture_buffer_secs or check the network".to_string())
            }
            _ => None,
        }
    }

    /// Whether running again unchanged may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::RoomConnectionFailed
                | ErrorCode::RoomTimeout
                | ErrorCode::StreamIoFailed
                | ErrorCode::RingOverflow
                | ErrorCode::AudioStreamError
        )
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}
