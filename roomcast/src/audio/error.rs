use thiserror::Error;

use crate::audio::format::SampleFormat;

/// Audio-related errors
#[derive(Error, Debug)]
pub enum AudioError {
    /// No matching audio device found
    #[error("No audio device found")]
    DeviceNotFound,

    /// Requested audio host backend is not available on this platform
    #[error("Audio backend not available: {0}")]
    BackendNotAvailable(String),

    /// Device name is invalid
    #[error("Device name is invalid UTF-8")]
    InvalidDeviceName,

    /// Device could not be probed for its capabilities
    #[error("Unable to probe device: {0}")]
    ProbeFailed(String),

    /// Device advertises no sample formats at all
    #[error("Device advertises no sample formats")]
    NoSupportedFormats,

    /// Device advertises no sample rates at all
    #[error("Device advertises no sample rates")]
    NoSupportedSampleRates,

    /// Negotiated format cannot be opened by the audio host
    #[error("Sample format {0} cannot be opened on this host")]
    UnsupportedFormat(SampleFormat),

    /// Failed to build audio stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuildFailed(String),

    /// Audio stream error
    #[error("Audio stream error: {0}")]
    StreamError(String),

    /// Driver rejected a begin/end transaction
    #[error("Driver transaction failed: {0}")]
    TransactionFailed(String),

    /// Ring buffer cannot absorb the frames the driver guarantees to deliver
    #[error("Ring buffer overflow: {requested} frames requested, {free} frames free")]
    RingOverflow {
        /// Frames the producer had to place
        requested: usize,
        /// Frames the buffer could still accept
        free: usize,
    },

    /// Byte-level write larger than the ring buffer's free space
    #[error("Ring buffer full: {requested} bytes requested, {free} bytes free")]
    RingFull {
        /// Bytes the caller tried to write
        requested: usize,
        /// Bytes the buffer could still accept
        free: usize,
    },

    /// Stream was stopped while the operation was in progress
    #[error("Stream stopped")]
    Stopped,

    /// cpal error
    #[error("cpal error: {0}")]
    CpalError(#[from] cpal::DevicesError),

    /// Default config error
    #[error("Default config error: {0}")]
    DefaultConfigError(#[from] cpal::DefaultStreamConfigError),

    /// Supported config error
    #[error("Supported config error: {0}")]
    SupportedConfigError(#[from] cpal::SupportedStreamConfigsError),
}

impl AudioError {
    /// Whether the error was raised while choosing a stream configuration
    pub fn is_negotiation_error(&self) -> bool {
        matches!(
            self,
            AudioError::ProbeFailed(_)
                | AudioError::NoSupportedFormats
                | AudioError::NoSupportedSampleRates
                | AudioError::UnsupportedFormat(_)
        )
    }

    pub fn is_overflow(&self) -> bool {
        matches!(
            self,
            AudioError::RingOverflow { .. } | AudioError::RingFull { .. }
        )
    }
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
