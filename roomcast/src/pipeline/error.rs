use thiserror::Error;

use crate::audio::error::AudioError;
use crate::network::error::TransportError;
use crate::stream::{FaultKind, StateError};

/// Errors that end a publisher or subscriber session
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Could not reach or join the room
    #[error("Failed to connect: {0}")]
    Connect(#[source] TransportError),

    /// Installing keys failed
    #[error("Key setup failed: {0}")]
    KeySetup(#[source] TransportError),

    /// Publishing captured audio failed
    #[error("Failed to send audio: {0}")]
    Send(#[source] TransportError),

    /// Receiving audio for playback failed
    #[error("Failed to receive audio: {0}")]
    Receive(#[source] TransportError),

    /// Device, negotiation or ring buffer failure
    #[error(transparent)]
    Audio(#[from] AudioError),

    /// A real-time callback stopped the stream
    #[error("Stream faulted: {0}")]
    Fault(FaultKind),

    /// Lifecycle violation
    #[error(transparent)]
    State(#[from] StateError),
}

pub type BridgeResult<T> = Result<T, BridgeError>;
