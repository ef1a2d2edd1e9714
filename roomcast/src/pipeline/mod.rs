//! Transport bridges and the sessions that drive them
//!
//! The bridges are the application-domain half of each stream: the capture
//! bridge drains the capture ring into the room, the playback bridge fills
//! the playback ring from the room. Sessions wire a device stream and a
//! bridge together around one ring buffer.

/// Timer-based idle waits
pub mod backoff;

/// Ring buffer to room
pub mod capture_bridge;

/// Bridge error types
pub mod error;

/// Room to ring buffer
pub mod playback_bridge;

/// Publisher and subscriber orchestration
pub mod session;

pub use backoff::IdleBackoff;
pub use capture_bridge::CaptureBridge;
pub use error::{BridgeError, BridgeResult};
pub use playback_bridge::{PlaybackBridge, PumpOutcome};
pub use session::{
    connect_room, install_receive_key, install_transmit_key, Publisher, SessionHandle, Subscriber,
};
