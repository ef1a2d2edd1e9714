//! Room transport
//!
//! A room carries typed data packets between named participants. Two
//! implementations share the [`RoomTransport`] trait: a WebSocket client
//! for a room server and an in-process loopback hub.

/// AES-256-GCM payload sealing
pub mod cipher;

/// WebSocket room client
pub mod connection;

/// Transport error types
pub mod error;

/// Room key material
pub mod keys;

/// In-process loopback rooms
pub mod loopback;

/// WebSocket message type definitions
pub mod messages;

/// Data packets and type tags
pub mod packet;

/// Bounded retry for transport operations
pub mod retry;

/// The room transport trait and connection parameters
pub mod room;

/// Background receive task
pub mod tasks;

// Re-export commonly used types
pub use cipher::PayloadCipher;
pub use connection::{ClientOptions, RoomClient};
pub use error::{TransportError, TransportResult};
pub use keys::{RoomKey, SharedKeys, KEY_SIZE};
pub use loopback::{LoopbackHub, LoopbackRoom};
pub use packet::{DataPacket, DataType};
pub use retry::{retry_transport, RetryPolicy};
pub use room::{ConnectInfo, RoomTransport, DEFAULT_MAX_PAYLOAD, INBOUND_QUEUE_DEPTH};
