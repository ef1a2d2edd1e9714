//! WebSocket message types for the room protocol
//!
//! Every frame is a JSON text message tagged by `type`. Binary payloads
//! travel base64-encoded.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::network::error::TransportResult;
use crate::network::packet::{DataPacket, DataType};

// ============================================================================
// Client -> Server Messages
// ============================================================================

/// Messages sent from client to server
///
/// # Example
/// ```
/// use roomcast_lib::network::messages::ClientMessage;
/// use roomcast_lib::network::DataType;
///
/// let msg = ClientMessage::data(DataType::Audio, &[1, 2, 3]);
/// let json = serde_json::to_string(&msg).unwrap();
/// assert!(json.contains("\"type\":\"data\""));
/// assert!(json.contains("\"payload\":\"AQID\""));
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a room
    Join { room: String, identity: String },

    /// Publish one payload chunk
    Data {
        data_type: u8,
        reliable: bool,
        /// Base64-encoded payload
        payload: String,
    },

    /// Leave the room
    Leave,
}

impl ClientMessage {
    pub fn join(room: impl Into<String>, identity: impl Into<String>) -> Self {
        Self::Join {
            room: room.into(),
            identity: identity.into(),
        }
    }

    pub fn data(data_type: DataType, sealed: &[u8]) -> Self {
        Self::Data {
            data_type: data_type.as_u8(),
            reliable: data_type.is_reliable(),
            payload: STANDARD.encode(sealed),
        }
    }
}

// ============================================================================
// Server -> Client Messages
// ============================================================================

/// Messages received from the server
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Join accepted
    Joined {
        room: String,
        /// Participants already present
        #[serde(default)]
        participants: Vec<String>,
    },

    /// Data relayed from a peer
    Data {
        identity: String,
        data_type: u8,
        #[serde(default)]
        reliable: bool,
        payload: String,
    },

    /// A participant joined
    ParticipantJoined { identity: String },

    /// A participant left
    ParticipantLeft { identity: String },

    /// Server-side failure
    Error { message: String },
}

impl ServerMessage {
    /// Relay an encoded payload from `identity`
    pub fn data(identity: impl Into<String>, data_type: u8, reliable: bool, payload: String) -> Self {
        Self::Data {
            identity: identity.into(),
            data_type,
            reliable,
            payload,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ServerMessage::Error { .. })
    }

    /// Decode a data message into a packet
    ///
    /// Returns `Ok(None)` for non-data messages and for unknown type tags.
    pub fn into_packet(self) -> TransportResult<Option<DataPacket>> {
        let ServerMessage::Data {
            identity,
            data_type,
            payload,
            ..
        } = self
        else {
            return Ok(None);
        };

        let Some(data_type) = DataType::from_u8(data_type) else {
            return Ok(None);
        };

        let payload = STANDARD.decode(payload)?;
        Ok(Some(DataPacket::new(identity, data_type, payload)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_serialization() {
        let json = serde_json::to_string(&ClientMessage::join("test", "publisher")).unwrap();
        assert_eq!(json, r#"{"type":"join","room":"test","identity":"publisher"}"#);
    }

    #[test]
    fn test_text_is_sent_reliably() {
        let ClientMessage::Data { reliable, .. } = ClientMessage::data(DataType::Text, b"hi") else {
            panic!("expected data message");
        };
        assert!(reliable);
    }

    #[test]
    fn test_leave_serialization() {
        let json = serde_json::to_string(&ClientMessage::Leave).unwrap();
        assert_eq!(json, r#"{"type":"leave"}"#);
    }

    #[test]
    fn test_server_data_into_packet() {
        let json = r#"{"type":"data","identity":"publisher","data_type":3,"payload":"AQID"}"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();

        let packet = msg.into_packet().unwrap().unwrap();
        assert_eq!(packet.identity, "publisher");
        assert_eq!(packet.data_type, DataType::Audio);
        assert_eq!(packet.payload, vec![1, 2, 3]);
    }

    #[test]
    fn test_unknown_tag_is_dropped() {
        let msg = ServerMessage::data("publisher", 9, false, "AQID".to_string());
        assert_eq!(msg.into_packet().unwrap(), None);
    }

    #[test]
    fn test_bad_payload_is_error() {
        let msg = ServerMessage::data("publisher", 3, false, "***".to_string());
        assert!(msg.into_packet().is_err());
    }

    #[test]
    fn test_joined_deserialization() {
        let json = r#"{"type":"joined","room":"test"}"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();
        assert_eq!(
            msg,
            ServerMessage::Joined {
                room: "test".to_string(),
                participants: vec![],
            }
        );
        assert!(!msg.is_error());
    }
}
