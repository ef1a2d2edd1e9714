//! Packets exchanged with a room

use std::fmt;

use serde::{Deserialize, Serialize};

/// Payload type tag carried with every packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DataType {
    Custom = 0,
    Text = 1,
    Signal = 2,
    Audio = 3,
    Video = 4,
}

impl DataType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Custom),
            1 => Some(Self::Text),
            2 => Some(Self::Signal),
            3 => Some(Self::Audio),
            4 => Some(Self::Video),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Text and signalling go over the reliable channel; media does not
    pub fn is_reliable(self) -> bool {
        matches!(self, Self::Text | Self::Signal)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Custom => "custom",
            Self::Text => "text",
            Self::Signal => "signal",
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One inbound packet from a peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPacket {
    /// Identity of the sending participant
    pub identity: String,
    pub data_type: DataType,
    pub payload: Vec<u8>,
}

impl DataPacket {
    pub fn new(identity: impl Into<String>, data_type: DataType, payload: Vec<u8>) -> Self {
        Self {
            identity: identity.into(),
            data_type,
            payload,
        }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn is_audio(&self) -> bool {
        self.data_type == DataType::Audio
    }
}

/// Split `payload` into wire-sized chunks
///
/// An empty payload yields no chunks.
///
/// ```
/// use roomcast_lib::network::packet::payload_chunks;
///
/// let payload = [0u8; 1100];
/// let sizes: Vec<usize> = payload_chunks(&payload, 512).map(|c| c.len()).collect();
/// assert_eq!(sizes, vec![512, 512, 76]);
/// ```
pub fn payload_chunks(payload: &[u8], max_payload: usize) -> impl Iterator<Item = &[u8]> {
    payload.chunks(max_payload.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_tags() {
        for tag in 0..=4u8 {
            let data_type = DataType::from_u8(tag).unwrap();
            assert_eq!(data_type.as_u8(), tag);
        }
        assert_eq!(DataType::from_u8(5), None);
    }

    #[test]
    fn test_reliability() {
        assert!(DataType::Text.is_reliable());
        assert!(DataType::Signal.is_reliable());
        assert!(!DataType::Audio.is_reliable());
        assert!(!DataType::Video.is_reliable());
        assert!(!DataType::Custom.is_reliable());
    }

    #[test]
    fn test_empty_payload_has_no_chunks() {
        assert_eq!(payload_chunks(&[], 512).count(), 0);
    }

    #[test]
    fn test_exact_multiple() {
        let payload = vec![1u8; 1024];
        assert_eq!(payload_chunks(&payload, 512).count(), 2);
    }
}
