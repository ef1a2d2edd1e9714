//! Room key material
//!
//! A participant seals what it publishes with one transmit key and accepts
//! data only from peers it holds a receive key for.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

use crate::network::cipher::PayloadCipher;
use crate::network::error::{TransportError, TransportResult};
use crate::network::packet::{payload_chunks, DataPacket};

/// Size of a room key in bytes
pub const KEY_SIZE: usize = 32;

/// A 256-bit room key
#[derive(Clone, PartialEq, Eq)]
pub struct RoomKey([u8; KEY_SIZE]);

impl RoomKey {
    /// # Errors
    /// `TransportError::InvalidKey` unless `bytes` is exactly [`KEY_SIZE`] long
    pub fn from_bytes(bytes: &[u8]) -> TransportResult<Self> {
        let key: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            TransportError::InvalidKey(format!(
                "expected {} bytes, got {}",
                KEY_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self(key))
    }

    /// Decode a standard base64 key
    ///
    /// ```
    /// use roomcast_lib::network::RoomKey;
    ///
    /// let key = RoomKey::from_base64(&RoomKey::zero().to_base64()).unwrap();
    /// assert_eq!(key, RoomKey::zero());
    /// assert!(RoomKey::from_base64("c2hvcnQ=").is_err());
    /// ```
    pub fn from_base64(encoded: &str) -> TransportResult<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| TransportError::InvalidKey(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// The all-zero key the publisher and subscriber default to
    pub fn zero() -> Self {
        Self([0; KEY_SIZE])
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RoomKey(..)")
    }
}

/// Transmit cipher plus receive ciphers by peer identity
#[derive(Debug, Clone, Default)]
pub struct KeyRing {
    transmit: Option<PayloadCipher>,
    receive: HashMap<String, PayloadCipher>,
}

impl KeyRing {
    pub fn transmit_cipher(&self) -> Option<&PayloadCipher> {
        self.transmit.as_ref()
    }

    pub fn receive_cipher(&self, peer: &str) -> Option<&PayloadCipher> {
        self.receive.get(peer)
    }

    /// Whether data from `peer` should be delivered
    pub fn accepts(&self, peer: &str) -> bool {
        self.receive.contains_key(peer)
    }
}

/// Key ring shared between a connection and its receive task
///
/// Readers never lock; updates swap in a modified copy.
#[derive(Debug, Clone, Default)]
pub struct SharedKeys {
    inner: Arc<ArcSwap<KeyRing>>,
}

impl SharedKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self) -> Arc<KeyRing> {
        self.inner.load_full()
    }

    pub fn set_transmit(&self, key: RoomKey) {
        let cipher = PayloadCipher::new(&key);
        self.inner.rcu(|ring| {
            let mut next = KeyRing::clone(ring);
            next.transmit = Some(cipher.clone());
            next
        });
    }

    pub fn add_receive(&self, peer: &str, key: RoomKey) {
        let cipher = PayloadCipher::new(&key);
        self.inner.rcu(|ring| {
            let mut next = KeyRing::clone(ring);
            next.receive.insert(peer.to_string(), cipher.clone());
            next
        });
    }

    /// Returns `true` if a key was registered for `peer`
    pub fn remove_receive(&self, peer: &str) -> bool {
        let previous = self.inner.rcu(|ring| {
            let mut next = KeyRing::clone(ring);
            next.receive.remove(peer);
            next
        });
        previous.accepts(peer)
    }

    pub fn has_transmit_key(&self) -> bool {
        self.inner.load().transmit.is_some()
    }

    pub fn accepts(&self, peer: &str) -> bool {
        self.inner.load().accepts(peer)
    }

    /// Seal `payload` with the transmit key
    ///
    /// # Errors
    /// - `TransportError::MissingTransmitKey` before [`set_transmit`](Self::set_transmit)
    /// - `TransportError::Crypto` if encryption fails
    pub fn seal(&self, payload: &[u8]) -> TransportResult<Vec<u8>> {
        let ring = self.inner.load();
        match ring.transmit_cipher() {
            Some(cipher) => cipher.seal(payload),
            None => Err(TransportError::MissingTransmitKey),
        }
    }

    /// Open a sealed packet and split the plaintext into packets of at most
    /// `max_payload` bytes
    ///
    /// Returns `None` when the sender has no receive key or the payload
    /// fails authentication.
    pub fn open_packet(&self, sealed: &DataPacket, max_payload: usize) -> Option<Vec<DataPacket>> {
        let ring = self.inner.load();
        let Some(cipher) = ring.receive_cipher(&sealed.identity) else {
            debug!("Dropping packet from {}: no receive key", sealed.identity);
            return None;
        };

        let payload = match cipher.open(&sealed.payload) {
            Ok(payload) => payload,
            Err(e) => {
                debug!("Dropping packet from {}: {}", sealed.identity, e);
                return None;
            }
        };

        Some(
            payload_chunks(&payload, max_payload)
                .map(|chunk| DataPacket::new(sealed.identity.clone(), sealed.data_type, chunk.to_vec()))
                .collect(),
        )
    }
}
