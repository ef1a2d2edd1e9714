//! Payload encryption
//!
//! Every published payload is sealed with AES-256-GCM under the sender's
//! transmit key. A fresh random nonce is drawn per payload and prepended to
//! the ciphertext, so a sealed payload is `nonce || ciphertext || tag`.

use std::fmt;

use aes_gcm::aead::{self, Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::Aes256Gcm;

use crate::network::error::{TransportError, TransportResult};
use crate::network::keys::RoomKey;

/// Nonce length in bytes
pub const NONCE_SIZE: usize = 12;

/// Authentication tag length in bytes
pub const TAG_SIZE: usize = 16;

/// Bytes a sealed payload adds to its plaintext
pub const SEAL_OVERHEAD: usize = NONCE_SIZE + TAG_SIZE;

/// AES-256-GCM cipher bound to one [`RoomKey`]
///
/// # Example
/// ```
/// use roomcast_lib::network::cipher::{PayloadCipher, SEAL_OVERHEAD};
/// use roomcast_lib::network::RoomKey;
///
/// let cipher = PayloadCipher::new(&RoomKey::zero());
/// let sealed = cipher.seal(b"audio").unwrap();
/// assert_eq!(sealed.len(), 5 + SEAL_OVERHEAD);
/// assert_eq!(cipher.open(&sealed).unwrap(), b"audio");
/// ```
#[derive(Clone)]
pub struct PayloadCipher {
    aead: Aes256Gcm,
}

impl PayloadCipher {
    pub fn new(key: &RoomKey) -> Self {
        Self {
            aead: Aes256Gcm::new(key.as_bytes().into()),
        }
    }

    /// Encrypt `plaintext` under a fresh nonce
    ///
    /// # Errors
    /// `TransportError::Crypto` if the cipher rejects the input
    pub fn seal(&self, plaintext: &[u8]) -> TransportResult<Vec<u8>> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .aead
            .encrypt(&nonce, plaintext)
            .map_err(|_| TransportError::Crypto("encryption failed".to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Decrypt and authenticate a payload produced by [`seal`](Self::seal)
    ///
    /// # Errors
    /// `TransportError::Crypto` if `sealed` is truncated, was sealed under a
    /// different key, or was modified in transit
    pub fn open(&self, sealed: &[u8]) -> TransportResult<Vec<u8>> {
        if sealed.len() < SEAL_OVERHEAD {
            return Err(TransportError::Crypto(format!(
                "sealed payload too short: {} bytes",
                sealed.len()
            )));
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
        self.aead
            .decrypt(aead::Nonce::<Aes256Gcm>::from_slice(nonce), ciphertext)
            .map_err(|_| TransportError::Crypto("payload failed authentication".to_string()))
    }
}

impl fmt::Debug for PayloadCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PayloadCipher(..)")
    }
}
