//! Content envelope
//!
//! Authenticated encryption of content crossing the boundary between the
//! calling application and the remote classifier, plus transport of the
//! single-use content key.
//!
//! ## Wire format
//!
//! ```text
//! ┌─────────┬──────────────┬──────────────────────┬──────────┐
//! │ version │ nonce (12 B) │ ciphertext           │ tag (16) │
//! │  0x01   │   random     │ AES-256-GCM          │          │
//! └─────────┴──────────────┴──────────────────────┴──────────┘
//! ```
//!
//! Any tampering, truncation or key mismatch fails closed with
//! [`Error::Decryption`].

mod keys;
mod transport;

pub use keys::{ContentKey, EphemeralKeyPair, SharedSecret, TransportPublicKey, TransportSecret};
pub use transport::{unwrap_key, wrap_key, WrappedKey};

use crate::error::{Error, Result};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use zeroize::Zeroizing;

/// AES-256-GCM encryption key size
pub const KEY_SIZE: usize = 32;

/// Nonce size for AES-GCM
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size for AES-GCM
pub const TAG_SIZE: usize = 16;

/// Current envelope format version
pub const ENVELOPE_VERSION: u8 = 1;

/// Smallest well-formed envelope (empty plaintext)
pub const MIN_ENVELOPE_SIZE: usize = 1 + NONCE_SIZE + TAG_SIZE;

/// Seal plaintext under a content key
pub fn seal(plaintext: &[u8], key: &ContentKey) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|_| Error::Internal("Failed to create cipher".to_string()))?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| Error::Internal("Encryption failed".to_string()))?;

    let mut envelope = Vec::with_capacity(1 + NONCE_SIZE + ciphertext.len());
    envelope.push(ENVELOPE_VERSION);
    envelope.extend_from_slice(&nonce_bytes);
    envelope.extend_from_slice(&ciphertext);

    Ok(envelope)
}

/// Open an envelope sealed under `key`.
///
/// The returned plaintext is zeroized when dropped.
pub fn open(envelope: &[u8], key: &ContentKey) -> Result<Zeroizing<Vec<u8>>> {
    if envelope.len() < MIN_ENVELOPE_SIZE || envelope[0] != ENVELOPE_VERSION {
        return Err(Error::Decryption);
    }

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| Error::Decryption)?;

    let nonce = Nonce::from_slice(&envelope[1..1 + NONCE_SIZE]);
    let encrypted = &envelope[1 + NONCE_SIZE..];

    cipher
        .decrypt(nonce, encrypted)
        .map(Zeroizing::new)
        .map_err(|_| Error::Decryption)
}
