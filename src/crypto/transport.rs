//! Content key wrapping for the `wrapped` key transport mode.
//!
//! The client runs an ephemeral X25519 exchange against the classifier's
//! static public key, derives a wrapping key with HKDF-SHA256 and seals the
//! content key under it with the regular envelope.

use super::keys::{ContentKey, EphemeralKeyPair, SharedSecret, TransportPublicKey, TransportSecret};
use super::{open, seal, KEY_SIZE};
use crate::error::{Error, Result};
use hkdf::Hkdf;
use sha2::Sha256;

const WRAP_INFO: &[u8] = b"confidant-key-wrap-v1";

/// A content key sealed for one recipient
#[derive(Clone)]
pub struct WrappedKey {
    /// Sender's ephemeral public key
    pub ephemeral_public: [u8; 32],
    /// Content key sealed under the derived wrapping key
    pub sealed_key: Vec<u8>,
}

impl std::fmt::Debug for WrappedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WrappedKey")
            .field("sealed_key_len", &self.sealed_key.len())
            .finish_non_exhaustive()
    }
}

/// Wrap a content key for the holder of `recipient`'s secret
pub fn wrap_key(key: &ContentKey, recipient: &TransportPublicKey) -> Result<WrappedKey> {
    let ephemeral = EphemeralKeyPair::generate();
    let ephemeral_public = ephemeral.public_key();
    let shared = ephemeral.diffie_hellman(recipient)?;

    let wrapping = derive_wrapping_key(&shared, &ephemeral_public, recipient)?;
    let sealed_key = seal(key.as_bytes(), &wrapping)?;

    Ok(WrappedKey {
        ephemeral_public: *ephemeral_public.as_bytes(),
        sealed_key,
    })
}

/// Recover a wrapped content key. Any failure is a malformed envelope.
pub fn unwrap_key(wrapped: &WrappedKey, secret: &TransportSecret) -> Result<ContentKey> {
    let ephemeral_public = TransportPublicKey::from_bytes(&wrapped.ephemeral_public);
    let shared = secret.diffie_hellman(&ephemeral_public)?;

    let wrapping = derive_wrapping_key(&shared, &ephemeral_public, &secret.public_key())
        .map_err(|_| Error::Decryption)?;
    let raw = open(&wrapped.sealed_key, &wrapping)?;
    ContentKey::from_slice(&raw)
}

/// Bind the wrapping key to both public keys so a sealed key cannot be
/// replayed against a different recipient.
fn derive_wrapping_key(
    shared: &SharedSecret,
    ephemeral_public: &TransportPublicKey,
    recipient: &TransportPublicKey,
) -> Result<ContentKey> {
    let mut salt = [0u8; 64];
    salt[..32].copy_from_slice(ephemeral_public.as_bytes());
    salt[32..].copy_from_slice(recipient.as_bytes());

    let hk = Hkdf::<Sha256>::new(Some(&salt), shared.as_bytes());
    let mut okm = [0u8; KEY_SIZE];
    hk.expand(WRAP_INFO, &mut okm)
        .map_err(|_| Error::Internal("Key derivation failed".to_string()))?;
    Ok(ContentKey::from_bytes(okm))
}
