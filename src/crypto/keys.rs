//! Key material for the content envelope
//!
//! Everything here is zeroized on drop and redacted in `Debug` output.

use super::KEY_SIZE;
use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use x25519_dalek::{EphemeralSecret, PublicKey as X25519PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Single-use symmetric key for one classification request.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ContentKey([u8; KEY_SIZE]);

impl ContentKey {
    /// Generate a fresh key from the OS CSPRNG
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        Self(key)
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create from a received slice. A wrong length is a malformed envelope.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let key: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| Error::Decryption)?;
        Ok(Self(key))
    }

    /// Access the raw bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ContentKey([REDACTED])")
    }
}

/// X25519 public key the remote classifier publishes for key wrapping
#[derive(Clone, PartialEq, Eq)]
pub struct TransportPublicKey(pub(crate) X25519PublicKey);

impl TransportPublicKey {
    /// Create from bytes
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self(X25519PublicKey::from(*bytes))
    }

    /// Parse from standard base64
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes: [u8; 32] = STANDARD
            .decode(encoded.trim())
            .ok()
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| Error::Config("Transport public key must be 32 bytes of base64".into()))?;
        Ok(Self::from_bytes(&bytes))
    }

    /// Get as bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    /// Encode as standard base64
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.as_bytes())
    }
}

impl std::fmt::Debug for TransportPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TransportPublicKey({})", self.to_base64())
    }
}

/// Static X25519 secret held by the remote classifier.
///
/// Loaded from the secret store once per instantiation, never logged.
pub struct TransportSecret(StaticSecret);

impl TransportSecret {
    /// Generate a new random secret (used by `confidant keygen`)
    pub fn generate() -> Self {
        Self(StaticSecret::random_from_rng(OsRng))
    }

    /// Parse from standard base64
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let mut bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|_| Error::CredentialUnavailable("transport secret is not base64".into()))?;
        let parsed: Option<[u8; 32]> = bytes.as_slice().try_into().ok();
        bytes.zeroize();
        let mut raw = parsed.ok_or_else(|| {
            Error::CredentialUnavailable("transport secret must be 32 bytes".into())
        })?;
        let secret = StaticSecret::from(raw);
        raw.zeroize();
        Ok(Self(secret))
    }

    /// Encode as standard base64
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0.to_bytes())
    }

    /// Derive the public half
    pub fn public_key(&self) -> TransportPublicKey {
        TransportPublicKey(X25519PublicKey::from(&self.0))
    }

    /// Diffie-Hellman against a sender's ephemeral key.
    ///
    /// Fails on non-contributory (low-order) peer keys.
    pub fn diffie_hellman(&self, their_public: &TransportPublicKey) -> Result<SharedSecret> {
        let shared = self.0.diffie_hellman(&their_public.0);
        if !shared.was_contributory() {
            return Err(Error::Decryption);
        }
        Ok(SharedSecret(shared.to_bytes()))
    }
}

impl std::fmt::Debug for TransportSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TransportSecret([REDACTED])")
    }
}

/// Ephemeral X25519 key pair for one-time key exchange.
///
/// The secret is consumed by Diffie-Hellman and cannot be reused.
pub struct EphemeralKeyPair {
    secret: EphemeralSecret,
    public: TransportPublicKey,
}

impl EphemeralKeyPair {
    /// Generate a new ephemeral key pair
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random_from_rng(OsRng);
        let public = TransportPublicKey(X25519PublicKey::from(&secret));
        Self { secret, public }
    }

    /// Get the public key (safe to share)
    pub fn public_key(&self) -> TransportPublicKey {
        self.public.clone()
    }

    /// Perform Diffie-Hellman and consume the ephemeral secret
    pub fn diffie_hellman(self, their_public: &TransportPublicKey) -> Result<SharedSecret> {
        let shared = self.secret.diffie_hellman(&their_public.0);
        if !shared.was_contributory() {
            return Err(Error::Config("Transport public key is not usable".to_string()));
        }
        Ok(SharedSecret(shared.to_bytes()))
    }
}

/// Shared secret from Diffie-Hellman key exchange.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret(pub(crate) [u8; 32]);

impl SharedSecret {
    /// Access the raw bytes (for key derivation only)
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_keys_are_unique() {
        let a = ContentKey::generate();
        let b = ContentKey::generate();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_content_key_debug_redacted() {
        let key = ContentKey::from_bytes([7u8; KEY_SIZE]);
        let debug = format!("{:?}", key);
        assert_eq!(debug, "ContentKey([REDACTED])");
    }

    #[test]
    fn test_content_key_from_slice_length() {
        assert!(ContentKey::from_slice(&[1u8; KEY_SIZE]).is_ok());
        assert!(matches!(
            ContentKey::from_slice(&[1u8; 16]),
            Err(Error::Decryption)
        ));
    }

    #[test]
    fn test_ephemeral_static_exchange() {
        let remote = TransportSecret::generate();
        let client = EphemeralKeyPair::generate();
        let client_pub = client.public_key();

        let client_shared = client.diffie_hellman(&remote.public_key()).unwrap();
        let remote_shared = remote.diffie_hellman(&client_pub).unwrap();

        assert_eq!(client_shared.as_bytes(), remote_shared.as_bytes());
    }

    #[test]
    fn test_low_order_point_rejected() {
        let remote = TransportSecret::generate();
        let zero = TransportPublicKey::from_bytes(&[0u8; 32]);
        assert!(matches!(remote.diffie_hellman(&zero), Err(Error::Decryption)));
    }

    #[test]
    fn test_transport_secret_base64_roundtrip() {
        let secret = TransportSecret::generate();
        let restored = TransportSecret::from_base64(&secret.to_base64()).unwrap();
        assert_eq!(secret.public_key(), restored.public_key());
    }

    #[test]
    fn test_public_key_base64_rejects_wrong_length() {
        assert!(TransportPublicKey::from_base64("AAAA").is_err());
        assert!(TransportPublicKey::from_base64("not base64!").is_err());
    }
}
