//! Invocation wire protocol
//!
//! JSON messages exchanged between the invocation client and the remote
//! classifier. Byte fields travel as standard base64. Nothing in these
//! messages is plaintext content: the email and the verdict are always
//! inside envelopes.

use crate::audit::CorrelationId;
use crate::crypto::{ContentKey, WrappedKey};
use crate::error::{Error, FailureKind, Result};
use crate::model::Label;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// How the content key reaches the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyTransport {
    /// Key in the request body, protected by the invoke channel
    #[default]
    Channel,
    /// Key sealed to the classifier's X25519 public key
    Wrapped,
}

/// The content key as carried in a request
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum KeyEnvelope {
    Channel {
        #[serde(with = "b64")]
        key: Vec<u8>,
    },
    Wrapped {
        #[serde(with = "b64")]
        ephemeral_public: Vec<u8>,
        #[serde(with = "b64")]
        sealed_key: Vec<u8>,
    },
}

impl KeyEnvelope {
    /// Carry the raw key (channel mode)
    pub fn channel(key: &ContentKey) -> Self {
        Self::Channel {
            key: key.as_bytes().to_vec(),
        }
    }

    /// Carry a wrapped key
    pub fn wrapped(wrapped: WrappedKey) -> Self {
        Self::Wrapped {
            ephemeral_public: wrapped.ephemeral_public.to_vec(),
            sealed_key: wrapped.sealed_key,
        }
    }

    pub fn transport(&self) -> KeyTransport {
        match self {
            Self::Channel { .. } => KeyTransport::Channel,
            Self::Wrapped { .. } => KeyTransport::Wrapped,
        }
    }

    /// Reassemble a wrapped key. Malformed fields are a malformed envelope.
    pub fn to_wrapped(&self) -> Result<WrappedKey> {
        match self {
            Self::Wrapped {
                ephemeral_public,
                sealed_key,
            } => Ok(WrappedKey {
                ephemeral_public: ephemeral_public
                    .as_slice()
                    .try_into()
                    .map_err(|_| Error::Decryption)?,
                sealed_key: sealed_key.clone(),
            }),
            Self::Channel { .. } => Err(Error::Decryption),
        }
    }
}

impl Drop for KeyEnvelope {
    fn drop(&mut self) {
        if let Self::Channel { key } = self {
            key.zeroize();
        }
    }
}

impl std::fmt::Debug for KeyEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyEnvelope({:?}, [REDACTED])", self.transport())
    }
}

/// Request to classify one sealed piece of content
#[derive(Clone, Serialize, Deserialize)]
pub struct ClassificationRequest {
    /// Caller-generated id, for log correlation only
    pub correlation_id: CorrelationId,
    /// Content sealed under the content key
    #[serde(with = "b64")]
    pub encrypted_content: Vec<u8>,
    /// The single-use content key
    pub content_key: KeyEnvelope,
    /// Whether the caller wants an explanation alongside the label
    #[serde(default)]
    pub want_detail: bool,
}

impl std::fmt::Debug for ClassificationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassificationRequest")
            .field("correlation_id", &self.correlation_id)
            .field("encrypted_content_len", &self.encrypted_content.len())
            .field("content_key", &self.content_key)
            .field("want_detail", &self.want_detail)
            .finish()
    }
}

/// A verdict. Sealed end-to-end on the wire, detail included.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Label from the closed set
    pub label: Label,
    /// Confidence in `[0, 1]`
    pub confidence: f64,
    /// Free-text explanation, only when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl std::fmt::Debug for ClassificationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassificationResult")
            .field("label", &self.label)
            .field("confidence", &self.confidence)
            .field("has_detail", &self.detail.is_some())
            .finish()
    }
}

/// Outcome of one invocation as returned by the classifier
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InvocationOutcome {
    /// Result sealed under the request's content key
    Success {
        #[serde(with = "b64")]
        sealed_result: Vec<u8>,
    },
    /// Another path may succeed; the client falls back
    TransientFailure { reason: FailureKind },
    /// Deterministic failure; surfaced to the caller
    StructuralFailure { reason: FailureKind },
}

impl std::fmt::Debug for InvocationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success { sealed_result } => f
                .debug_struct("Success")
                .field("sealed_result_len", &sealed_result.len())
                .finish(),
            Self::TransientFailure { reason } => f
                .debug_struct("TransientFailure")
                .field("reason", reason)
                .finish(),
            Self::StructuralFailure { reason } => f
                .debug_struct("StructuralFailure")
                .field("reason", reason)
                .finish(),
        }
    }
}

/// Response envelope for one invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationResponse {
    pub correlation_id: CorrelationId,
    pub outcome: InvocationOutcome,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl InvocationResponse {
    pub fn new(correlation_id: CorrelationId, outcome: InvocationOutcome) -> Self {
        Self {
            correlation_id,
            outcome,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Error body for rejected invocations (401 / 400)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: FailureKind,
}

mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(|_| serde::de::Error::custom("invalid base64"))
    }
}
