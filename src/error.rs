//! Confidant error types
//!
//! Every variant is content-free: messages carry failure codes, status
//! codes or configuration names, never email content, labels, credentials
//! or provider response bodies.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Content-free failure code.
///
/// Travels on the wire inside `InvocationOutcome` and inside `error`
/// log events, so it must never carry free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Envelope malformed, tampered, or opened with the wrong key
    Decryption,
    /// Secret store unreachable, secret missing or empty
    CredentialUnavailable,
    /// Model call exceeded its time budget
    ModelTimeout,
    /// Provider rate-limited the request
    ModelRateLimited,
    /// Provider unreachable or returned a server error
    ModelUnavailable,
    /// Provider rejected the credential
    ModelAuthRejected,
    /// Provider rejected the request shape
    ModelBadRequest,
    /// Provider answered with something that is not a verdict
    ModelBadResponse,
    /// Invocation request could not be decoded by the classifier
    InvalidRequest,
    /// Invocation response could not be decoded by the client
    MalformedResponse,
    /// Invocation handle unreachable (connection refused, DNS, TLS)
    ChannelUnreachable,
    /// Invocation credential rejected
    ChannelUnauthorized,
    /// Invocation handle does not exist
    ChannelNotFound,
    /// Invocation did not answer within its budget
    ChannelTimeout,
    /// Function platform failed while invoking
    ChannelFailure,
    /// Anything else
    Internal,
}

impl FailureKind {
    /// Stable wire/log name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Decryption => "decryption",
            Self::CredentialUnavailable => "credential_unavailable",
            Self::ModelTimeout => "model_timeout",
            Self::ModelRateLimited => "model_rate_limited",
            Self::ModelUnavailable => "model_unavailable",
            Self::ModelAuthRejected => "model_auth_rejected",
            Self::ModelBadRequest => "model_bad_request",
            Self::ModelBadResponse => "model_bad_response",
            Self::InvalidRequest => "invalid_request",
            Self::MalformedResponse => "malformed_response",
            Self::ChannelUnreachable => "channel_unreachable",
            Self::ChannelUnauthorized => "channel_unauthorized",
            Self::ChannelNotFound => "channel_not_found",
            Self::ChannelTimeout => "channel_timeout",
            Self::ChannelFailure => "channel_failure",
            Self::Internal => "internal",
        }
    }

    /// Whether a model failure of this kind may succeed on another path
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ModelTimeout | Self::ModelRateLimited | Self::ModelUnavailable
        )
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confidant error type
#[derive(Error, Debug)]
pub enum Error {
    /// Envelope could not be opened (tampered, truncated, wrong key)
    #[error("classification unavailable: envelope could not be opened")]
    Decryption,

    /// Classifier credential could not be obtained
    #[error("classification unavailable: classifier credential unavailable ({0})")]
    CredentialUnavailable(String),

    /// Model failure that another path may not hit
    #[error("classification unavailable: transient model failure ({0})")]
    ModelTransient(FailureKind),

    /// Deterministic failure; retrying elsewhere would fail the same way
    #[error("classification unavailable: structural failure ({0})")]
    ModelStructural(FailureKind),

    /// Invocation channel failed before the classifier answered
    #[error("classification unavailable: invocation channel failed ({0})")]
    Channel(FailureKind),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Content-free code for this error, as reported on the wire and in logs
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Decryption => FailureKind::Decryption,
            Self::CredentialUnavailable(_) => FailureKind::CredentialUnavailable,
            Self::ModelTransient(kind) | Self::ModelStructural(kind) | Self::Channel(kind) => *kind,
            Self::Config(_) | Self::Serialization(_) | Self::Io(_) | Self::Internal(_) => {
                FailureKind::Internal
            }
        }
    }

    /// Whether the invocation client should switch to the fallback path.
    ///
    /// `CredentialUnavailable` is deliberately not included: a missing
    /// classifier credential surfaces as "classifier unavailable".
    pub fn triggers_fallback(&self) -> bool {
        matches!(self, Self::ModelTransient(_) | Self::Channel(_))
    }

    /// Rebuild an error from a structural failure reported by the classifier
    pub fn from_structural(kind: FailureKind) -> Self {
        match kind {
            FailureKind::Decryption => Self::Decryption,
            FailureKind::CredentialUnavailable => {
                Self::CredentialUnavailable("reported by remote classifier".to_string())
            }
            other => Self::ModelStructural(other),
        }
    }
}

/// Result type alias for Confidant operations
pub type Result<T> = std::result::Result<T, Error>;
