//! Fallback path: direct provider call from the caller's environment
//!
//! Uses its own credential scope. Revoking the caller's direct key leaves
//! the remote classifier working, and the other way round.

use crate::audit::{CorrelationId, EventType, LogEvent, LogSink};
use crate::config::resolve_env_ref;
use crate::error::{Error, Result};
use crate::model::ModelProvider;
use crate::protocol::ClassificationResult;
use crate::secrets::Credential;
use std::sync::Arc;

/// Where the caller's direct provider credential comes from
#[derive(Clone)]
pub enum DirectCredential {
    /// Environment variable, read on every fallback
    Env { var: String },
    /// Held in memory
    Inline(Credential),
}

impl DirectCredential {
    /// Acquire the credential. Independent of the remote classifier's cache.
    pub fn acquire(&self) -> Result<Credential> {
        match self {
            Self::Env { var } => resolve_env_ref(var).map(Credential::new).ok_or_else(|| {
                Error::CredentialUnavailable(format!("fallback credential {} not set", var))
            }),
            Self::Inline(credential) if credential.is_empty() => Err(
                Error::CredentialUnavailable("fallback credential is empty".to_string()),
            ),
            Self::Inline(credential) => Ok(credential.clone()),
        }
    }
}

impl std::fmt::Debug for DirectCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Env { var } => f.debug_struct("Env").field("var", var).finish(),
            Self::Inline(_) => f.write_str("Inline([REDACTED])"),
        }
    }
}

/// Direct-to-provider classification
pub struct FallbackPath {
    model: Arc<dyn ModelProvider>,
    credential: DirectCredential,
    sink: Arc<dyn LogSink>,
}

impl FallbackPath {
    pub fn new(
        model: Arc<dyn ModelProvider>,
        credential: DirectCredential,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            model,
            credential,
            sink,
        }
    }

    /// Classify plaintext content directly. Emits `fallback` before the
    /// attempt so fallback frequency is visible without content.
    pub async fn classify_direct(
        &self,
        correlation_id: CorrelationId,
        content: &str,
        want_detail: bool,
    ) -> Result<ClassificationResult> {
        self.sink
            .emit(LogEvent::new(correlation_id, EventType::Fallback));

        let credential = self.credential.acquire()?;
        let mut result = self.model.classify(content, &credential, want_detail).await?;
        if !want_detail {
            result.detail = None;
        }
        Ok(result)
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }
}
