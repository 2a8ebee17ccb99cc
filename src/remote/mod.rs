//! Remote classifier
//!
//! The logging-restricted side of the boundary. Each invocation runs
//!
//! ```text
//! Received -> Decrypted -> ModelCalled -> ResultSealed -> Completed
//!     |           |
//!     +-----------+------> Errored
//! ```
//!
//! and emits only `received`, `completed` or `error:<kind>` events. The
//! classifier never retries: retry and fallback policy live in the client.

mod handler;

pub use handler::{remote_router, serve, RemoteState};

use crate::audit::{CorrelationId, EventType, LogEvent, LogSink, TracingSink};
use crate::config::ConfidantConfig;
use crate::crypto::{self, ContentKey, TransportSecret};
use crate::error::{Error, FailureKind, Result};
use crate::model::{HttpModelProvider, ModelProvider};
use crate::protocol::{
    ClassificationRequest, InvocationOutcome, InvocationResponse, KeyEnvelope,
};
use crate::secrets::SecretCache;
use std::sync::Arc;
use std::time::Duration;
use zeroize::Zeroizing;

/// Default budget for one model call
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(20);

/// Per-invocation progress, used only for content-free diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationStage {
    Received,
    Decrypted,
    ModelCalled,
    ResultSealed,
    Completed,
    Errored,
}

/// Remote classifier: open, classify, seal.
pub struct RemoteClassifier {
    credentials: SecretCache,
    transport_secret: Option<SecretCache>,
    model: Arc<dyn ModelProvider>,
    sink: Arc<dyn LogSink>,
    model_timeout: Duration,
}

impl RemoteClassifier {
    /// Build from configuration with the HTTP model provider and the
    /// tracing sink.
    pub fn from_config(config: &ConfidantConfig) -> Result<Self> {
        let labels = Arc::new(config.label_set()?);
        let model = HttpModelProvider::new(
            config.model.provider,
            config.model.base_url.as_deref(),
            config.model.model.clone(),
            config.model.max_tokens,
            labels,
            config.remote.model_timeout(),
        )?;

        let mut builder = RemoteClassifierBuilder::new()
            .credentials(SecretCache::from_source(&config.remote.credential_secret)?)
            .model(Arc::new(model))
            .model_timeout(config.remote.model_timeout());
        if let Some(source) = &config.remote.transport_secret {
            builder = builder.transport_secret(SecretCache::from_source(source)?);
        }
        builder.build()
    }

    /// Handle one invocation. Never fails: every failure becomes an outcome.
    pub async fn handle(&self, request: ClassificationRequest) -> InvocationResponse {
        let correlation_id = request.correlation_id;
        self.emit(correlation_id, EventType::Received);

        let mut stage = InvocationStage::Received;
        let outcome = match self.run(&request, &mut stage).await {
            Ok(sealed_result) => {
                stage = InvocationStage::Completed;
                tracing::debug!(correlation_id = %correlation_id, stage = ?stage, "Invocation finished");
                self.emit(correlation_id, EventType::Completed);
                InvocationOutcome::Success { sealed_result }
            }
            Err(e) => {
                let kind = e.failure_kind();
                tracing::debug!(
                    correlation_id = %correlation_id,
                    stage = ?InvocationStage::Errored,
                    failed_after = ?stage,
                    kind = kind.as_str(),
                    "Invocation errored"
                );
                self.emit(correlation_id, EventType::Error(kind));
                if e.triggers_fallback() {
                    InvocationOutcome::TransientFailure { reason: kind }
                } else {
                    InvocationOutcome::StructuralFailure { reason: kind }
                }
            }
        };

        InvocationResponse::new(correlation_id, outcome)
    }

    async fn run(
        &self,
        request: &ClassificationRequest,
        stage: &mut InvocationStage,
    ) -> Result<Vec<u8>> {
        let key = self.content_key(&request.content_key).await?;
        let plaintext = crypto::open(&request.encrypted_content, &key)?;
        let content = std::str::from_utf8(&plaintext)
            .map_err(|_| Error::ModelStructural(FailureKind::InvalidRequest))?;
        *stage = InvocationStage::Decrypted;

        let credential = self.credentials.get_credential().await?;
        let mut result = tokio::time::timeout(
            self.model_timeout,
            self.model.classify(content, credential, request.want_detail),
        )
        .await
        .map_err(|_| Error::ModelTransient(FailureKind::ModelTimeout))??;
        *stage = InvocationStage::ModelCalled;

        if !request.want_detail {
            result.detail = None;
        }
        let serialized = Zeroizing::new(serde_json::to_vec(&result)?);
        let sealed = crypto::seal(&serialized, &key)?;
        *stage = InvocationStage::ResultSealed;
        Ok(sealed)
    }

    async fn content_key(&self, envelope: &KeyEnvelope) -> Result<ContentKey> {
        match envelope {
            KeyEnvelope::Channel { key } => ContentKey::from_slice(key),
            KeyEnvelope::Wrapped { .. } => {
                let cache = self.transport_secret.as_ref().ok_or(Error::Decryption)?;
                let secret = TransportSecret::from_base64(cache.get_credential().await?.expose())?;
                crypto::unwrap_key(&envelope.to_wrapped()?, &secret)
            }
        }
    }

    fn emit(&self, correlation_id: CorrelationId, event_type: EventType) {
        self.sink.emit(LogEvent::new(correlation_id, event_type));
    }

    /// Whether the model credential has been fetched in this instantiation
    pub fn credential_cached(&self) -> bool {
        self.credentials.is_populated()
    }

    /// Whether `wrapped` key transport is available
    pub fn accepts_wrapped_keys(&self) -> bool {
        self.transport_secret.is_some()
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }
}

/// Builder for RemoteClassifier
pub struct RemoteClassifierBuilder {
    credentials: Option<SecretCache>,
    transport_secret: Option<SecretCache>,
    model: Option<Arc<dyn ModelProvider>>,
    sink: Arc<dyn LogSink>,
    model_timeout: Duration,
}

impl RemoteClassifierBuilder {
    pub fn new() -> Self {
        Self {
            credentials: None,
            transport_secret: None,
            model: None,
            sink: Arc::new(TracingSink),
            model_timeout: DEFAULT_MODEL_TIMEOUT,
        }
    }

    /// Set the model credential cache
    pub fn credentials(mut self, cache: SecretCache) -> Self {
        self.credentials = Some(cache);
        self
    }

    /// Set the transport secret cache (enables `wrapped` key transport)
    pub fn transport_secret(mut self, cache: SecretCache) -> Self {
        self.transport_secret = Some(cache);
        self
    }

    /// Set the model provider
    pub fn model(mut self, model: Arc<dyn ModelProvider>) -> Self {
        self.model = Some(model);
        self
    }

    /// Set the log sink
    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Set the model call budget
    pub fn model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<RemoteClassifier> {
        Ok(RemoteClassifier {
            credentials: self
                .credentials
                .ok_or_else(|| Error::Config("remote classifier needs a credential source".into()))?,
            transport_secret: self.transport_secret,
            model: self
                .model
                .ok_or_else(|| Error::Config("remote classifier needs a model provider".into()))?,
            sink: self.sink,
            model_timeout: self.model_timeout,
        })
    }
}

impl Default for RemoteClassifierBuilder {
    fn default() -> Self {
        Self::new()
    }
}
