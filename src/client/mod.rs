//! Invocation client
//!
//! Used by the calling application. Seals content under a fresh key,
//! invokes the remote classifier over the authenticated channel, opens the
//! sealed verdict, and owns the fallback policy:
//!
//! - `Success` → open and return
//! - `TransientFailure` or channel error → fallback path, exactly once
//! - `StructuralFailure` → surface, no fallback
//!
//! The remote classifier is never invoked twice for one classification.

mod fallback;
mod invoker;

pub use fallback::{DirectCredential, FallbackPath};
pub use invoker::{channel_status, HttpInvoker, Invoker, LocalInvoker};

use crate::audit::{CorrelationId, EventType, LogEvent, LogSink, TracingSink};
use crate::config::{default_labels, resolve_env_ref, ConfidantConfig};
use crate::crypto::{self, wrap_key, ContentKey, TransportPublicKey};
use crate::error::{Error, FailureKind, Result};
use crate::model::{HttpModelProvider, LabelSet};
use crate::protocol::{
    ClassificationRequest, ClassificationResult, InvocationOutcome, KeyEnvelope, KeyTransport,
};
use crate::secrets::Credential;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Default budget for the invoke round trip
pub const DEFAULT_INVOKE_TIMEOUT: Duration = Duration::from_secs(25);

/// Default budget for invoke plus fallback
pub const DEFAULT_TOTAL_TIMEOUT: Duration = Duration::from_secs(60);

/// Which path produced a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationPath {
    Remote,
    Fallback,
}

impl ClassificationPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Fallback => "fallback",
        }
    }
}

/// A verdict plus where it came from
#[derive(Clone)]
pub struct Classification {
    pub result: ClassificationResult,
    pub path: ClassificationPath,
    pub correlation_id: CorrelationId,
}

impl std::fmt::Debug for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classification")
            .field("result", &self.result)
            .field("path", &self.path)
            .field("correlation_id", &self.correlation_id)
            .finish()
    }
}

enum KeyWrapping {
    Channel,
    Wrapped(TransportPublicKey),
}

/// Client side of the boundary
pub struct InvocationClient {
    invoker: Arc<dyn Invoker>,
    fallback: Option<FallbackPath>,
    sink: Arc<dyn LogSink>,
    labels: Arc<LabelSet>,
    wrapping: KeyWrapping,
    want_detail: bool,
    invoke_timeout: Duration,
    total_timeout: Duration,
}

impl InvocationClient {
    /// Build from configuration: HTTP invoker to `client.handle`, and an
    /// HTTP fallback provider when `client.fallback_enabled`.
    pub fn from_config(config: &ConfidantConfig) -> Result<Self> {
        let labels = config.label_set()?;
        let token = resolve_env_ref(&config.client.invoke_token_ref).ok_or_else(|| {
            Error::Config(format!(
                "invoke token variable {} is not set",
                config.client.invoke_token_ref
            ))
        })?;
        let invoker = HttpInvoker::new(
            config.client.handle.clone(),
            Credential::new(token),
            config.client.invoke_timeout(),
        )?;

        let sink: Arc<dyn LogSink> = Arc::new(TracingSink);
        let mut builder = InvocationClientBuilder::new(Arc::new(invoker))
            .labels(labels.clone())
            .want_detail(config.client.want_detail)
            .sink(sink.clone())
            .invoke_timeout(config.client.invoke_timeout())
            .total_timeout(config.client.total_timeout());

        if config.client.key_transport == KeyTransport::Wrapped {
            let encoded = config.client.remote_public_key.as_deref().ok_or_else(|| {
                Error::Config("wrapped key transport needs client.remote_public_key".into())
            })?;
            builder = builder.wrapped_keys(TransportPublicKey::from_base64(encoded)?);
        }

        if config.client.fallback_enabled {
            let model = HttpModelProvider::new(
                config.model.provider,
                config.model.base_url.as_deref(),
                config.model.model.clone(),
                config.model.max_tokens,
                Arc::new(labels),
                config.client.total_timeout(),
            )?;
            let credential = DirectCredential::Env {
                var: config.client.fallback_api_key_ref.clone(),
            };
            builder = builder.fallback(FallbackPath::new(Arc::new(model), credential, sink));
        }

        builder.build()
    }

    /// Classify content. Returns a verdict or one terminal
    /// "classification unavailable" error.
    pub async fn classify(&self, content: &str) -> Result<Classification> {
        let correlation_id = CorrelationId::generate();
        match tokio::time::timeout(self.total_timeout, self.classify_with_id(correlation_id, content))
            .await
        {
            Ok(result) => result,
            Err(_) => {
                let err = Error::Channel(FailureKind::ChannelTimeout);
                self.emit(correlation_id, EventType::Error(err.failure_kind()));
                Err(err)
            }
        }
    }

    async fn classify_with_id(
        &self,
        correlation_id: CorrelationId,
        content: &str,
    ) -> Result<Classification> {
        let err = match self.invoke_remote(correlation_id, content).await {
            Ok(result) => {
                return Ok(Classification {
                    result,
                    path: ClassificationPath::Remote,
                    correlation_id,
                })
            }
            Err(e) => e,
        };

        self.emit(correlation_id, EventType::Error(err.failure_kind()));
        if !err.triggers_fallback() {
            return Err(err);
        }
        let Some(fallback) = &self.fallback else {
            return Err(err);
        };

        tracing::debug!(
            correlation_id = %correlation_id,
            reason = err.failure_kind().as_str(),
            "Falling back to direct provider call"
        );
        match fallback
            .classify_direct(correlation_id, content, self.want_detail)
            .await
        {
            Ok(result) => Ok(Classification {
                result,
                path: ClassificationPath::Fallback,
                correlation_id,
            }),
            Err(e) => {
                self.emit(correlation_id, EventType::Error(e.failure_kind()));
                Err(e)
            }
        }
    }

    /// One round trip through the remote classifier. The content key is
    /// dropped (and zeroized) when this returns.
    async fn invoke_remote(
        &self,
        correlation_id: CorrelationId,
        content: &str,
    ) -> Result<ClassificationResult> {
        let key = ContentKey::generate();
        let encrypted_content = crypto::seal(content.as_bytes(), &key)?;
        let content_key = match &self.wrapping {
            KeyWrapping::Channel => KeyEnvelope::channel(&key),
            KeyWrapping::Wrapped(public_key) => KeyEnvelope::wrapped(wrap_key(&key, public_key)?),
        };
        let request = ClassificationRequest {
            correlation_id,
            encrypted_content,
            content_key,
            want_detail: self.want_detail,
        };

        let response = tokio::time::timeout(self.invoke_timeout, self.invoker.invoke(request))
            .await
            .map_err(|_| Error::Channel(FailureKind::ChannelTimeout))??;

        if response.correlation_id != correlation_id {
            return Err(Error::ModelStructural(FailureKind::MalformedResponse));
        }

        match response.outcome {
            InvocationOutcome::Success { sealed_result } => self.open_result(&sealed_result, &key),
            InvocationOutcome::TransientFailure { reason } => Err(Error::ModelTransient(reason)),
            InvocationOutcome::StructuralFailure { reason } => Err(Error::from_structural(reason)),
        }
    }

    fn open_result(&self, sealed: &[u8], key: &ContentKey) -> Result<ClassificationResult> {
        let plaintext = crypto::open(sealed, key)?;
        let mut result: ClassificationResult = serde_json::from_slice(&plaintext)
            .map_err(|_| Error::ModelStructural(FailureKind::MalformedResponse))?;

        if !self.labels.contains(&result.label)
            || !result.confidence.is_finite()
            || !(0.0..=1.0).contains(&result.confidence)
        {
            return Err(Error::ModelStructural(FailureKind::ModelBadResponse));
        }
        if !self.want_detail {
            result.detail = None;
        }
        Ok(result)
    }

    fn emit(&self, correlation_id: CorrelationId, event_type: EventType) {
        self.sink.emit(LogEvent::new(correlation_id, event_type));
    }

    pub fn handle(&self) -> &str {
        self.invoker.handle()
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    pub fn key_transport(&self) -> KeyTransport {
        match self.wrapping {
            KeyWrapping::Channel => KeyTransport::Channel,
            KeyWrapping::Wrapped(_) => KeyTransport::Wrapped,
        }
    }
}

/// Builder for InvocationClient
pub struct InvocationClientBuilder {
    invoker: Arc<dyn Invoker>,
    fallback: Option<FallbackPath>,
    sink: Arc<dyn LogSink>,
    labels: Option<LabelSet>,
    wrapping: KeyWrapping,
    want_detail: bool,
    invoke_timeout: Duration,
    total_timeout: Duration,
}

impl InvocationClientBuilder {
    pub fn new(invoker: Arc<dyn Invoker>) -> Self {
        Self {
            invoker,
            fallback: None,
            sink: Arc::new(TracingSink),
            labels: None,
            wrapping: KeyWrapping::Channel,
            want_detail: false,
            invoke_timeout: DEFAULT_INVOKE_TIMEOUT,
            total_timeout: DEFAULT_TOTAL_TIMEOUT,
        }
    }

    /// Set the fallback path
    pub fn fallback(mut self, fallback: FallbackPath) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Set the log sink
    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Set the closed label set results are checked against
    pub fn labels(mut self, labels: LabelSet) -> Self {
        self.labels = Some(labels);
        self
    }

    /// Seal content keys to the classifier's public key
    pub fn wrapped_keys(mut self, remote_public_key: TransportPublicKey) -> Self {
        self.wrapping = KeyWrapping::Wrapped(remote_public_key);
        self
    }

    pub fn want_detail(mut self, want_detail: bool) -> Self {
        self.want_detail = want_detail;
        self
    }

    pub fn invoke_timeout(mut self, timeout: Duration) -> Self {
        self.invoke_timeout = timeout;
        self
    }

    pub fn total_timeout(mut self, timeout: Duration) -> Self {
        self.total_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<InvocationClient> {
        if self.total_timeout < self.invoke_timeout {
            return Err(Error::Config(
                "total timeout must not be shorter than the invoke timeout".into(),
            ));
        }
        let labels = match self.labels {
            Some(labels) => labels,
            None => LabelSet::new(default_labels())?,
        };

        Ok(InvocationClient {
            invoker: self.invoker,
            fallback: self.fallback,
            sink: self.sink,
            labels: Arc::new(labels),
            wrapping: self.wrapping,
            want_detail: self.want_detail,
            invoke_timeout: self.invoke_timeout,
            total_timeout: self.total_timeout,
        })
    }
}
