//! Test doubles shared by unit tests

use crate::error::{Error, FailureKind, Result};
use crate::model::{LabelSet, ModelProvider};
use crate::protocol::ClassificationResult;
use crate::secrets::{Credential, SecretCache, SecretStore};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

enum StubOutcome {
    Verdict {
        label: String,
        confidence: f64,
        detail: Option<String>,
    },
    Transient(FailureKind),
    Structural(FailureKind),
}

/// Model provider that answers with a fixed outcome and records its inputs
pub(crate) struct StubModel {
    outcome: StubOutcome,
    delay: Option<Duration>,
    calls: AtomicUsize,
    seen_content: Mutex<Vec<String>>,
    seen_credentials: Mutex<Vec<String>>,
}

impl StubModel {
    fn with_outcome(outcome: StubOutcome) -> Self {
        Self {
            outcome,
            delay: None,
            calls: AtomicUsize::new(0),
            seen_content: Mutex::new(Vec::new()),
            seen_credentials: Mutex::new(Vec::new()),
        }
    }

    pub fn verdict(label: &str, confidence: f64) -> Self {
        Self::with_outcome(StubOutcome::Verdict {
            label: label.to_string(),
            confidence,
            detail: None,
        })
    }

    pub fn transient(kind: FailureKind) -> Self {
        Self::with_outcome(StubOutcome::Transient(kind))
    }

    pub fn structural(kind: FailureKind) -> Self {
        Self::with_outcome(StubOutcome::Structural(kind))
    }

    pub fn with_detail(mut self, text: &str) -> Self {
        if let StubOutcome::Verdict { detail, .. } = &mut self.outcome {
            *detail = Some(text.to_string());
        }
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_content(&self) -> Vec<String> {
        self.seen_content.lock().unwrap().clone()
    }

    pub fn seen_credentials(&self) -> Vec<String> {
        self.seen_credentials.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelProvider for StubModel {
    async fn classify(
        &self,
        content: &str,
        credential: &Credential,
        want_detail: bool,
    ) -> Result<ClassificationResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_content.lock().unwrap().push(content.to_string());
        self.seen_credentials
            .lock()
            .unwrap()
            .push(credential.expose().to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.outcome {
            StubOutcome::Verdict {
                label,
                confidence,
                detail,
            } => {
                let labels = LabelSet::new([label.as_str()])?;
                let label = labels
                    .parse(label)
                    .ok_or(Error::ModelStructural(FailureKind::ModelBadResponse))?;
                Ok(ClassificationResult {
                    label,
                    confidence: *confidence,
                    detail: if want_detail { detail.clone() } else { None },
                })
            }
            StubOutcome::Transient(kind) => Err(Error::ModelTransient(*kind)),
            StubOutcome::Structural(kind) => Err(Error::ModelStructural(*kind)),
        }
    }

    fn name(&self) -> &str {
        "stub"
    }
}

struct StaticStore(Option<String>);

#[async_trait]
impl SecretStore for StaticStore {
    async fn fetch(&self, _name: &str) -> Result<Credential> {
        self.0
            .clone()
            .map(Credential::new)
            .ok_or_else(|| Error::CredentialUnavailable("secret store unreachable".into()))
    }

    fn kind(&self) -> &str {
        "static"
    }
}

/// Cache over a store that always returns `value`
pub(crate) fn static_cache(value: &str) -> SecretCache {
    SecretCache::new(Arc::new(StaticStore(Some(value.to_string()))), "test-secret", None)
}

/// Cache over a store that is always unreachable
pub(crate) fn failing_cache() -> SecretCache {
    SecretCache::new(Arc::new(StaticStore(None)), "test-secret", None)
}
