//! Model provider capability
//!
//! The classifier treats the model as an opaque capability: content in,
//! a label from a closed set plus confidence out, or a failure classified
//! as transient or structural.

mod http;
mod labels;

pub use http::{HttpModelProvider, ProviderKind};
pub use labels::{Label, LabelSet};

use crate::error::{Error, FailureKind, Result};
use crate::protocol::ClassificationResult;
use crate::secrets::Credential;
use async_trait::async_trait;
use serde::Deserialize;

/// Pluggable model provider.
///
/// Errors must be `Error::ModelTransient` or `Error::ModelStructural`
/// carrying a content-free [`FailureKind`].
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Classify content with the given credential
    async fn classify(
        &self,
        content: &str,
        credential: &Credential,
        want_detail: bool,
    ) -> Result<ClassificationResult>;

    /// Provider name (for diagnostics)
    fn name(&self) -> &str;
}

/// Map a provider HTTP status to the failure taxonomy.
///
/// 408/429/5xx (including 529 "overloaded") are transient; credential
/// rejections and request-shape rejections are structural.
pub fn classify_status(status: u16) -> Error {
    match status {
        408 => Error::ModelTransient(FailureKind::ModelTimeout),
        429 => Error::ModelTransient(FailureKind::ModelRateLimited),
        500..=599 => Error::ModelTransient(FailureKind::ModelUnavailable),
        401 | 403 => Error::ModelStructural(FailureKind::ModelAuthRejected),
        _ => Error::ModelStructural(FailureKind::ModelBadRequest),
    }
}

/// Map a transport-level failure to the failure taxonomy
pub fn classify_transport(err: &reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::ModelTransient(FailureKind::ModelTimeout)
    } else if err.is_builder() {
        Error::ModelStructural(FailureKind::ModelBadRequest)
    } else {
        Error::ModelTransient(FailureKind::ModelUnavailable)
    }
}

/// System instructions asking for a single JSON verdict
pub fn build_instructions(labels: &LabelSet, want_detail: bool) -> String {
    let mut instructions = format!(
        "You classify emails. Choose exactly one label from: {}.\n\
         Respond with a single JSON object and nothing else, with keys \
         \"label\" (one of the labels) and \"confidence\" (a number from 0 to 1)",
        labels.iter().collect::<Vec<_>>().join(", ")
    );
    if want_detail {
        instructions.push_str(", plus \"detail\": one short sentence explaining the choice");
    }
    instructions.push('.');
    instructions
}

#[derive(Deserialize)]
struct RawVerdict {
    label: String,
    confidence: f64,
    #[serde(default)]
    detail: Option<String>,
}

/// Parse the model's text answer into a verdict.
///
/// Anything that is not a JSON object with an in-set label and a finite
/// confidence in `[0, 1]` is `ModelBadResponse`. Errors never echo the text.
pub fn parse_verdict(text: &str, labels: &LabelSet, want_detail: bool) -> Result<ClassificationResult> {
    let bad = || Error::ModelStructural(FailureKind::ModelBadResponse);

    let start = text.find('{').ok_or_else(bad)?;
    let end = text.rfind('}').ok_or_else(bad)?;
    if end < start {
        return Err(bad());
    }

    let raw: RawVerdict = serde_json::from_str(&text[start..=end]).map_err(|_| bad())?;
    let label = labels.parse(raw.label.trim()).ok_or_else(bad)?;
    if !raw.confidence.is_finite() || !(0.0..=1.0).contains(&raw.confidence) {
        return Err(bad());
    }

    Ok(ClassificationResult {
        label,
        confidence: raw.confidence,
        detail: if want_detail { raw.detail } else { None },
    })
}
