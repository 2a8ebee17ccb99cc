//! HTTP model providers (Anthropic Messages, OpenAI Chat Completions)

use super::{build_instructions, classify_status, classify_transport, parse_verdict, LabelSet, ModelProvider};
use crate::error::{Error, FailureKind, Result};
use crate::protocol::ClassificationResult;
use crate::secrets::Credential;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Supported provider API shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Anthropic,
    #[serde(rename = "openai")]
    OpenAi,
}

impl ProviderKind {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Anthropic => "https://api.anthropic.com",
            Self::OpenAi => "https://api.openai.com",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
        }
    }
}

/// Model provider reached over HTTPS.
///
/// Requests ask the provider not to store them where the API allows it
/// (`store: false` for OpenAI). The client never logs request or
/// response bodies.
pub struct HttpModelProvider {
    client: reqwest::Client,
    kind: ProviderKind,
    base_url: String,
    model: String,
    max_tokens: u32,
    labels: Arc<LabelSet>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicBlock>,
}

#[derive(Deserialize)]
struct AnthropicBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: Option<String>,
}

impl HttpModelProvider {
    pub fn new(
        kind: ProviderKind,
        base_url: Option<&str>,
        model: impl Into<String>,
        max_tokens: u32,
        labels: Arc<LabelSet>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build model client: {}", e)))?;

        Ok(Self {
            client,
            kind,
            base_url: base_url
                .unwrap_or(kind.default_base_url())
                .trim_end_matches('/')
                .to_string(),
            model: model.into(),
            max_tokens,
            labels,
        })
    }

    fn request(&self, content: &str, credential: &Credential, want_detail: bool) -> reqwest::RequestBuilder {
        let instructions = build_instructions(&self.labels, want_detail);
        match self.kind {
            ProviderKind::Anthropic => self
                .client
                .post(format!("{}/v1/messages", self.base_url))
                .header("x-api-key", credential.expose())
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&json!({
                    "model": self.model,
                    "max_tokens": self.max_tokens,
                    "temperature": 0,
                    "system": instructions,
                    "messages": [{ "role": "user", "content": content }],
                })),
            ProviderKind::OpenAi => self
                .client
                .post(format!("{}/v1/chat/completions", self.base_url))
                .bearer_auth(credential.expose())
                .json(&json!({
                    "model": self.model,
                    "max_tokens": self.max_tokens,
                    "temperature": 0,
                    "store": false,
                    "response_format": { "type": "json_object" },
                    "messages": [
                        { "role": "system", "content": instructions },
                        { "role": "user", "content": content },
                    ],
                })),
        }
    }

    async fn answer_text(&self, response: reqwest::Response) -> Result<String> {
        let bad = |e: reqwest::Error| body_error(&e);
        let text = match self.kind {
            ProviderKind::Anthropic => {
                let body: AnthropicResponse = response.json().await.map_err(bad)?;
                body.content
                    .into_iter()
                    .filter(|b| b.block_type == "text")
                    .filter_map(|b| b.text)
                    .collect::<Vec<_>>()
                    .join("")
            }
            ProviderKind::OpenAi => {
                let body: OpenAiResponse = response.json().await.map_err(bad)?;
                body.choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .unwrap_or_default()
            }
        };
        if text.is_empty() {
            return Err(Error::ModelStructural(FailureKind::ModelBadResponse));
        }
        Ok(text)
    }
}

/// Only a body that arrived whole and does not parse is a bad answer.
/// A body cut short by a reset or the client timeout is transient.
fn body_error(err: &reqwest::Error) -> Error {
    use std::error::Error as _;

    let unparseable = err
        .source()
        .map_or(false, |source| source.is::<serde_json::Error>());
    if err.is_decode() && unparseable {
        Error::ModelStructural(FailureKind::ModelBadResponse)
    } else {
        classify_transport(err)
    }
}

#[async_trait]
impl ModelProvider for HttpModelProvider {
    async fn classify(
        &self,
        content: &str,
        credential: &Credential,
        want_detail: bool,
    ) -> Result<ClassificationResult> {
        let started = std::time::Instant::now();
        let response = self
            .request(content, credential, want_detail)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        tracing::debug!(
            provider = self.kind.as_str(),
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Model call returned"
        );
        if !status.is_success() {
            return Err(classify_status(status.as_u16()));
        }

        let text = self.answer_text(response).await?;
        parse_verdict(&text, &self.labels, want_detail)
    }

    fn name(&self) -> &str {
        self.kind.as_str()
    }
}
