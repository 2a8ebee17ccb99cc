//! Invocation transports
//!
//! An [`Invoker`] carries one sealed request to the remote classifier over
//! the authenticated channel and brings back its response. Channel-level
//! failures surface as `Error::Channel` so the client can fall back.

use crate::error::{Error, FailureKind, Result};
use crate::protocol::{ClassificationRequest, InvocationResponse};
use crate::remote::RemoteClassifier;
use crate::secrets::Credential;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Authenticated channel to a remote classifier
#[async_trait]
pub trait Invoker: Send + Sync {
    /// Invoke the classifier once
    async fn invoke(&self, request: ClassificationRequest) -> Result<InvocationResponse>;

    /// Opaque invocation handle (for diagnostics)
    fn handle(&self) -> &str;
}

/// Invokes a function URL with a bearer token scoped to that handle
pub struct HttpInvoker {
    client: reqwest::Client,
    handle: String,
    token: Credential,
}

impl HttpInvoker {
    pub fn new(handle: impl Into<String>, token: Credential, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build invoke client: {}", e)))?;

        Ok(Self {
            client,
            handle: handle.into(),
            token,
        })
    }
}

/// Map an invoke HTTP status to the failure taxonomy
pub fn channel_status(status: u16) -> Error {
    match status {
        401 | 403 => Error::Channel(FailureKind::ChannelUnauthorized),
        404 => Error::Channel(FailureKind::ChannelNotFound),
        408 | 504 => Error::Channel(FailureKind::ChannelTimeout),
        400 | 413 | 422 => Error::ModelStructural(FailureKind::InvalidRequest),
        _ => Error::Channel(FailureKind::ChannelFailure),
    }
}

fn channel_transport(err: &reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Channel(FailureKind::ChannelTimeout)
    } else if err.is_builder() {
        Error::Channel(FailureKind::ChannelNotFound)
    } else {
        Error::Channel(FailureKind::ChannelUnreachable)
    }
}

#[async_trait]
impl Invoker for HttpInvoker {
    async fn invoke(&self, request: ClassificationRequest) -> Result<InvocationResponse> {
        let response = self
            .client
            .post(&self.handle)
            .bearer_auth(self.token.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| channel_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "Invocation rejected by channel");
            return Err(channel_status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| channel_transport(&e))?;
        serde_json::from_slice(&body)
            .map_err(|_| Error::ModelStructural(FailureKind::MalformedResponse))
    }

    fn handle(&self) -> &str {
        &self.handle
    }
}

/// Calls a classifier in the same process (local development, `doctor`)
pub struct LocalInvoker {
    classifier: Arc<RemoteClassifier>,
}

impl LocalInvoker {
    pub fn new(classifier: Arc<RemoteClassifier>) -> Self {
        Self { classifier }
    }
}

#[async_trait]
impl Invoker for LocalInvoker {
    async fn invoke(&self, request: ClassificationRequest) -> Result<InvocationResponse> {
        Ok(self.classifier.handle(request).await)
    }

    fn handle(&self) -> &str {
        "local"
    }
}
