//! Fakes for end-to-end tests: a model provider API, a secrets extension,
//! and helpers to run the remote classifier on an ephemeral port.

#![allow(dead_code)]

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use confidant::audit::LogSink;
use confidant::model::{HttpModelProvider, LabelSet, ProviderKind};
use confidant::remote::{remote_router, RemoteClassifierBuilder, RemoteState};
use confidant::secrets::{Credential, SecretCache, SecretSource};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const EMAIL: &str = "Hi, following up on the term sheet";
pub const INVOKE_TOKEN: &str = "e2e-invoke-token";

/// Serve a router on 127.0.0.1 with an OS-assigned port
pub async fn spawn(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// An address nothing listens on
pub async fn closed_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// What the fake provider answers
#[derive(Clone)]
pub enum ProviderReply {
    Verdict { label: &'static str, confidence: f64 },
    Status(u16),
}

/// Fake Anthropic/OpenAI API. Records calls and request bodies.
#[derive(Clone)]
pub struct FakeProvider {
    reply: ProviderReply,
    api_key: &'static str,
    pub calls: Arc<AtomicUsize>,
    pub bodies: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl FakeProvider {
    pub fn new(reply: ProviderReply, api_key: &'static str) -> Self {
        Self {
            reply,
            api_key,
            calls: Arc::new(AtomicUsize::new(0)),
            bodies: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/v1/messages", post(anthropic_messages))
            .route("/v1/chat/completions", post(openai_completions))
            .with_state(self.clone())
    }

    fn answer(&self, headers: &HeaderMap, body: serde_json::Value) -> Result<String, Response> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.bodies.lock().unwrap().push(body);

        let presented = headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| {
                headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.strip_prefix("Bearer "))
                    .map(str::to_string)
            });
        if presented.as_deref() != Some(self.api_key) {
            return Err(StatusCode::UNAUTHORIZED.into_response());
        }

        match &self.reply {
            ProviderReply::Verdict { label, confidence } => Ok(serde_json::json!({
                "label": label,
                "confidence": confidence,
            })
            .to_string()),
            ProviderReply::Status(code) => Err(StatusCode::from_u16(*code)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
                .into_response()),
        }
    }
}

async fn anthropic_messages(
    State(fake): State<FakeProvider>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    match fake.answer(&headers, body) {
        Ok(text) => Json(serde_json::json!({
            "content": [{ "type": "text", "text": text }]
        }))
        .into_response(),
        Err(response) => response,
    }
}

async fn openai_completions(
    State(fake): State<FakeProvider>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    match fake.answer(&headers, body) {
        Ok(text) => Json(serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": text } }]
        }))
        .into_response(),
        Err(response) => response,
    }
}

/// Fake secrets extension (AWS Parameters and Secrets protocol)
#[derive(Clone)]
pub struct FakeSecretsExtension {
    secrets: Arc<HashMap<String, String>>,
    session_token: &'static str,
    pub hits: Arc<AtomicUsize>,
}

impl FakeSecretsExtension {
    pub fn new(session_token: &'static str, secrets: &[(&str, &str)]) -> Self {
        Self {
            secrets: Arc::new(
                secrets
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            session_token,
            hits: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/secretsmanager/get", get(get_secret))
            .with_state(self.clone())
    }
}

async fn get_secret(
    State(ext): State<FakeSecretsExtension>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    ext.hits.fetch_add(1, Ordering::SeqCst);
    let token = headers
        .get("X-Aws-Parameters-Secrets-Token")
        .and_then(|v| v.to_str().ok());
    if token != Some(ext.session_token) {
        return StatusCode::FORBIDDEN.into_response();
    }
    match query.get("secretId").and_then(|id| ext.secrets.get(id)) {
        Some(value) => Json(serde_json::json!({ "SecretString": value })).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub fn labels() -> Arc<LabelSet> {
    Arc::new(LabelSet::new(["needs_reply", "fyi", "newsletter", "promotional", "spam"]).unwrap())
}

/// HTTP model provider pointed at a fake
pub fn provider(kind: ProviderKind, addr: SocketAddr) -> Arc<HttpModelProvider> {
    Arc::new(
        HttpModelProvider::new(
            kind,
            Some(format!("http://{}", addr).as_str()),
            "test-model",
            128,
            labels(),
            Duration::from_secs(5),
        )
        .unwrap(),
    )
}

/// Run a remote classifier whose credential comes from `source`
pub async fn spawn_remote(
    source: SecretSource,
    model: Arc<HttpModelProvider>,
    sink: Arc<dyn LogSink>,
) -> SocketAddr {
    let classifier = RemoteClassifierBuilder::new()
        .credentials(SecretCache::from_source(&source).unwrap())
        .model(model)
        .sink(sink)
        .build()
        .unwrap();
    let state = RemoteState::new(Arc::new(classifier), &Credential::new(INVOKE_TOKEN));
    spawn(remote_router(state)).await
}

/// Environment-variable credential source with a fresh variable
pub fn env_source(var: &str, value: &str) -> SecretSource {
    std::env::set_var(var, value);
    SecretSource::Env {
        var: var.to_string(),
        field: None,
    }
}
