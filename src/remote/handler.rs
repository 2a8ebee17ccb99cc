//! HTTP surface of the remote classifier
//!
//! - POST /invoke: authenticated invocation (bearer invoke token)
//! - GET  /health: liveness and cache state, no secrets

use super::RemoteClassifier;
use crate::error::{FailureKind, Result};
use crate::protocol::{ApiError, ClassificationRequest};
use crate::secrets::Credential;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared state for remote handlers
#[derive(Clone)]
pub struct RemoteState {
    pub classifier: Arc<RemoteClassifier>,
    token_digest: [u8; 32],
}

impl RemoteState {
    /// Only the digest of the invoke token is kept.
    pub fn new(classifier: Arc<RemoteClassifier>, invoke_token: &Credential) -> Self {
        Self {
            classifier,
            token_digest: Sha256::digest(invoke_token.expose().as_bytes()).into(),
        }
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let Some(presented) = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
        else {
            return false;
        };
        let digest: [u8; 32] = Sha256::digest(presented.trim().as_bytes()).into();
        digest == self.token_digest
    }
}

/// Create the remote classifier router
pub fn remote_router(state: RemoteState) -> Router {
    Router::new()
        .route("/invoke", post(invoke))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the router until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: RemoteState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!("Remote classifier listening on {}", addr);
    axum::serve(listener, remote_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    tracing::info!("Remote classifier stopped");
    Ok(())
}

/// POST /invoke: run one classification
async fn invoke(State(state): State<RemoteState>, headers: HeaderMap, body: Bytes) -> Response {
    if !state.authorized(&headers) {
        tracing::warn!("Rejected invocation with missing or invalid token");
        return (
            StatusCode::UNAUTHORIZED,
            Json(ApiError {
                code: FailureKind::ChannelUnauthorized,
            }),
        )
            .into_response();
    }

    let request: ClassificationRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(_) => {
            tracing::warn!(body_len = body.len(), "Rejected undecodable invocation request");
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiError {
                    code: FailureKind::InvalidRequest,
                }),
            )
                .into_response();
        }
    };

    let response = state.classifier.handle(request).await;
    (StatusCode::OK, Json(response)).into_response()
}

/// GET /health
async fn health(State(state): State<RemoteState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.classifier.model_name(),
        "credential_cached": state.classifier.credential_cached(),
        "wrapped_keys": state.classifier.accepts_wrapped_keys(),
    }))
}
