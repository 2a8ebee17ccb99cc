//! Client and remote classifier talking over real HTTP, with fake provider
//! and secrets extension servers.

mod common;

use common::*;
use confidant::audit::{EventType, MemorySink};
use confidant::client::{DirectCredential, FallbackPath, HttpInvoker, InvocationClientBuilder};
use confidant::model::ProviderKind;
use confidant::secrets::{Credential, SecretSource};
use confidant::{ClassificationPath, Error, FailureKind, InvocationClient};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

fn client(
    remote: SocketAddr,
    token: &str,
    direct: Option<(SocketAddr, &'static str)>,
    sink: Arc<MemorySink>,
) -> InvocationClient {
    let invoker = HttpInvoker::new(
        format!("http://{}/invoke", remote),
        Credential::new(token),
        Duration::from_secs(5),
    )
    .unwrap();
    let mut builder = InvocationClientBuilder::new(Arc::new(invoker)).sink(sink.clone());
    if let Some((addr, key)) = direct {
        builder = builder.fallback(FallbackPath::new(
            provider(ProviderKind::Anthropic, addr),
            DirectCredential::Inline(Credential::new(key)),
            sink,
        ));
    }
    builder.build().unwrap()
}

#[tokio::test]
async fn term_sheet_classified_through_remote() {
    let remote_api = FakeProvider::new(
        ProviderReply::Verdict {
            label: "needs_reply",
            confidence: 0.92,
        },
        "sk-remote",
    );
    let direct_api = FakeProvider::new(
        ProviderReply::Verdict {
            label: "fyi",
            confidence: 0.1,
        },
        "sk-direct",
    );
    let remote_api_addr = spawn(remote_api.router()).await;
    let direct_api_addr = spawn(direct_api.router()).await;

    let remote_sink = Arc::new(MemorySink::new());
    let remote = spawn_remote(
        env_source("CONFIDANT_E2E_KEY_TERM_SHEET", "sk-remote"),
        provider(ProviderKind::Anthropic, remote_api_addr),
        remote_sink.clone(),
    )
    .await;

    let client_sink = Arc::new(MemorySink::new());
    let client = client(
        remote,
        INVOKE_TOKEN,
        Some((direct_api_addr, "sk-direct")),
        client_sink.clone(),
    );

    let classification = client.classify(EMAIL).await.unwrap();
    assert_eq!(classification.path, ClassificationPath::Remote);
    assert_eq!(classification.result.label.as_str(), "needs_reply");
    assert_eq!(classification.result.confidence, 0.92);
    assert!(classification.result.detail.is_none());

    assert_eq!(remote_api.calls(), 1);
    assert_eq!(direct_api.calls(), 0);
    let body = remote_api.bodies.lock().unwrap()[0].clone();
    assert_eq!(body["messages"][0]["content"], EMAIL);

    let events = remote_sink.events();
    assert_eq!(
        remote_sink.event_types(),
        vec![EventType::Received, EventType::Completed]
    );
    assert!(events
        .iter()
        .all(|e| e.correlation_id == classification.correlation_id));
    assert!(client_sink.events().is_empty());
}

#[tokio::test]
async fn connection_refused_falls_back_to_direct_call() {
    let direct_api = FakeProvider::new(
        ProviderReply::Verdict {
            label: "needs_reply",
            confidence: 0.85,
        },
        "sk-direct",
    );
    let direct_api_addr = spawn(direct_api.router()).await;

    let sink = Arc::new(MemorySink::new());
    let client = client(
        closed_addr().await,
        INVOKE_TOKEN,
        Some((direct_api_addr, "sk-direct")),
        sink.clone(),
    );

    let classification = client.classify(EMAIL).await.unwrap();
    assert_eq!(classification.path, ClassificationPath::Fallback);
    assert_eq!(classification.result.label.as_str(), "needs_reply");
    assert_eq!(direct_api.calls(), 1);
    let body = direct_api.bodies.lock().unwrap()[0].clone();
    assert_eq!(body["messages"][0]["content"], EMAIL);
    assert_eq!(
        sink.event_types(),
        vec![
            EventType::Error(FailureKind::ChannelUnreachable),
            EventType::Fallback
        ]
    );
}

#[tokio::test]
async fn wrong_invoke_token_falls_back() {
    let remote_api = FakeProvider::new(
        ProviderReply::Verdict {
            label: "spam",
            confidence: 0.9,
        },
        "sk-remote",
    );
    let direct_api = FakeProvider::new(
        ProviderReply::Verdict {
            label: "spam",
            confidence: 0.7,
        },
        "sk-direct",
    );
    let remote_api_addr = spawn(remote_api.router()).await;
    let direct_api_addr = spawn(direct_api.router()).await;

    let remote_sink = Arc::new(MemorySink::new());
    let remote = spawn_remote(
        env_source("CONFIDANT_E2E_KEY_WRONG_TOKEN", "sk-remote"),
        provider(ProviderKind::Anthropic, remote_api_addr),
        remote_sink.clone(),
    )
    .await;

    let sink = Arc::new(MemorySink::new());
    let client = client(
        remote,
        "not-the-token",
        Some((direct_api_addr, "sk-direct")),
        sink.clone(),
    );

    let classification = client.classify(EMAIL).await.unwrap();
    assert_eq!(classification.path, ClassificationPath::Fallback);
    assert_eq!(remote_api.calls(), 0);
    assert!(remote_sink.events().is_empty());
    assert_eq!(
        sink.event_types()[0],
        EventType::Error(FailureKind::ChannelUnauthorized)
    );
}

#[tokio::test]
async fn rate_limited_remote_falls_back_exactly_once() {
    let remote_api = FakeProvider::new(ProviderReply::Status(429), "sk-remote");
    let direct_api = FakeProvider::new(
        ProviderReply::Verdict {
            label: "newsletter",
            confidence: 0.6,
        },
        "sk-direct",
    );
    let remote_api_addr = spawn(remote_api.router()).await;
    let direct_api_addr = spawn(direct_api.router()).await;

    let remote_sink = Arc::new(MemorySink::new());
    let remote = spawn_remote(
        env_source("CONFIDANT_E2E_KEY_RATE_LIMITED", "sk-remote"),
        provider(ProviderKind::Anthropic, remote_api_addr),
        remote_sink.clone(),
    )
    .await;

    let sink = Arc::new(MemorySink::new());
    let client = client(remote, INVOKE_TOKEN, Some((direct_api_addr, "sk-direct")), sink.clone());

    let classification = client.classify(EMAIL).await.unwrap();
    assert_eq!(classification.path, ClassificationPath::Fallback);
    assert_eq!(classification.result.label.as_str(), "newsletter");
    assert_eq!(remote_api.calls(), 1);
    assert_eq!(direct_api.calls(), 1);
    assert_eq!(
        remote_sink.event_types(),
        vec![
            EventType::Received,
            EventType::Error(FailureKind::ModelRateLimited)
        ]
    );
    assert_eq!(
        sink.event_types(),
        vec![
            EventType::Error(FailureKind::ModelRateLimited),
            EventType::Fallback
        ]
    );
}

#[tokio::test]
async fn rejected_model_credential_is_not_retried() {
    let remote_api = FakeProvider::new(
        ProviderReply::Verdict {
            label: "fyi",
            confidence: 0.5,
        },
        "sk-remote",
    );
    let direct_api = FakeProvider::new(
        ProviderReply::Verdict {
            label: "fyi",
            confidence: 0.5,
        },
        "sk-direct",
    );
    let remote_api_addr = spawn(remote_api.router()).await;
    let direct_api_addr = spawn(direct_api.router()).await;

    let remote = spawn_remote(
        env_source("CONFIDANT_E2E_KEY_REVOKED", "sk-revoked"),
        provider(ProviderKind::Anthropic, remote_api_addr),
        Arc::new(MemorySink::new()),
    )
    .await;

    let sink = Arc::new(MemorySink::new());
    let client = client(remote, INVOKE_TOKEN, Some((direct_api_addr, "sk-direct")), sink.clone());

    let err = client.classify(EMAIL).await.unwrap_err();
    assert!(matches!(
        err,
        Error::ModelStructural(FailureKind::ModelAuthRejected)
    ));
    assert!(err.to_string().starts_with("classification unavailable"));
    assert_eq!(remote_api.calls(), 1);
    assert_eq!(direct_api.calls(), 0);
    assert!(!sink.event_types().contains(&EventType::Fallback));
}

#[tokio::test]
async fn missing_secret_is_fatal_without_fallback() {
    let remote_api = FakeProvider::new(
        ProviderReply::Verdict {
            label: "fyi",
            confidence: 0.5,
        },
        "sk-remote",
    );
    let direct_api = FakeProvider::new(
        ProviderReply::Verdict {
            label: "fyi",
            confidence: 0.5,
        },
        "sk-direct",
    );
    let remote_api_addr = spawn(remote_api.router()).await;
    let direct_api_addr = spawn(direct_api.router()).await;

    let remote = spawn_remote(
        SecretSource::Env {
            var: "CONFIDANT_E2E_KEY_NEVER_SET_0d9".into(),
            field: None,
        },
        provider(ProviderKind::Anthropic, remote_api_addr),
        Arc::new(MemorySink::new()),
    )
    .await;

    let sink = Arc::new(MemorySink::new());
    let client = client(remote, INVOKE_TOKEN, Some((direct_api_addr, "sk-direct")), sink.clone());

    let err = client.classify(EMAIL).await.unwrap_err();
    assert!(matches!(err, Error::CredentialUnavailable(_)));
    assert!(err.to_string().starts_with("classification unavailable"));
    assert_eq!(remote_api.calls(), 0);
    assert_eq!(direct_api.calls(), 0);
}

#[tokio::test]
async fn secrets_extension_fetched_once_per_instance() {
    std::env::set_var("CONFIDANT_E2E_SESSION_TOKEN", "session-1");
    let extension = FakeSecretsExtension::new(
        "session-1",
        &[("confidant/openai", r#"{"api_key":"sk-structured"}"#)],
    );
    let extension_addr = spawn(extension.router()).await;

    let remote_api = FakeProvider::new(
        ProviderReply::Verdict {
            label: "promotional",
            confidence: 0.75,
        },
        "sk-structured",
    );
    let remote_api_addr = spawn(remote_api.router()).await;

    let remote = spawn_remote(
        SecretSource::Http {
            endpoint: format!("http://{}", extension_addr),
            secret_id: "confidant/openai".into(),
            field: Some("api_key".into()),
            token_var: "CONFIDANT_E2E_SESSION_TOKEN".into(),
        },
        provider(ProviderKind::OpenAi, remote_api_addr),
        Arc::new(MemorySink::new()),
    )
    .await;

    let client = client(remote, INVOKE_TOKEN, None, Arc::new(MemorySink::new()));
    for _ in 0..3 {
        let classification = client.classify(EMAIL).await.unwrap();
        assert_eq!(classification.result.label.as_str(), "promotional");
    }

    assert_eq!(extension.hits.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(remote_api.calls(), 3);
    let body = remote_api.bodies.lock().unwrap()[0].clone();
    assert_eq!(body["store"], false);
}

#[tokio::test]
async fn tampered_request_never_reaches_model() {
    use confidant::audit::CorrelationId;
    use confidant::crypto::{seal, ContentKey};
    use confidant::protocol::{ClassificationRequest, InvocationOutcome, InvocationResponse, KeyEnvelope};

    let remote_api = FakeProvider::new(
        ProviderReply::Verdict {
            label: "fyi",
            confidence: 0.5,
        },
        "sk-remote",
    );
    let remote_api_addr = spawn(remote_api.router()).await;
    let remote = spawn_remote(
        env_source("CONFIDANT_E2E_KEY_TAMPERED", "sk-remote"),
        provider(ProviderKind::Anthropic, remote_api_addr),
        Arc::new(MemorySink::new()),
    )
    .await;

    let key = ContentKey::generate();
    let mut encrypted_content = seal(EMAIL.as_bytes(), &key).unwrap();
    encrypted_content[5] ^= 0x80;
    let request = ClassificationRequest {
        correlation_id: CorrelationId::generate(),
        encrypted_content,
        content_key: KeyEnvelope::channel(&key),
        want_detail: false,
    };

    let response: InvocationResponse = reqwest::Client::new()
        .post(format!("http://{}/invoke", remote))
        .bearer_auth(INVOKE_TOKEN)
        .json(&request)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(matches!(
        response.outcome,
        InvocationOutcome::StructuralFailure {
            reason: FailureKind::Decryption
        }
    ));
    assert_eq!(remote_api.calls(), 0);
}
