//! Confidant configuration management
//!
//! Secrets never appear in the configuration file itself: they are
//! referenced by environment variable name (`*_ref`) or by secret-store
//! source.

use crate::error::{Error, Result};
use crate::model::{LabelSet, ProviderKind};
use crate::protocol::KeyTransport;
use crate::secrets::SecretSource;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main Confidant configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidantConfig {
    /// Closed label set
    pub labels: Vec<String>,

    /// Remote classifier (function side) configuration
    pub remote: RemoteConfig,

    /// Invocation client (caller side) configuration
    pub client: ClientConfig,

    /// Model provider configuration
    pub model: ModelConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for ConfidantConfig {
    fn default() -> Self {
        Self {
            labels: default_labels(),
            remote: RemoteConfig::default(),
            client: ClientConfig::default(),
            model: ModelConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Default label set
pub fn default_labels() -> Vec<String> {
    ["needs_reply", "fyi", "newsletter", "promotional", "spam"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Remote classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Address the invoke endpoint binds to
    pub bind: String,

    /// Environment variable holding the invoke token callers must present
    pub invoke_token_ref: String,

    /// Where the model API key lives
    pub credential_secret: SecretSource,

    /// Where the static X25519 transport secret lives (for `wrapped` requests)
    pub transport_secret: Option<SecretSource>,

    /// Budget for one model call in seconds
    pub model_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:9797".to_string(),
            invoke_token_ref: "CONFIDANT_INVOKE_TOKEN".to_string(),
            credential_secret: SecretSource::Http {
                endpoint: "http://localhost:2773".to_string(),
                secret_id: "confidant/model-api-key".to_string(),
                field: None,
                token_var: "AWS_SESSION_TOKEN".to_string(),
            },
            transport_secret: None,
            model_timeout_secs: 20,
        }
    }
}

impl RemoteConfig {
    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }
}

/// Invocation client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Invocation handle (function URL), treated as opaque
    pub handle: String,

    /// Environment variable holding the invoke-scoped token
    pub invoke_token_ref: String,

    /// Budget for the invoke round trip in seconds
    pub invoke_timeout_secs: u64,

    /// Budget for invoke plus fallback in seconds
    pub total_timeout_secs: u64,

    /// Ask for an explanation alongside the label
    pub want_detail: bool,

    /// How the content key reaches the classifier
    pub key_transport: KeyTransport,

    /// Classifier's X25519 public key, base64 (for `wrapped`)
    pub remote_public_key: Option<String>,

    /// Fall back to a direct provider call on transient/channel failure
    pub fallback_enabled: bool,

    /// Environment variable holding the caller's own provider key
    pub fallback_api_key_ref: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            handle: "http://127.0.0.1:9797/invoke".to_string(),
            invoke_token_ref: "CONFIDANT_INVOKE_TOKEN".to_string(),
            invoke_timeout_secs: 25,
            total_timeout_secs: 60,
            want_detail: false,
            key_transport: KeyTransport::Channel,
            remote_public_key: None,
            fallback_enabled: true,
            fallback_api_key_ref: "CONFIDANT_FALLBACK_API_KEY".to_string(),
        }
    }
}

impl ClientConfig {
    pub fn invoke_timeout(&self) -> Duration {
        Duration::from_secs(self.invoke_timeout_secs)
    }

    pub fn total_timeout(&self) -> Duration {
        Duration::from_secs(self.total_timeout_secs)
    }
}

/// Model provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Provider API shape
    pub provider: ProviderKind,

    /// Custom base URL
    pub base_url: Option<String>,

    /// Model name
    pub model: String,

    /// Max tokens for the verdict
    pub max_tokens: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Anthropic,
            base_url: None,
            model: "claude-3-5-haiku-latest".to_string(),
            max_tokens: 256,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Output format
    pub format: LogFormat,

    /// `EnvFilter` directive; `RUST_LOG` takes precedence
    pub filter: Option<String>,
}

impl ConfidantConfig {
    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        self.label_set()?;

        if self.remote.model_timeout_secs == 0 {
            return Err(Error::Config("remote.model_timeout_secs must be > 0".into()));
        }
        if self.client.invoke_timeout_secs == 0 {
            return Err(Error::Config("client.invoke_timeout_secs must be > 0".into()));
        }
        if self.client.total_timeout_secs < self.client.invoke_timeout_secs {
            return Err(Error::Config(
                "client.total_timeout_secs must be >= client.invoke_timeout_secs".into(),
            ));
        }
        if self.client.key_transport == KeyTransport::Wrapped
            && self.client.remote_public_key.is_none()
        {
            return Err(Error::Config(
                "client.key_transport = \"wrapped\" requires client.remote_public_key".into(),
            ));
        }
        if self.client.handle.trim().is_empty() {
            return Err(Error::Config("client.handle must not be empty".into()));
        }
        if self.client.key_transport == KeyTransport::Channel
            && !carries_key_privately(&self.client.handle)
        {
            return Err(Error::Config(
                "client.key_transport = \"channel\" requires an https handle or a loopback \
                 address; use \"wrapped\" otherwise"
                    .into(),
            ));
        }
        Ok(())
    }

    /// The configured closed label set
    pub fn label_set(&self) -> Result<LabelSet> {
        LabelSet::new(self.labels.iter().cloned())
    }
}

/// Whether a content key sent in the clear inside the request body stays
/// private on the way to `handle`: TLS, or a loopback hop.
fn carries_key_privately(handle: &str) -> bool {
    let Ok(url) = reqwest::Url::parse(handle.trim()) else {
        return false;
    };
    match url.scheme() {
        "https" => true,
        "http" => match url.host_str() {
            Some("localhost") => true,
            Some(host) => host
                .trim_start_matches('[')
                .trim_end_matches(']')
                .parse::<std::net::IpAddr>()
                .map(|ip| ip.is_loopback())
                .unwrap_or(false),
            None => false,
        },
        _ => false,
    }
}

/// Resolve a secret referenced by environment variable name.
///
/// Tries the exact name, then its UPPER_CASE form.
pub fn resolve_env_ref(name: &str) -> Option<String> {
    std::env::var(name)
        .or_else(|_| std::env::var(name.to_uppercase()))
        .ok()
        .filter(|v| !v.trim().is_empty())
}
