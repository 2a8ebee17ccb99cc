//! Credential acquisition for the remote classifier
//!
//! The model credential lives in an external secret store readable only by
//! the classifier's execution identity. [`SecretCache`] fetches it once per
//! instantiation and reuses it for every warm invocation.

mod cache;
mod store;

pub use cache::{SecretCache, SecretRecord};
pub use store::{EnvSecretStore, HttpSecretStore, SecretStore};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A secret string (model API key, invoke token, transport secret).
///
/// Zeroized on drop; `Debug` never prints the value.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the secret value. Only for placing it in an auth header or
    /// parsing it; never for logging.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

/// Where a secret comes from, as configured
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "store", rename_all = "snake_case")]
pub enum SecretSource {
    /// Environment variable (local development)
    Env {
        /// Variable name
        var: String,
        /// JSON field to extract, for structured secrets
        #[serde(default)]
        field: Option<String>,
    },
    /// Secrets extension speaking the AWS Parameters and Secrets protocol
    Http {
        /// Extension base URL
        #[serde(default = "default_extension_endpoint")]
        endpoint: String,
        /// Secret name or ARN
        secret_id: String,
        /// JSON field to extract, for structured secrets
        #[serde(default)]
        field: Option<String>,
        /// Environment variable holding the extension session token
        #[serde(default = "default_token_var")]
        token_var: String,
    },
}

fn default_extension_endpoint() -> String {
    "http://localhost:2773".to_string()
}

fn default_token_var() -> String {
    "AWS_SESSION_TOKEN".to_string()
}

impl SecretSource {
    /// Name used to look the secret up in its store
    pub fn name(&self) -> &str {
        match self {
            Self::Env { var, .. } => var,
            Self::Http { secret_id, .. } => secret_id,
        }
    }

    /// Field to extract from a structured secret
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Env { field, .. } | Self::Http { field, .. } => field.as_deref(),
        }
    }

    /// Build the store this source points at
    pub fn store(&self) -> Result<Arc<dyn SecretStore>> {
        match self {
            Self::Env { .. } => Ok(Arc::new(EnvSecretStore)),
            Self::Http {
                endpoint,
                token_var,
                ..
            } => Ok(Arc::new(HttpSecretStore::new(endpoint, token_var)?)),
        }
    }
}

/// Turn a raw secret value into a credential.
///
/// With `field` set, the secret must be a JSON object holding that string
/// field. Parse errors are reported without echoing the secret.
pub(crate) fn extract_credential(raw: &Credential, field: Option<&str>) -> Result<Credential> {
    let credential = match field {
        None => Credential::new(raw.expose().trim()),
        Some(field) => {
            let mut value: serde_json::Value = serde_json::from_str(raw.expose())
                .map_err(|_| Error::CredentialUnavailable("structured secret is not JSON".into()))?;
            let extracted = value
                .get(field)
                .and_then(|v| v.as_str())
                .map(|s| Credential::new(s.trim()))
                .ok_or_else(|| {
                    Error::CredentialUnavailable(format!(
                        "structured secret has no string field '{}'",
                        field
                    ))
                });
            zeroize_json(&mut value);
            extracted?
        }
    };

    if credential.is_empty() {
        return Err(Error::CredentialUnavailable("secret is empty".into()));
    }
    Ok(credential)
}

fn zeroize_json(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::String(s) => s.zeroize(),
        serde_json::Value::Array(items) => items.iter_mut().for_each(zeroize_json),
        serde_json::Value::Object(map) => map.values_mut().for_each(zeroize_json),
        _ => {}
    }
}
