//! Secret store backends

use super::Credential;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Pluggable secret store.
///
/// Returns the raw secret value; field extraction and caching happen in
/// [`super::SecretCache`]. Implementations must never log the value.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch a secret by name
    async fn fetch(&self, name: &str) -> Result<Credential>;

    /// Backend name (for diagnostics)
    fn kind(&self) -> &str;
}

/// Reads secrets from environment variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecretStore;

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn fetch(&self, name: &str) -> Result<Credential> {
        std::env::var(name).map(Credential::new).map_err(|_| {
            Error::CredentialUnavailable(format!("environment variable {} not set", name))
        })
    }

    fn kind(&self) -> &str {
        "env"
    }
}

/// Secrets extension client (AWS Parameters and Secrets protocol).
///
/// `GET {endpoint}/secretsmanager/get?secretId={name}` with the session
/// token in `X-Aws-Parameters-Secrets-Token`.
pub struct HttpSecretStore {
    client: reqwest::Client,
    endpoint: String,
    token_var: String,
}

#[derive(Deserialize)]
struct SecretValueResponse {
    #[serde(rename = "SecretString")]
    secret_string: Option<String>,
}

impl HttpSecretStore {
    pub fn new(endpoint: &str, token_var: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(STORE_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build secret store client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token_var: token_var.to_string(),
        })
    }
}

#[async_trait]
impl SecretStore for HttpSecretStore {
    async fn fetch(&self, name: &str) -> Result<Credential> {
        let token = std::env::var(&self.token_var).map(Credential::new).map_err(|_| {
            Error::CredentialUnavailable(format!(
                "secret store token variable {} not set",
                self.token_var
            ))
        })?;

        let response = self
            .client
            .get(format!("{}/secretsmanager/get", self.endpoint))
            .query(&[("secretId", name)])
            .header("X-Aws-Parameters-Secrets-Token", token.expose())
            .send()
            .await
            .map_err(|e| {
                let reason = if e.is_timeout() {
                    "secret store timed out"
                } else {
                    "secret store unreachable"
                };
                Error::CredentialUnavailable(reason.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::CredentialUnavailable(format!(
                "secret store returned {}",
                status.as_u16()
            )));
        }

        let body: SecretValueResponse = response
            .json()
            .await
            .map_err(|_| Error::CredentialUnavailable("secret store response unreadable".into()))?;

        body.secret_string
            .map(Credential::new)
            .ok_or_else(|| Error::CredentialUnavailable("secret has no string value".into()))
    }

    fn kind(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_env_store_missing_variable() {
        let store = EnvSecretStore;
        let err = store
            .fetch("CONFIDANT_TEST_DEFINITELY_NOT_SET_7f3a")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CredentialUnavailable(_)));
    }

    #[tokio::test]
    async fn test_env_store_reads_variable() {
        std::env::set_var("CONFIDANT_TEST_ENV_STORE_KEY", "sk-env");
        let credential = EnvSecretStore
            .fetch("CONFIDANT_TEST_ENV_STORE_KEY")
            .await
            .unwrap();
        assert_eq!(credential.expose(), "sk-env");
    }

    #[tokio::test]
    async fn test_http_store_unreachable() {
        std::env::set_var("CONFIDANT_TEST_SESSION_TOKEN", "token");
        // Port 9 (discard) is closed on test hosts
        let store = HttpSecretStore::new("http://127.0.0.1:9", "CONFIDANT_TEST_SESSION_TOKEN").unwrap();
        let err = store.fetch("model-key").await.unwrap_err();
        assert!(matches!(err, Error::CredentialUnavailable(_)));
    }

    #[test]
    fn test_store_kinds() {
        assert_eq!(EnvSecretStore.kind(), "env");
        let http = HttpSecretStore::new("http://localhost:2773/", "T").unwrap();
        assert_eq!(http.kind(), "http");
        assert_eq!(http.endpoint, "http://localhost:2773");
    }
}
