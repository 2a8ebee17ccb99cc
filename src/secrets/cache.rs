//! Process-lifetime secret cache

use super::{extract_credential, Credential, SecretSource, SecretStore};
use crate::error::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// A fetched secret and when it was fetched.
///
/// Lives as long as the cache that holds it; never persisted.
#[derive(Debug)]
pub struct SecretRecord {
    credential: Credential,
    fetched_at: DateTime<Utc>,
}

impl SecretRecord {
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }
}

/// Lazily populated, read-mostly credential cache.
///
/// The first successful fetch is kept for the lifetime of the cache (one
/// execution environment instantiation). A failed fetch leaves the cache
/// empty, so the failing invocation surfaces `CredentialUnavailable` and the
/// next invocation tries again. There is no mid-lifetime invalidation.
pub struct SecretCache {
    store: Arc<dyn SecretStore>,
    name: String,
    field: Option<String>,
    record: OnceCell<SecretRecord>,
}

impl SecretCache {
    pub fn new(store: Arc<dyn SecretStore>, name: impl Into<String>, field: Option<String>) -> Self {
        Self {
            store,
            name: name.into(),
            field,
            record: OnceCell::new(),
        }
    }

    /// Build a cache over a configured source
    pub fn from_source(source: &SecretSource) -> Result<Self> {
        Ok(Self::new(
            source.store()?,
            source.name(),
            source.field().map(str::to_string),
        ))
    }

    /// Get the credential, fetching it on first use.
    ///
    /// Concurrent first calls wait on a single fetch.
    pub async fn get_credential(&self) -> Result<&Credential> {
        let record = self
            .record
            .get_or_try_init(|| self.fetch_record())
            .await?;
        Ok(record.credential())
    }

    async fn fetch_record(&self) -> Result<SecretRecord> {
        let raw = self.store.fetch(&self.name).await.map_err(|e| {
            tracing::warn!(
                secret = %self.name,
                store = self.store.kind(),
                kind = %e.failure_kind(),
                "Secret fetch failed"
            );
            e
        })?;
        let credential = extract_credential(&raw, self.field.as_deref())?;

        tracing::debug!(
            secret = %self.name,
            store = self.store.kind(),
            "Secret cached for this instantiation"
        );

        Ok(SecretRecord {
            credential,
            fetched_at: Utc::now(),
        })
    }

    /// Whether a credential has been cached
    pub fn is_populated(&self) -> bool {
        self.record.initialized()
    }

    /// When the cached credential was fetched
    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.record.get().map(SecretRecord::fetched_at)
    }

    /// Name of the secret this cache serves
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for SecretCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCache")
            .field("name", &self.name)
            .field("store", &self.store.kind())
            .field("populated", &self.is_populated())
            .finish_non_exhaustive()
    }
}
