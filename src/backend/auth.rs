//! Per-jurisdiction credential acquisition and caching.
//!
//! The cache is the only shared mutable state in the orchestrator. It is
//! read by many concurrent callers and invalidated only on an observed
//! 401/403 from the case backend, never proactively expired.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{CaseBackendError, S2sTokenError};

/// Credentials for one jurisdiction: a user token, a service-to-service
/// token, and the id of the system user the tokens belong to.
#[derive(Clone)]
pub struct Credentials {
    pub user_token: SecretString,
    pub service_token: SecretString,
    pub user_id: String,
}

impl Credentials {
    pub fn user_token(&self) -> &str {
        self.user_token.expose_secret()
    }

    pub fn service_token(&self) -> &str {
        self.service_token.expose_secret()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

/// Acquires credentials for a jurisdiction. Token acquisition details
/// live behind this seam; the orchestrator only sees the cache.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authenticate(&self, jurisdiction: &str) -> Result<Credentials, CaseBackendError>;
}

/// Explicit, injectable per-jurisdiction credential cache.
pub struct AuthCache {
    provider: Arc<dyn AuthProvider>,
    cache: RwLock<HashMap<String, Arc<Credentials>>>,
}

impl AuthCache {
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        Self {
            provider,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Cached credentials for the jurisdiction, authenticating on miss.
    pub async fn credentials(
        &self,
        jurisdiction: &str,
    ) -> Result<Arc<Credentials>, CaseBackendError> {
        if let Some(credentials) = self.cache.read().await.get(jurisdiction) {
            return Ok(Arc::clone(credentials));
        }

        let credentials = Arc::new(self.provider.authenticate(jurisdiction).await?);

        let mut cache = self.cache.write().await;
        // A concurrent caller may have authenticated first; keep theirs.
        let entry = cache
            .entry(jurisdiction.to_string())
            .or_insert_with(|| Arc::clone(&credentials));
        Ok(Arc::clone(entry))
    }

    /// Evict the jurisdiction's credentials. Called only when the backend
    /// answered 401/403; the next caller re-authenticates.
    pub async fn invalidate(&self, jurisdiction: &str) {
        let evicted = self.cache.write().await.remove(jurisdiction).is_some();
        if evicted {
            info!(jurisdiction, "Evicted cached credentials after auth failure");
        } else {
            debug!(jurisdiction, "No cached credentials to evict");
        }
    }
}

// ── Service-to-service tokens ───────────────────────────────────────

/// Generates a fresh service-to-service credential. Used directly by the
/// transformation calls and, through [`AuthProvider`], for the case
/// backend's `ServiceAuthorization` header.
#[async_trait]
pub trait S2sTokenGenerator: Send + Sync {
    async fn generate(&self) -> Result<SecretString, S2sTokenError>;
}

#[derive(Debug, Deserialize)]
struct LeaseResponse {
    token: String,
}

/// Leases service-to-service tokens over HTTP.
pub struct HttpS2sTokenGenerator {
    client: reqwest::Client,
    s2s_url: String,
}

impl HttpS2sTokenGenerator {
    pub fn new(client: reqwest::Client, s2s_url: String) -> Self {
        Self { client, s2s_url }
    }
}

#[async_trait]
impl S2sTokenGenerator for HttpS2sTokenGenerator {
    async fn generate(&self) -> Result<SecretString, S2sTokenError> {
        let lease: LeaseResponse = self
            .client
            .post(format!("{}/lease", self.s2s_url))
            .send()
            .await
            .map_err(|e| S2sTokenError(e.to_string()))?
            .error_for_status()
            .map_err(|e| S2sTokenError(e.to_string()))?
            .json()
            .await
            .map_err(|e| S2sTokenError(e.to_string()))?;
        Ok(SecretString::from(lease.token))
    }
}

// ── HTTP provider ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct IdamTokenResponse {
    access_token: String,
    user_id: String,
}

/// Acquires an idam user token and a service-to-service token over HTTP.
pub struct HttpAuthProvider {
    client: reqwest::Client,
    idam_url: String,
    s2s: Arc<dyn S2sTokenGenerator>,
}

impl HttpAuthProvider {
    pub fn new(client: reqwest::Client, idam_url: String, s2s: Arc<dyn S2sTokenGenerator>) -> Self {
        Self {
            client,
            idam_url,
            s2s,
        }
    }
}

#[async_trait]
impl AuthProvider for HttpAuthProvider {
    async fn authenticate(&self, jurisdiction: &str) -> Result<Credentials, CaseBackendError> {
        let auth_error = |reason: String| CaseBackendError::Authentication {
            jurisdiction: jurisdiction.to_string(),
            reason,
        };

        let idam: IdamTokenResponse = self
            .client
            .post(format!("{}/token", self.idam_url))
            .json(&serde_json::json!({ "jurisdiction": jurisdiction }))
            .send()
            .await
            .map_err(|e| auth_error(e.to_string()))?
            .error_for_status()
            .map_err(|e| auth_error(e.to_string()))?
            .json()
            .await
            .map_err(|e| auth_error(e.to_string()))?;

        let service_token = self
            .s2s
            .generate()
            .await
            .map_err(|e| auth_error(e.to_string()))?;

        Ok(Credentials {
            user_token: SecretString::from(idam.access_token),
            service_token,
            user_id: idam.user_id,
        })
    }
}
