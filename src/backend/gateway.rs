//! Gateway to the case management backend.
//!
//! All mutations follow the two-phase protocol: `start_event` acquires a
//! single-use event token plus the case snapshot, the caller builds the
//! full payload from that snapshot, and `submit_event` applies it with
//! the token. Submitting a stale or reused token fails at the backend
//! rather than silently overwriting concurrent changes.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::backend::auth::{AuthCache, Credentials};
use crate::backend::query;
use crate::config::ServiceConfigProvider;
use crate::error::CaseBackendError;
use crate::model::{CaseDataContent, CaseDetails, SearchResult, StartedEvent};

/// Case backend operations used by the orchestrators.
#[async_trait]
pub trait CaseBackendGateway: Send + Sync {
    /// Ids of service cases referencing the given envelope.
    async fn search_case_refs_by_envelope_id(
        &self,
        envelope_id: &str,
        service: &str,
    ) -> Result<Vec<u64>, CaseBackendError>;

    /// Ids of service cases carrying the given legacy reference. Services
    /// with no case type ids configured short-circuit to an empty result.
    async fn search_case_refs_by_legacy_id(
        &self,
        legacy_id: &str,
        service: &str,
    ) -> Result<Vec<u64>, CaseBackendError>;

    /// Ids of exception records created from the given envelope.
    async fn search_exception_record_refs_by_envelope_id(
        &self,
        envelope_id: &str,
        service: &str,
    ) -> Result<Vec<u64>, CaseBackendError>;

    /// Ids of service cases created from the given exception record.
    async fn search_case_refs_by_bulk_scan_case_reference(
        &self,
        reference: &str,
        service: &str,
    ) -> Result<Vec<u64>, CaseBackendError>;

    /// Fetch one case. 404 maps to `CaseNotFound`, 400 to `InvalidCaseId`.
    async fn get_case(
        &self,
        case_ref: &str,
        jurisdiction: &str,
    ) -> Result<CaseDetails, CaseBackendError>;

    /// Phase one: acquire the event token and current case snapshot.
    /// `case_ref` of `None` targets the "create" pseudo-case.
    async fn start_event(
        &self,
        jurisdiction: &str,
        case_type_id: &str,
        case_ref: Option<&str>,
        event_type_id: &str,
    ) -> Result<StartedEvent, CaseBackendError>;

    /// Phase two: submit the payload with the token from `start_event`.
    /// Returns the backend-assigned (or confirmed) case id.
    async fn submit_event(
        &self,
        jurisdiction: &str,
        case_type_id: &str,
        case_ref: Option<&str>,
        content: CaseDataContent,
    ) -> Result<u64, CaseBackendError>;
}

/// HTTP implementation backed by `reqwest`, with per-jurisdiction
/// credential caching.
pub struct HttpCaseBackend {
    client: reqwest::Client,
    base_url: String,
    auth: Arc<AuthCache>,
    service_configs: Arc<ServiceConfigProvider>,
}

impl HttpCaseBackend {
    pub fn new(
        client: reqwest::Client,
        base_url: String,
        auth: Arc<AuthCache>,
        service_configs: Arc<ServiceConfigProvider>,
    ) -> Self {
        Self {
            client,
            base_url,
            auth,
            service_configs,
        }
    }

    /// Evict cached credentials when the backend rejects them, then
    /// surface the auth failure.
    async fn check_auth(
        &self,
        status: reqwest::StatusCode,
        jurisdiction: &str,
    ) -> Result<(), CaseBackendError> {
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            self.auth.invalidate(jurisdiction).await;
            return Err(CaseBackendError::Auth {
                jurisdiction: jurisdiction.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    async fn search_cases(
        &self,
        jurisdiction: &str,
        case_type_ids: &str,
        search_query: Value,
    ) -> Result<Vec<u64>, CaseBackendError> {
        let transport = |e: reqwest::Error| CaseBackendError::Transport {
            operation: "searchCases".to_string(),
            reason: e.to_string(),
        };

        let credentials = self.auth.credentials(jurisdiction).await?;
        let response = self
            .client
            .post(format!("{}/searchCases", self.base_url))
            .query(&[("ctid", case_type_ids)])
            .bearer_auth(credentials.user_token())
            .header("ServiceAuthorization", credentials.service_token())
            .json(&search_query)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        self.check_auth(status, jurisdiction).await?;
        if !status.is_success() {
            warn!(status = status.as_u16(), "Failed to call 'searchCases'");
            return Err(CaseBackendError::CallFailed {
                operation: "searchCases".to_string(),
                status: status.as_u16(),
            });
        }

        let result: SearchResult = response
            .json()
            .await
            .map_err(|e| CaseBackendError::MalformedResponse(e.to_string()))?;
        Ok(result.cases.into_iter().map(|c| c.id).collect())
    }

    fn event_trigger_url(
        &self,
        credentials: &Credentials,
        jurisdiction: &str,
        case_type_id: &str,
        case_ref: Option<&str>,
        event_type_id: &str,
    ) -> String {
        match case_ref {
            Some(case_ref) => format!(
                "{}/caseworkers/{}/jurisdictions/{}/case-types/{}/cases/{}/event-triggers/{}/token",
                self.base_url, credentials.user_id, jurisdiction, case_type_id, case_ref, event_type_id
            ),
            None => format!(
                "{}/caseworkers/{}/jurisdictions/{}/case-types/{}/event-triggers/{}/token",
                self.base_url, credentials.user_id, jurisdiction, case_type_id, event_type_id
            ),
        }
    }

    fn submit_url(
        &self,
        credentials: &Credentials,
        jurisdiction: &str,
        case_type_id: &str,
        case_ref: Option<&str>,
    ) -> String {
        match case_ref {
            Some(case_ref) => format!(
                "{}/caseworkers/{}/jurisdictions/{}/case-types/{}/cases/{}/events",
                self.base_url, credentials.user_id, jurisdiction, case_type_id, case_ref
            ),
            None => format!(
                "{}/caseworkers/{}/jurisdictions/{}/case-types/{}/cases",
                self.base_url, credentials.user_id, jurisdiction, case_type_id
            ),
        }
    }
}

#[async_trait]
impl CaseBackendGateway for HttpCaseBackend {
    async fn search_case_refs_by_envelope_id(
        &self,
        envelope_id: &str,
        service: &str,
    ) -> Result<Vec<u64>, CaseBackendError> {
        let config = self.service_configs.get(service)?;

        self.search_cases(
            &config.jurisdiction,
            &config.case_type_ids.join(","),
            query::by_envelope_reference(envelope_id),
        )
        .await
    }

    async fn search_case_refs_by_legacy_id(
        &self,
        legacy_id: &str,
        service: &str,
    ) -> Result<Vec<u64>, CaseBackendError> {
        let config = self.service_configs.get(service)?;

        if config.case_type_ids.is_empty() {
            info!(
                legacy_id,
                service, "Skipping case search by legacy ID: service has no case type ID configured"
            );
            return Ok(Vec::new());
        }

        self.search_cases(
            &config.jurisdiction,
            &config.case_type_ids.join(","),
            query::by_legacy_id(legacy_id),
        )
        .await
    }

    async fn search_exception_record_refs_by_envelope_id(
        &self,
        envelope_id: &str,
        service: &str,
    ) -> Result<Vec<u64>, CaseBackendError> {
        let config = self.service_configs.get(service)?;

        self.search_cases(
            &config.jurisdiction,
            &config.exception_record_case_type_id(),
            query::by_envelope_id(envelope_id),
        )
        .await
    }

    async fn search_case_refs_by_bulk_scan_case_reference(
        &self,
        reference: &str,
        service: &str,
    ) -> Result<Vec<u64>, CaseBackendError> {
        let config = self.service_configs.get(service)?;

        self.search_cases(
            &config.jurisdiction,
            &config.case_type_ids.join(","),
            query::by_bulk_scan_case_reference(reference),
        )
        .await
    }

    async fn get_case(
        &self,
        case_ref: &str,
        jurisdiction: &str,
    ) -> Result<CaseDetails, CaseBackendError> {
        let transport = |e: reqwest::Error| CaseBackendError::Transport {
            operation: "getCase".to_string(),
            reason: e.to_string(),
        };

        let credentials = self.auth.credentials(jurisdiction).await?;
        let response = self
            .client
            .get(format!("{}/cases/{}", self.base_url, case_ref))
            .bearer_auth(credentials.user_token())
            .header("ServiceAuthorization", credentials.service_token())
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        self.check_auth(status, jurisdiction).await?;
        match status.as_u16() {
            404 => Err(CaseBackendError::CaseNotFound {
                case_ref: case_ref.to_string(),
            }),
            400 => Err(CaseBackendError::InvalidCaseId {
                case_ref: case_ref.to_string(),
            }),
            s if !status.is_success() => {
                warn!(status = s, case_ref, "Failed to call 'getCase'");
                Err(CaseBackendError::CallFailed {
                    operation: "getCase".to_string(),
                    status: s,
                })
            }
            _ => response
                .json()
                .await
                .map_err(|e| CaseBackendError::MalformedResponse(e.to_string())),
        }
    }

    async fn start_event(
        &self,
        jurisdiction: &str,
        case_type_id: &str,
        case_ref: Option<&str>,
        event_type_id: &str,
    ) -> Result<StartedEvent, CaseBackendError> {
        let transport = |e: reqwest::Error| CaseBackendError::Transport {
            operation: "startEvent".to_string(),
            reason: e.to_string(),
        };

        let credentials = self.auth.credentials(jurisdiction).await?;
        let url =
            self.event_trigger_url(&credentials, jurisdiction, case_type_id, case_ref, event_type_id);

        let response = self
            .client
            .get(url)
            .bearer_auth(credentials.user_token())
            .header("ServiceAuthorization", credentials.service_token())
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        self.check_auth(status, jurisdiction).await?;
        if !status.is_success() {
            warn!(
                status = status.as_u16(),
                event_type_id, "Failed to call 'startEvent'"
            );
            return Err(CaseBackendError::CallFailed {
                operation: "startEvent".to_string(),
                status: status.as_u16(),
            });
        }

        debug!(event_type_id, case_type_id, "Started event in case backend");
        response
            .json()
            .await
            .map_err(|e| CaseBackendError::MalformedResponse(e.to_string()))
    }

    async fn submit_event(
        &self,
        jurisdiction: &str,
        case_type_id: &str,
        case_ref: Option<&str>,
        content: CaseDataContent,
    ) -> Result<u64, CaseBackendError> {
        let transport = |e: reqwest::Error| CaseBackendError::Transport {
            operation: "submitEvent".to_string(),
            reason: e.to_string(),
        };

        let credentials = self.auth.credentials(jurisdiction).await?;
        let url = self.submit_url(&credentials, jurisdiction, case_type_id, case_ref);

        let response = self
            .client
            .post(url)
            .bearer_auth(credentials.user_token())
            .header("ServiceAuthorization", credentials.service_token())
            .json(&content)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        self.check_auth(status, jurisdiction).await?;
        if !status.is_success() {
            warn!(
                status = status.as_u16(),
                case_type_id, "Failed to call 'submitEvent'"
            );
            return Err(CaseBackendError::CallFailed {
                operation: "submitEvent".to_string(),
                status: status.as_u16(),
            });
        }

        let case: CaseDetails = response
            .json()
            .await
            .map_err(|e| CaseBackendError::MalformedResponse(e.to_string()))?;
        Ok(case.id)
    }
}
