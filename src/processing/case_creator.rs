//! Automatic case creation from NEW_APPLICATION envelopes.
//!
//! The protocol is idempotent against at-least-once delivery: search the
//! backend for cases already correlated to the envelope id and create
//! only when none exists. More than one match is a data-consistency
//! violation and is surfaced, never auto-resolved.

use std::sync::Arc;

use secrecy::ExposeSecret;
use tracing::{error, info, warn};

use crate::backend::auth::S2sTokenGenerator;
use crate::backend::gateway::CaseBackendGateway;
use crate::config::ServiceConfigProvider;
use crate::error::{CaseBackendError, ProcessingError};
use crate::model::case::{
    self, CaseAction, CaseDataContent, Event, BULK_SCAN_ENVELOPES,
};
use crate::model::{CaseCreationResult, Envelope};
use crate::transformation::{SuccessfulTransformation, TransformationGateway};

pub struct AutoCaseCreator {
    backend: Arc<dyn CaseBackendGateway>,
    transformer: Arc<dyn TransformationGateway>,
    s2s: Arc<dyn S2sTokenGenerator>,
    service_configs: Arc<ServiceConfigProvider>,
}

impl AutoCaseCreator {
    pub fn new(
        backend: Arc<dyn CaseBackendGateway>,
        transformer: Arc<dyn TransformationGateway>,
        s2s: Arc<dyn S2sTokenGenerator>,
        service_configs: Arc<ServiceConfigProvider>,
    ) -> Self {
        Self {
            backend,
            transformer,
            s2s,
            service_configs,
        }
    }

    /// Attempt to create a case from the envelope.
    ///
    /// Failures of the transformation and create calls are classified
    /// into the result; search failures propagate as errors so the
    /// message is redelivered instead of degrading to an exception
    /// record.
    pub async fn create_case(
        &self,
        envelope: &Envelope,
    ) -> Result<CaseCreationResult, ProcessingError> {
        let context = envelope.log_context();
        info!("Started attempt to automatically create a new case from envelope. {context}");

        let config = self.service_configs.get(&envelope.container)?;
        if !config.auto_case_creation_enabled {
            info!("Automatic case creation is disabled for the service - skipping. {context}");
            return Ok(CaseCreationResult::AbortedNoFailure);
        }

        let case_ids = self
            .backend
            .search_case_refs_by_envelope_id(&envelope.id, &envelope.container)
            .await?;

        match case_ids.as_slice() {
            [] => Ok(self
                .create_new_case(envelope, &config.transformation_url, &context)
                .await),
            [case_id] => {
                warn!(
                    case_id,
                    "Case already exists for envelope - skipping creation. {context}"
                );
                Ok(CaseCreationResult::AlreadyExists(*case_id))
            }
            _ => {
                error!(
                    case_ids = %join_ids(&case_ids),
                    "Multiple cases exist for envelope. {context}"
                );
                Ok(CaseCreationResult::UnrecoverableFailure)
            }
        }
    }

    async fn create_new_case(
        &self,
        envelope: &Envelope,
        transformation_url: &str,
        context: &str,
    ) -> CaseCreationResult {
        match self
            .transform_envelope(envelope, transformation_url, context)
            .await
        {
            Ok(transformation) => self.create_in_backend(transformation, envelope, context).await,
            Err(result) => result,
        }
    }

    /// Call the transformation service, classifying failures.
    async fn transform_envelope(
        &self,
        envelope: &Envelope,
        transformation_url: &str,
        context: &str,
    ) -> Result<SuccessfulTransformation, CaseCreationResult> {
        let s2s_token = match self.s2s.generate().await {
            Ok(token) => token,
            Err(e) => {
                error!("Failed to generate service token for transformation. {context} {e}");
                return Err(CaseCreationResult::PotentiallyRecoverableFailure);
            }
        };

        match self
            .transformer
            .transform_envelope(transformation_url, envelope, s2s_token.expose_secret())
            .await
        {
            Ok(transformation) => {
                info!("Received successful transformation response for envelope. {context}");
                Ok(transformation)
            }
            Err(e) if e.is_unrecoverable() => {
                error!("Transformation failed for envelope, not retryable. {context} {e}");
                Err(CaseCreationResult::UnrecoverableFailure)
            }
            Err(e) => {
                error!("An error occurred when transforming envelope into case data. {context} {e}");
                Err(CaseCreationResult::PotentiallyRecoverableFailure)
            }
        }
    }

    /// Two-phase create against the case backend, classifying failures.
    async fn create_in_backend(
        &self,
        transformation: SuccessfulTransformation,
        envelope: &Envelope,
        context: &str,
    ) -> CaseCreationResult {
        let details = transformation.case_creation_details;

        let submit = async {
            let started = self
                .backend
                .start_event(
                    &envelope.jurisdiction,
                    &details.case_type_id,
                    None,
                    &details.event_id,
                )
                .await?;

            let mut data = details.case_data;
            data.insert(
                BULK_SCAN_ENVELOPES.to_string(),
                case::single_envelope_reference(&envelope.id, CaseAction::Create),
            );

            self.backend
                .submit_event(
                    &envelope.jurisdiction,
                    &details.case_type_id,
                    None,
                    CaseDataContent {
                        data,
                        event: Event {
                            id: started.event_id.clone(),
                            summary: "Case created".to_string(),
                            description: Some(format!("Case created from envelope {}", envelope.id)),
                        },
                        event_token: started.token,
                    },
                )
                .await
        };

        match submit.await {
            Ok(case_id) => {
                info!(case_id, "Created new case from envelope. {context}");
                CaseCreationResult::Created(case_id)
            }
            Err(e @ CaseBackendError::CallFailed { .. }) if e.is_client_error() => {
                error!("Case backend rejected create request for envelope. {context} {e}");
                CaseCreationResult::UnrecoverableFailure
            }
            Err(e) => {
                error!("An error occurred when trying to create a case from envelope. {context} {e}");
                CaseCreationResult::PotentiallyRecoverableFailure
            }
        }
    }
}

fn join_ids(ids: &[u64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
