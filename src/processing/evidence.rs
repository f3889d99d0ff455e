//! Attaching supplementary evidence to an existing case.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::backend::gateway::CaseBackendGateway;
use crate::config::ServiceConfigProvider;
use crate::error::ProcessingError;
use crate::model::case::{
    CaseAction, CaseDataContent, CollectionElement, EnvelopeReference, Event,
    BULK_SCAN_ENVELOPES, EVENT_ATTACH_SCANNED_DOCS, SCANNED_DOCUMENTS,
};
use crate::model::{CaseDetails, Envelope};
use crate::processing::documents;

const EVENT_SUMMARY: &str = "Attach scanned documents";

/// Merges an envelope's documents into an existing case via the
/// two-phase write protocol.
pub struct EvidenceAttacher {
    backend: Arc<dyn CaseBackendGateway>,
    service_configs: Arc<ServiceConfigProvider>,
}

impl EvidenceAttacher {
    pub fn new(
        backend: Arc<dyn CaseBackendGateway>,
        service_configs: Arc<ServiceConfigProvider>,
    ) -> Self {
        Self {
            backend,
            service_configs,
        }
    }

    /// Attach the envelope's new documents to the case. Returns `true`
    /// iff at least one document was attached; the caller decides the
    /// fallback policy for the all-duplicates case.
    pub async fn attach(
        &self,
        envelope: &Envelope,
        existing_case: &CaseDetails,
    ) -> Result<bool, ProcessingError> {
        let existing_docs = documents::scanned_documents(&existing_case.data);
        if documents::docs_to_add(&existing_docs, &envelope.documents).is_empty() {
            warn!(
                envelope_id = %envelope.id,
                case_id = existing_case.id,
                "Envelope has no new documents. Case not updated"
            );
            return Ok(false);
        }

        info!(
            envelope_id = %envelope.id,
            case_id = existing_case.id,
            "Attaching supplementary evidence from envelope to case"
        );

        let case_ref = existing_case.id.to_string();
        let case_type_id = existing_case.case_type_id.as_deref().unwrap_or_default();

        let attach = async {
            let started = self
                .backend
                .start_event(
                    &envelope.jurisdiction,
                    case_type_id,
                    Some(&case_ref),
                    EVENT_ATTACH_SCANNED_DOCS,
                )
                .await?;

            // Build the payload from the event's own snapshot: the case
            // may have changed since the pre-attach lookup.
            let mut data = started.case_data();
            let snapshot_docs = documents::scanned_documents(&data);
            let to_add = documents::docs_to_add(&snapshot_docs, &envelope.documents);

            let mut all_docs = snapshot_docs;
            all_docs.extend(to_add);
            data.insert(
                SCANNED_DOCUMENTS.to_string(),
                documents::to_scanned_documents_value(&all_docs),
            );

            if let Ok(config) = self.service_configs.get(&envelope.container)
                && config.supports_envelope_references
            {
                data.insert(
                    BULK_SCAN_ENVELOPES.to_string(),
                    append_envelope_reference(data.get(BULK_SCAN_ENVELOPES), &envelope.id),
                );
            }

            self.backend
                .submit_event(
                    &envelope.jurisdiction,
                    case_type_id,
                    Some(&case_ref),
                    CaseDataContent {
                        data,
                        event: Event {
                            id: started.event_id.clone(),
                            summary: EVENT_SUMMARY.to_string(),
                            description: None,
                        },
                        event_token: started.token,
                    },
                )
                .await
        };

        attach.await.map_err(|source| ProcessingError::AttachFailed {
            envelope_id: envelope.id.clone(),
            case_ref: case_ref.clone(),
            source,
        })?;

        info!(
            envelope_id = %envelope.id,
            case_id = existing_case.id,
            "Attached documents from envelope to case"
        );
        Ok(true)
    }
}

/// Existing envelope references plus an UPDATE entry for this envelope.
fn append_envelope_reference(existing: Option<&Value>, envelope_id: &str) -> Value {
    let mut references: Vec<Value> = existing
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let element = CollectionElement::new(EnvelopeReference {
        id: envelope_id.to_string(),
        action: CaseAction::Update,
    });
    references.push(serde_json::to_value(element).unwrap_or(Value::Null));
    Value::Array(references)
}
