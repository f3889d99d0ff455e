//! Fallback path: create a provisional exception record from an
//! envelope when automated case creation or attachment cannot proceed.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::backend::gateway::CaseBackendGateway;
use crate::config::ServiceConfigProvider;
use crate::error::{CaseBackendError, ProcessingError};
use crate::model::case::{
    CaseDataContent, CollectionElement, Event, AWAITING_PAYMENT_DCN_PROCESSING, CASE_REFERENCE,
    CONTAINS_PAYMENTS, DELIVERY_DATE, ENVELOPE_ID, ENVELOPE_LEGACY_CASE_REFERENCE,
    EVENT_CREATE_EXCEPTION, FORM_TYPE, JOURNEY_CLASSIFICATION, NO, OPENING_DATE, PO_BOX,
    PO_BOX_JURISDICTION, SCANNED_DOCUMENTS, SCAN_OCR_DATA, YES,
};
use crate::model::{CaseData, Envelope};
use crate::processing::documents;

const EVENT_SUMMARY: &str = "Create new exception record";

/// Creates exception records, idempotently against redelivery.
pub struct ExceptionRecordCreator {
    backend: Arc<dyn CaseBackendGateway>,
    service_configs: Arc<ServiceConfigProvider>,
}

impl ExceptionRecordCreator {
    pub fn new(
        backend: Arc<dyn CaseBackendGateway>,
        service_configs: Arc<ServiceConfigProvider>,
    ) -> Self {
        Self {
            backend,
            service_configs,
        }
    }

    /// Create an exception record for the envelope, or return the id of
    /// the record a previous delivery already created.
    pub async fn try_create_from(&self, envelope: &Envelope) -> Result<u64, ProcessingError> {
        let config = self.service_configs.get(&envelope.container)?;

        let existing = self
            .backend
            .search_exception_record_refs_by_envelope_id(&envelope.id, &envelope.container)
            .await
            .map_err(|source| ProcessingError::ExceptionRecordFailed {
                envelope_id: envelope.id.clone(),
                source,
            })?;

        match existing.as_slice() {
            [] => {}
            [record_id] => {
                info!(
                    record_id,
                    envelope_id = %envelope.id,
                    "Exception record already exists for envelope - not creating a new one"
                );
                return Ok(*record_id);
            }
            ids => {
                warn!(
                    envelope_id = %envelope.id,
                    ?ids,
                    "Multiple exception records exist for envelope"
                );
                return Err(ProcessingError::CaseBackend(
                    CaseBackendError::MultipleCasesFound {
                        case_ids: ids
                            .iter()
                            .map(|id| id.to_string())
                            .collect::<Vec<_>>()
                            .join(", "),
                        reference: envelope.id.clone(),
                    },
                ));
            }
        }

        let case_type_id = config.exception_record_case_type_id();
        let jurisdiction = config.jurisdiction.clone();

        let create = async {
            let started = self
                .backend
                .start_event(&jurisdiction, &case_type_id, None, EVENT_CREATE_EXCEPTION)
                .await?;

            self.backend
                .submit_event(
                    &jurisdiction,
                    &case_type_id,
                    None,
                    CaseDataContent {
                        data: exception_record_data(envelope),
                        event: Event {
                            id: started.event_id.clone(),
                            summary: EVENT_SUMMARY.to_string(),
                            description: Some(format!(
                                "Exception record created from envelope {}",
                                envelope.id
                            )),
                        },
                        event_token: started.token,
                    },
                )
                .await
        };

        let record_id =
            create
                .await
                .map_err(|source| ProcessingError::ExceptionRecordFailed {
                    envelope_id: envelope.id.clone(),
                    source,
                })?;

        info!(
            record_id,
            envelope_id = %envelope.id,
            case_type_id,
            "Created exception record for envelope"
        );
        Ok(record_id)
    }
}

/// Map an envelope into exception-record case data.
fn exception_record_data(envelope: &Envelope) -> CaseData {
    let mut data = CaseData::new();
    data.insert(ENVELOPE_ID.to_string(), Value::from(envelope.id.as_str()));
    data.insert(PO_BOX.to_string(), Value::from(envelope.po_box.as_str()));
    data.insert(
        PO_BOX_JURISDICTION.to_string(),
        Value::from(envelope.jurisdiction.as_str()),
    );
    data.insert(
        JOURNEY_CLASSIFICATION.to_string(),
        Value::from(envelope.classification.as_str()),
    );
    if let Some(form_type) = &envelope.form_type {
        data.insert(FORM_TYPE.to_string(), Value::from(form_type.as_str()));
    }
    data.insert(
        DELIVERY_DATE.to_string(),
        serde_json::to_value(envelope.delivery_date).unwrap_or(Value::Null),
    );
    data.insert(
        OPENING_DATE.to_string(),
        serde_json::to_value(envelope.opening_date).unwrap_or(Value::Null),
    );
    if let Some(legacy_ref) = &envelope.legacy_case_ref {
        data.insert(
            ENVELOPE_LEGACY_CASE_REFERENCE.to_string(),
            Value::from(legacy_ref.as_str()),
        );
    }
    if let Some(case_ref) = &envelope.case_ref {
        data.insert(CASE_REFERENCE.to_string(), Value::from(case_ref.as_str()));
    }
    data.insert(
        SCANNED_DOCUMENTS.to_string(),
        documents::to_scanned_documents_value(&envelope.documents),
    );
    if !envelope.ocr_data.is_empty() {
        let fields: Vec<Value> = envelope
            .ocr_data
            .iter()
            .map(|field| {
                serde_json::to_value(CollectionElement::new(serde_json::json!({
                    "key": field.name,
                    "value": field.value,
                })))
                .unwrap_or(Value::Null)
            })
            .collect();
        data.insert(SCAN_OCR_DATA.to_string(), Value::Array(fields));
    }
    let payments_flag = if envelope.has_payments() { YES } else { NO };
    data.insert(CONTAINS_PAYMENTS.to_string(), Value::from(payments_flag));
    data.insert(
        AWAITING_PAYMENT_DCN_PROCESSING.to_string(),
        Value::from(payments_flag),
    );
    data
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use std::sync::Mutex;

    use super::*;
    use crate::config::ServiceConfig;
    use crate::model::case::{CaseDetails, StartedEvent};

    struct FakeBackend {
        existing_records: Vec<u64>,
        submitted: Mutex<Vec<(String, CaseDataContent)>>,
    }

    #[async_trait]
    impl CaseBackendGateway for FakeBackend {
        async fn search_case_refs_by_envelope_id(
            &self,
            _envelope_id: &str,
            _service: &str,
        ) -> Result<Vec<u64>, CaseBackendError> {
            Ok(vec![])
        }

        async fn search_case_refs_by_legacy_id(
            &self,
            _legacy_id: &str,
            _service: &str,
        ) -> Result<Vec<u64>, CaseBackendError> {
            Ok(vec![])
        }

        async fn search_exception_record_refs_by_envelope_id(
            &self,
            _envelope_id: &str,
            _service: &str,
        ) -> Result<Vec<u64>, CaseBackendError> {
            Ok(self.existing_records.clone())
        }

        async fn search_case_refs_by_bulk_scan_case_reference(
            &self,
            _reference: &str,
            _service: &str,
        ) -> Result<Vec<u64>, CaseBackendError> {
            Ok(vec![])
        }

        async fn get_case(
            &self,
            case_ref: &str,
            _jurisdiction: &str,
        ) -> Result<CaseDetails, CaseBackendError> {
            Err(CaseBackendError::CaseNotFound {
                case_ref: case_ref.to_string(),
            })
        }

        async fn start_event(
            &self,
            _jurisdiction: &str,
            _case_type_id: &str,
            _case_ref: Option<&str>,
            event_type_id: &str,
        ) -> Result<StartedEvent, CaseBackendError> {
            Ok(StartedEvent {
                event_id: event_type_id.to_string(),
                token: "exc-token".to_string(),
                case_details: None,
            })
        }

        async fn submit_event(
            &self,
            _jurisdiction: &str,
            case_type_id: &str,
            _case_ref: Option<&str>,
            content: CaseDataContent,
        ) -> Result<u64, CaseBackendError> {
            self.submitted
                .lock()
                .unwrap()
                .push((case_type_id.to_string(), content));
            Ok(501)
        }
    }

    fn configs() -> Arc<ServiceConfigProvider> {
        Arc::new(ServiceConfigProvider::new(vec![ServiceConfig {
            service: "bulkscan".to_string(),
            jurisdiction: "BULKSCAN".to_string(),
            case_type_ids: vec!["Bulk_Scanned".to_string()],
            transformation_url: String::new(),
            auto_case_creation_enabled: false,
            allow_creating_case_before_payments_are_processed: false,
            supports_envelope_references: false,
        }]))
    }

    fn envelope() -> Envelope {
        serde_json::from_value(serde_json::json!({
            "id": "env-9",
            "poBox": "PO 123",
            "jurisdiction": "BULKSCAN",
            "container": "bulkscan",
            "zipFileName": "envelope.zip",
            "formType": "A1",
            "deliveryDate": "2024-04-12T10:15:30Z",
            "openingDate": "2024-04-12T11:00:00Z",
            "classification": "EXCEPTION",
            "documents": [
                {"uuid": "doc-1", "controlNumber": "1001", "fileName": "a.pdf", "documentType": "form", "scannedAt": null}
            ],
            "ocrData": [{"name": "firstName", "value": "Ada"}],
            "payments": [{"documentControlNumber": "2001"}]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn creates_record_with_mapped_envelope_data() {
        let backend = Arc::new(FakeBackend {
            existing_records: vec![],
            submitted: Mutex::new(Vec::new()),
        });
        let creator = ExceptionRecordCreator::new(Arc::clone(&backend) as _, configs());

        let record_id = creator.try_create_from(&envelope()).await.unwrap();
        assert_eq!(record_id, 501);

        let submitted = backend.submitted.lock().unwrap();
        let (case_type_id, content) = &submitted[0];
        assert_eq!(case_type_id, "BULKSCAN_ExceptionRecord");
        assert_eq!(content.event_token, "exc-token");
        assert_eq!(content.data[ENVELOPE_ID], "env-9");
        assert_eq!(content.data[JOURNEY_CLASSIFICATION], "EXCEPTION");
        assert_eq!(content.data[CONTAINS_PAYMENTS], YES);
        assert_eq!(content.data[AWAITING_PAYMENT_DCN_PROCESSING], YES);
        assert_eq!(
            content.data[SCANNED_DOCUMENTS][0]["value"]["controlNumber"],
            "1001"
        );
        assert_eq!(content.data[SCAN_OCR_DATA][0]["value"]["key"], "firstName");
    }

    #[tokio::test]
    async fn reuses_existing_record_on_redelivery() {
        let backend = Arc::new(FakeBackend {
            existing_records: vec![400],
            submitted: Mutex::new(Vec::new()),
        });
        let creator = ExceptionRecordCreator::new(Arc::clone(&backend) as _, configs());

        let record_id = creator.try_create_from(&envelope()).await.unwrap();

        assert_eq!(record_id, 400);
        assert!(backend.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn multiple_existing_records_are_an_error() {
        let backend = Arc::new(FakeBackend {
            existing_records: vec![400, 401],
            submitted: Mutex::new(Vec::new()),
        });
        let creator = ExceptionRecordCreator::new(Arc::clone(&backend) as _, configs());

        let result = creator.try_create_from(&envelope()).await;

        assert!(matches!(
            result,
            Err(ProcessingError::CaseBackend(
                CaseBackendError::MultipleCasesFound { .. }
            ))
        ));
    }

    #[tokio::test]
    async fn envelope_without_payments_is_not_awaiting_dcn_processing() {
        let mut envelope = envelope();
        envelope.payments.clear();
        let data = exception_record_data(&envelope);
        assert_eq!(data[CONTAINS_PAYMENTS], NO);
        assert_eq!(data[AWAITING_PAYMENT_DCN_PROCESSING], NO);
    }
}
