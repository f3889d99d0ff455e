//! The create-new-case callback: a single-pass validation pipeline that
//! finalizes an exception record into a real case.

use std::sync::Arc;

use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::backend::auth::S2sTokenGenerator;
use crate::backend::gateway::CaseBackendGateway;
use crate::callback::record::ExceptionRecord;
use crate::callback::validator::{service_from_case_type_id, ExceptionRecordValidator};
use crate::config::{ServiceConfig, ServiceConfigProvider};
use crate::error::{CallbackError, CaseBackendError};
use crate::model::case::{
    CaseData, CaseDataContent, CaseDetails, Event, AWAITING_PAYMENT_DCN_PROCESSING,
    BULK_SCAN_CASE_REFERENCE, BULK_SCAN_ENVELOPES, CASE_REFERENCE, DISPLAY_WARNINGS,
    EVENT_CREATE_NEW_CASE, NO, OCR_DATA_VALIDATION_WARNINGS, YES,
};
use crate::model::case::{single_envelope_reference, CaseAction};
use crate::model::ProcessResult;
use crate::payments::PaymentsNotifier;
use crate::transformation::TransformationGateway;

pub const AWAITING_PAYMENTS_MESSAGE: &str =
    "Payments for this Exception Record have not been processed yet";
pub const PAYMENT_ERROR_MESSAGE: &str =
    "Payment references cannot be processed. Please try again later";

const EVENT_SUMMARY: &str = "Case created";

/// Request body sent by the case-management UI.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackRequest {
    pub event_id: String,
    pub case_details: Option<CaseDetails>,
    #[serde(default)]
    pub ignore_warnings: bool,
}

/// Finalizes exception records into cases on request from the UI.
///
/// Fatal precondition failures are `Err(CallbackError)`; field-level and
/// policy problems come back inside the `ProcessResult` so the UI can
/// show them next to the record.
pub struct CreateCaseCallbackService {
    validator: ExceptionRecordValidator,
    backend: Arc<dyn CaseBackendGateway>,
    transformer: Arc<dyn TransformationGateway>,
    s2s: Arc<dyn S2sTokenGenerator>,
    payments: Arc<dyn PaymentsNotifier>,
    service_configs: Arc<ServiceConfigProvider>,
}

impl CreateCaseCallbackService {
    pub fn new(
        backend: Arc<dyn CaseBackendGateway>,
        transformer: Arc<dyn TransformationGateway>,
        s2s: Arc<dyn S2sTokenGenerator>,
        payments: Arc<dyn PaymentsNotifier>,
        service_configs: Arc<ServiceConfigProvider>,
    ) -> Self {
        Self {
            validator: ExceptionRecordValidator,
            backend,
            transformer,
            s2s,
            payments,
            service_configs,
        }
    }

    pub async fn process(
        &self,
        request: &CallbackRequest,
        idam_token: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<ProcessResult, CallbackError> {
        if request.event_id != EVENT_CREATE_NEW_CASE {
            return Err(CallbackError::UnsupportedEvent(request.event_id.clone()));
        }

        let case_details = request
            .case_details
            .as_ref()
            .ok_or(CallbackError::MissingCaseTypeId)?;
        let case_type_id = case_details
            .case_type_id
            .as_deref()
            .ok_or(CallbackError::MissingCaseTypeId)?;
        let service = service_from_case_type_id(case_type_id)
            .ok_or_else(|| CallbackError::InvalidCaseTypeId(case_type_id.to_string()))?;

        let config = self
            .service_configs
            .get(service)
            .map_err(|_| CallbackError::ServiceNotConfigured(service.to_string()))?;
        if config.transformation_url.is_empty() {
            return Err(CallbackError::TransformationUrlNotConfigured);
        }

        idam_token.ok_or(CallbackError::MissingIdamToken)?;
        user_id.ok_or(CallbackError::MissingUserId)?;

        let record = match self.validator.validate(case_details, case_type_id) {
            Ok(record) => record,
            Err(errors) => return Ok(ProcessResult::with_errors(errors)),
        };
        if let Err(message) = self.validator.check_classification(&request.event_id, &record) {
            return Ok(ProcessResult::with_errors(vec![message]));
        }

        let awaiting_payments = case_details
            .data
            .get(AWAITING_PAYMENT_DCN_PROCESSING)
            .and_then(Value::as_str)
            == Some(YES);
        if awaiting_payments {
            if !config.allow_creating_case_before_payments_are_processed {
                return Ok(ProcessResult::with_errors(vec![
                    AWAITING_PAYMENTS_MESSAGE.to_string(),
                ]));
            }
            if !request.ignore_warnings {
                return Ok(ProcessResult::with_warnings(vec![
                    AWAITING_PAYMENTS_MESSAGE.to_string(),
                ]));
            }
            warn!(
                record_id = %record.id,
                "Creating case from exception record before payments are processed"
            );
        }

        // The record may already have produced a case: redelivered
        // callbacks and concurrent submissions finalize against it
        // instead of creating another.
        let existing = self
            .backend
            .search_case_refs_by_bulk_scan_case_reference(&record.id, &config.service)
            .await
            .map_err(|e| CallbackError::Internal(e.to_string()))?;

        let case_id = match existing.as_slice() {
            [] => match self
                .create_case(&record, config, request.ignore_warnings)
                .await?
            {
                Ok(case_id) => case_id,
                Err(result) => return Ok(result),
            },
            [case_id] => {
                info!(
                    record_id = %record.id,
                    case_id,
                    "Case already exists for exception record - finalizing against it"
                );
                *case_id
            }
            ids => {
                return Err(CallbackError::MultipleCasesFound {
                    case_ids: ids
                        .iter()
                        .map(|id| id.to_string())
                        .collect::<Vec<_>>()
                        .join(", "),
                    reference: record.id.clone(),
                });
            }
        };

        let finalized = finalize_exception_record(&case_details.data, case_id);

        if record.contains_payments
            && existing.is_empty()
            && let Err(e) = self
                .payments
                .update_payments(&record.id, &config.jurisdiction, &case_id.to_string())
                .await
        {
            // The case stays created; only the payment references failed.
            error!(
                record_id = %record.id,
                case_id,
                error = %e,
                "Failed to forward payment references for newly created case"
            );
            return Ok(ProcessResult {
                exception_record_data: finalized,
                warnings: vec![],
                errors: vec![PAYMENT_ERROR_MESSAGE.to_string()],
            });
        }

        Ok(ProcessResult::with_data(finalized))
    }

    /// Transform the exception record and run the two-phase create.
    /// Rejections that retrying cannot fix come back as user-visible
    /// error strings; transformation warnings come back as warnings
    /// unless the caller chose to ignore them.
    async fn create_case(
        &self,
        record: &ExceptionRecord,
        config: &ServiceConfig,
        ignore_warnings: bool,
    ) -> Result<Result<u64, ProcessResult>, CallbackError> {
        let s2s_token = self
            .s2s
            .generate()
            .await
            .map_err(|e| CallbackError::Internal(e.to_string()))?;

        let transformation = match self
            .transformer
            .transform_exception_record(
                &config.transformation_url,
                record,
                s2s_token.expose_secret(),
            )
            .await
        {
            Ok(transformation) => transformation,
            Err(e) if e.is_unrecoverable() => {
                return Ok(Err(ProcessResult::with_errors(vec![e.to_string()])));
            }
            Err(e) => return Err(CallbackError::Internal(e.to_string())),
        };

        if !transformation.warnings.is_empty() {
            if !ignore_warnings {
                return Ok(Err(ProcessResult::with_warnings(transformation.warnings)));
            }
            warn!(
                record_id = %record.id,
                warnings = ?transformation.warnings,
                "Proceeding with case creation despite transformation warnings"
            );
        }

        let details = transformation.case_creation_details;
        let create = async {
            let started = self
                .backend
                .start_event(
                    &config.jurisdiction,
                    &details.case_type_id,
                    None,
                    &details.event_id,
                )
                .await?;

            let mut data = details.case_data;
            data.insert(
                BULK_SCAN_CASE_REFERENCE.to_string(),
                Value::from(record.id.as_str()),
            );
            if config.supports_envelope_references
                && let Some(envelope_id) = &record.envelope_id
            {
                data.insert(
                    BULK_SCAN_ENVELOPES.to_string(),
                    single_envelope_reference(envelope_id, CaseAction::Create),
                );
            }

            self.backend
                .submit_event(
                    &config.jurisdiction,
                    &details.case_type_id,
                    None,
                    CaseDataContent {
                        data,
                        event: Event {
                            id: started.event_id.clone(),
                            summary: EVENT_SUMMARY.to_string(),
                            description: Some(format!(
                                "Case created from exception record ref {}",
                                record.id
                            )),
                        },
                        event_token: started.token,
                    },
                )
                .await
        };

        match create.await {
            Ok(case_id) => {
                info!(record_id = %record.id, case_id, "Created case from exception record");
                Ok(Ok(case_id))
            }
            Err(e @ CaseBackendError::CallFailed { .. }) if e.is_client_error() => {
                Ok(Err(ProcessResult::with_errors(vec![e.to_string()])))
            }
            Err(e) => Err(CallbackError::Internal(e.to_string())),
        }
    }
}

/// Stamp the created case's reference onto the exception record data and
/// clear the warning-display state.
fn finalize_exception_record(data: &CaseData, case_id: u64) -> CaseData {
    let mut finalized = data.clone();
    finalized.insert(CASE_REFERENCE.to_string(), Value::from(case_id.to_string()));
    finalized.insert(DISPLAY_WARNINGS.to_string(), Value::from(NO));
    finalized.insert(
        OCR_DATA_VALIDATION_WARNINGS.to_string(),
        Value::Array(vec![]),
    );
    finalized
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use secrecy::SecretString;
    use std::sync::Mutex;

    use super::*;
    use crate::error::{PaymentsError, S2sTokenError, TransformationError};
    use crate::model::case::StartedEvent;
    use crate::model::Envelope;
    use crate::transformation::{CaseCreationDetails, SuccessfulTransformation};

    const IDAM_TOKEN: Option<&str> = Some("idam-token");
    const USER_ID: Option<&str> = Some("user-id");

    struct FakeBackend {
        cases_by_reference: Vec<u64>,
        new_case_id: u64,
        submitted: Mutex<Vec<CaseDataContent>>,
    }

    impl FakeBackend {
        fn empty() -> Self {
            Self {
                cases_by_reference: vec![],
                new_case_id: 1,
                submitted: Mutex::new(Vec::new()),
            }
        }
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
            Ok(vec![])
        }

        async fn search_case_refs_by_bulk_scan_case_reference(
            &self,
            _reference: &str,
            _service: &str,
        ) -> Result<Vec<u64>, CaseBackendError> {
            Ok(self.cases_by_reference.clone())
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
                token: "create-token".to_string(),
                case_details: None,
            })
        }

        async fn submit_event(
            &self,
            _jurisdiction: &str,
            _case_type_id: &str,
            _case_ref: Option<&str>,
            content: CaseDataContent,
        ) -> Result<u64, CaseBackendError> {
            self.submitted.lock().unwrap().push(content);
            Ok(self.new_case_id)
        }
    }

    #[derive(Default)]
    struct FakeTransformer {
        warnings: Vec<String>,
    }

    #[async_trait]
    impl TransformationGateway for FakeTransformer {
        async fn transform_envelope(
            &self,
            _transformation_url: &str,
            _envelope: &Envelope,
            _s2s_token: &str,
        ) -> Result<SuccessfulTransformation, TransformationError> {
            unimplemented!("not used in callback tests")
        }

        async fn transform_exception_record(
            &self,
            _transformation_url: &str,
            _record: &ExceptionRecord,
            _s2s_token: &str,
        ) -> Result<SuccessfulTransformation, TransformationError> {
            Ok(SuccessfulTransformation {
                case_creation_details: CaseCreationDetails {
                    case_type_id: "Bulk_Scanned".to_string(),
                    event_id: "createCase".to_string(),
                    case_data: CaseData::new(),
                },
                warnings: self.warnings.clone(),
            })
        }
    }

    struct FakeS2s;

    #[async_trait]
    impl S2sTokenGenerator for FakeS2s {
        async fn generate(&self) -> Result<SecretString, S2sTokenError> {
            Ok(SecretString::from("s2s"))
        }
    }

    #[derive(Default)]
    struct RecordingPayments {
        fail: bool,
        updates: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl PaymentsNotifier for RecordingPayments {
        async fn create_payments(
            &self,
            _envelope: &Envelope,
            _case_id: u64,
            _is_exception_record: bool,
        ) -> Result<(), PaymentsError> {
            Ok(())
        }

        async fn update_payments(
            &self,
            exception_record_ref: &str,
            _jurisdiction: &str,
            new_case_ref: &str,
        ) -> Result<(), PaymentsError> {
            if self.fail {
                return Err(PaymentsError::PublishFailed("queue down".into()));
            }
            self.updates
                .lock()
                .unwrap()
                .push((exception_record_ref.to_string(), new_case_ref.to_string()));
            Ok(())
        }
    }

    fn configs(transformation_url: &str, allow_before_payments: bool) -> Arc<ServiceConfigProvider> {
        Arc::new(ServiceConfigProvider::new(vec![ServiceConfig {
            service: "bulkscan".to_string(),
            jurisdiction: "BULKSCAN".to_string(),
            case_type_ids: vec!["Bulk_Scanned".to_string()],
            transformation_url: transformation_url.to_string(),
            auto_case_creation_enabled: false,
            allow_creating_case_before_payments_are_processed: allow_before_payments,
            supports_envelope_references: false,
        }]))
    }

    fn service_with(
        backend: Arc<FakeBackend>,
        payments: Arc<RecordingPayments>,
        configs: Arc<ServiceConfigProvider>,
    ) -> CreateCaseCallbackService {
        CreateCaseCallbackService::new(
            backend,
            Arc::new(FakeTransformer::default()),
            Arc::new(FakeS2s),
            payments,
            configs,
        )
    }

    fn basic_case_data() -> CaseData {
        serde_json::from_value(serde_json::json!({
            "poBox": "12345",
            "poBoxJurisdiction": "BULKSCAN",
            "journeyClassification": "EXCEPTION",
            "formType": "A1",
            "deliveryDate": "2024-04-12T10:15:30Z",
            "openingDate": "2024-04-12T11:00:00Z",
            "scannedDocuments": [
                {"id": "el-1", "value": {"uuid": "doc-1", "controlNumber": "1001", "fileName": "a.pdf", "documentType": "form", "scannedAt": null}}
            ],
            "scanOCRData": [
                {"id": "el-2", "value": {"key": "firstName", "value": "Ada"}}
            ],
            "containsPayments": "Yes",
            "envelopeId": "987"
        }))
        .unwrap()
    }

    fn case_details(data: CaseData) -> CaseDetails {
        CaseDetails {
            id: 123,
            jurisdiction: "BULKSCAN".to_string(),
            case_type_id: Some("BULKSCAN_ExceptionRecord".to_string()),
            state: None,
            data,
        }
    }

    fn request(event_id: &str, case_details: Option<CaseDetails>, ignore: bool) -> CallbackRequest {
        CallbackRequest {
            event_id: event_id.to_string(),
            case_details,
            ignore_warnings: ignore,
        }
    }

    #[tokio::test]
    async fn rejects_unsupported_event_id() {
        let service = service_with(
            Arc::new(FakeBackend::empty()),
            Arc::new(RecordingPayments::default()),
            configs("https://transform", false),
        );

        let err = service
            .process(&request("some event", None, true), IDAM_TOKEN, USER_ID)
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "The some event event is not supported. Please contact service team"
        );
    }

    #[tokio::test]
    async fn rejects_missing_case_type_id() {
        let service = service_with(
            Arc::new(FakeBackend::empty()),
            Arc::new(RecordingPayments::default()),
            configs("https://transform", false),
        );

        let mut details = case_details(basic_case_data());
        details.case_type_id = None;
        let err = service
            .process(
                &request(EVENT_CREATE_NEW_CASE, Some(details), true),
                IDAM_TOKEN,
                USER_ID,
            )
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "No case type ID supplied");
    }

    #[tokio::test]
    async fn rejects_malformed_case_type_id() {
        let service = service_with(
            Arc::new(FakeBackend::empty()),
            Arc::new(RecordingPayments::default()),
            configs("https://transform", false),
        );

        let mut details = case_details(basic_case_data());
        details.case_type_id = Some(String::new());
        let err = service
            .process(
                &request(EVENT_CREATE_NEW_CASE, Some(details), true),
                IDAM_TOKEN,
                USER_ID,
            )
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Case type ID () has invalid format");
    }

    #[tokio::test]
    async fn rejects_unconfigured_service() {
        let service = service_with(
            Arc::new(FakeBackend::empty()),
            Arc::new(RecordingPayments::default()),
            Arc::new(ServiceConfigProvider::default()),
        );

        let err = service
            .process(
                &request(EVENT_CREATE_NEW_CASE, Some(case_details(basic_case_data())), true),
                IDAM_TOKEN,
                USER_ID,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CallbackError::ServiceNotConfigured(_)));
    }

    #[tokio::test]
    async fn rejects_missing_transformation_url() {
        let service = service_with(
            Arc::new(FakeBackend::empty()),
            Arc::new(RecordingPayments::default()),
            configs("", false),
        );

        let err = service
            .process(
                &request(EVENT_CREATE_NEW_CASE, Some(case_details(basic_case_data())), true),
                IDAM_TOKEN,
                USER_ID,
            )
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Transformation URL is not configured");
    }

    #[tokio::test]
    async fn rejects_missing_auth_headers() {
        let service = service_with(
            Arc::new(FakeBackend::empty()),
            Arc::new(RecordingPayments::default()),
            configs("https://transform", false),
        );
        let req = request(EVENT_CREATE_NEW_CASE, Some(case_details(basic_case_data())), true);

        let err = service.process(&req, None, USER_ID).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Callback has no Idam token received in the header"
        );

        let err = service.process(&req, IDAM_TOKEN, None).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Callback has no user id received in the header"
        );
    }

    #[tokio::test]
    async fn reports_error_for_new_application_without_ocr() {
        let service = service_with(
            Arc::new(FakeBackend::empty()),
            Arc::new(RecordingPayments::default()),
            configs("https://transform", false),
        );

        let mut data = basic_case_data();
        data.insert(
            "journeyClassification".to_string(),
            Value::from("NEW_APPLICATION"),
        );
        data.remove("scanOCRData");

        let result = service
            .process(
                &request(EVENT_CREATE_NEW_CASE, Some(case_details(data)), true),
                IDAM_TOKEN,
                USER_ID,
            )
            .await
            .unwrap();

        assert!(result.warnings.is_empty());
        assert_eq!(
            result.errors,
            vec!["Event createNewCase not allowed for the current journey classification NEW_APPLICATION without OCR"]
        );
    }

    #[tokio::test]
    async fn reports_error_for_supplementary_evidence_classification() {
        let service = service_with(
            Arc::new(FakeBackend::empty()),
            Arc::new(RecordingPayments::default()),
            configs("https://transform", false),
        );

        let mut data = basic_case_data();
        data.insert(
            "journeyClassification".to_string(),
            Value::from("SUPPLEMENTARY_EVIDENCE"),
        );

        let result = service
            .process(
                &request(EVENT_CREATE_NEW_CASE, Some(case_details(data)), true),
                IDAM_TOKEN,
                USER_ID,
            )
            .await
            .unwrap();

        assert_eq!(
            result.errors,
            vec!["Event createNewCase not allowed for the current journey classification SUPPLEMENTARY_EVIDENCE"]
        );
    }

    #[tokio::test]
    async fn finalizes_against_existing_case_without_creating() {
        let backend = Arc::new(FakeBackend {
            cases_by_reference: vec![345],
            new_case_id: 1,
            submitted: Mutex::new(Vec::new()),
        });
        let payments = Arc::new(RecordingPayments::default());
        let service = service_with(
            Arc::clone(&backend),
            Arc::clone(&payments),
            configs("https://transform", false),
        );

        let result = service
            .process(
                &request(EVENT_CREATE_NEW_CASE, Some(case_details(basic_case_data())), true),
                IDAM_TOKEN,
                USER_ID,
            )
            .await
            .unwrap();

        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
        assert_eq!(result.exception_record_data[CASE_REFERENCE], "345");
        assert_eq!(result.exception_record_data[DISPLAY_WARNINGS], NO);
        assert!(backend.submitted.lock().unwrap().is_empty());
        assert!(payments.updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn multiple_existing_cases_are_fatal() {
        let backend = Arc::new(FakeBackend {
            cases_by_reference: vec![345, 456],
            new_case_id: 1,
            submitted: Mutex::new(Vec::new()),
        });
        let service = service_with(
            backend,
            Arc::new(RecordingPayments::default()),
            configs("https://transform", false),
        );

        let err = service
            .process(
                &request(EVENT_CREATE_NEW_CASE, Some(case_details(basic_case_data())), true),
                IDAM_TOKEN,
                USER_ID,
            )
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Multiple cases (345, 456) found for the given bulk scan case reference: 123"
        );
    }

    #[tokio::test]
    async fn awaiting_payments_blocks_or_warns_per_service_config() {
        for (allowed, ignore, expect_error) in
            [(false, false, true), (false, true, true), (true, false, false)]
        {
            let service = service_with(
                Arc::new(FakeBackend::empty()),
                Arc::new(RecordingPayments::default()),
                configs("https://transform", allowed),
            );

            let mut data = basic_case_data();
            data.insert(
                AWAITING_PAYMENT_DCN_PROCESSING.to_string(),
                Value::from(YES),
            );

            let result = service
                .process(
                    &request(EVENT_CREATE_NEW_CASE, Some(case_details(data)), ignore),
                    IDAM_TOKEN,
                    USER_ID,
                )
                .await
                .unwrap();

            if expect_error {
                assert_eq!(result.errors, vec![AWAITING_PAYMENTS_MESSAGE]);
                assert!(result.warnings.is_empty());
            } else {
                assert_eq!(result.warnings, vec![AWAITING_PAYMENTS_MESSAGE]);
                assert!(result.errors.is_empty());
            }
        }
    }

    #[tokio::test]
    async fn creates_case_and_forwards_payments_when_warnings_ignored() {
        let backend = Arc::new(FakeBackend {
            cases_by_reference: vec![],
            new_case_id: 1,
            submitted: Mutex::new(Vec::new()),
        });
        let payments = Arc::new(RecordingPayments::default());
        let service = service_with(
            Arc::clone(&backend),
            Arc::clone(&payments),
            configs("https://transform", true),
        );

        let mut data = basic_case_data();
        data.insert(
            AWAITING_PAYMENT_DCN_PROCESSING.to_string(),
            Value::from(YES),
        );

        let result = service
            .process(
                &request(EVENT_CREATE_NEW_CASE, Some(case_details(data)), true),
                IDAM_TOKEN,
                USER_ID,
            )
            .await
            .unwrap();

        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
        assert_eq!(result.exception_record_data[CASE_REFERENCE], "1");

        let submitted = backend.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].event_token, "create-token");
        assert_eq!(submitted[0].data[BULK_SCAN_CASE_REFERENCE], "123");

        assert_eq!(
            *payments.updates.lock().unwrap(),
            vec![("123".to_string(), "1".to_string())]
        );
    }

    #[tokio::test]
    async fn transformation_warnings_are_returned_before_creating_the_case() {
        let backend = Arc::new(FakeBackend::empty());
        let service = CreateCaseCallbackService::new(
            Arc::clone(&backend) as _,
            Arc::new(FakeTransformer {
                warnings: vec!["'firstName' may be misread".to_string()],
            }),
            Arc::new(FakeS2s),
            Arc::new(RecordingPayments::default()),
            configs("https://transform", false),
        );

        let result = service
            .process(
                &request(EVENT_CREATE_NEW_CASE, Some(case_details(basic_case_data())), false),
                IDAM_TOKEN,
                USER_ID,
            )
            .await
            .unwrap();

        assert_eq!(result.warnings, vec!["'firstName' may be misread"]);
        assert!(result.errors.is_empty());
        // Nothing was created - the caller has to confirm first.
        assert!(backend.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn transformation_warnings_are_bypassed_when_ignoring_warnings() {
        let backend = Arc::new(FakeBackend::empty());
        let payments = Arc::new(RecordingPayments::default());
        let service = CreateCaseCallbackService::new(
            Arc::clone(&backend) as _,
            Arc::new(FakeTransformer {
                warnings: vec!["'firstName' may be misread".to_string()],
            }),
            Arc::new(FakeS2s),
            payments,
            configs("https://transform", false),
        );

        let result = service
            .process(
                &request(EVENT_CREATE_NEW_CASE, Some(case_details(basic_case_data())), true),
                IDAM_TOKEN,
                USER_ID,
            )
            .await
            .unwrap();

        assert!(result.warnings.is_empty());
        assert!(result.errors.is_empty());
        assert_eq!(backend.submitted.lock().unwrap().len(), 1);
        assert_eq!(result.exception_record_data[CASE_REFERENCE], "1");
    }

    #[tokio::test]
    async fn payments_failure_after_creation_is_reported_but_case_stays() {
        let backend = Arc::new(FakeBackend {
            cases_by_reference: vec![],
            new_case_id: 1,
            submitted: Mutex::new(Vec::new()),
        });
        let payments = Arc::new(RecordingPayments {
            fail: true,
            updates: Mutex::new(Vec::new()),
        });
        let service = service_with(
            Arc::clone(&backend),
            payments,
            configs("https://transform", true),
        );

        let result = service
            .process(
                &request(EVENT_CREATE_NEW_CASE, Some(case_details(basic_case_data())), true),
                IDAM_TOKEN,
                USER_ID,
            )
            .await
            .unwrap();

        assert_eq!(result.errors, vec![PAYMENT_ERROR_MESSAGE]);
        assert!(result.warnings.is_empty());
        // The case was still created.
        assert_eq!(backend.submitted.lock().unwrap().len(), 1);
        assert_eq!(result.exception_record_data[CASE_REFERENCE], "1");
    }
}
