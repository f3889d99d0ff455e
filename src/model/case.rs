//! Case backend wire model.
//!
//! Case payloads are open key-value documents: the core reads and writes
//! only the scanned-documents and envelope-reference fields and passes
//! everything else through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Case data is a schema-less ordered mapping from field name to value.
pub type CaseData = Map<String, Value>;

// ── Common case data field names ────────────────────────────────────

pub const SCANNED_DOCUMENTS: &str = "scannedDocuments";
/// Collection of references to envelopes that affected the case.
pub const BULK_SCAN_ENVELOPES: &str = "bulkScanEnvelopes";
/// Reference back to the exception record a case was created from.
pub const BULK_SCAN_CASE_REFERENCE: &str = "bulkScanCaseReference";
pub const ENVELOPE_ID: &str = "envelopeId";
pub const ENVELOPE_LEGACY_CASE_REFERENCE: &str = "envelopeLegacyCaseReference";
pub const JOURNEY_CLASSIFICATION: &str = "journeyClassification";
pub const AWAITING_PAYMENT_DCN_PROCESSING: &str = "awaitingPaymentDCNProcessing";
pub const CONTAINS_PAYMENTS: &str = "containsPayments";
pub const DISPLAY_WARNINGS: &str = "displayWarnings";
pub const OCR_DATA_VALIDATION_WARNINGS: &str = "ocrDataValidationWarnings";
pub const CASE_REFERENCE: &str = "caseReference";
pub const PO_BOX: &str = "poBox";
pub const PO_BOX_JURISDICTION: &str = "poBoxJurisdiction";
pub const FORM_TYPE: &str = "formType";
pub const DELIVERY_DATE: &str = "deliveryDate";
pub const OPENING_DATE: &str = "openingDate";
pub const SCAN_OCR_DATA: &str = "scanOCRData";

pub const YES: &str = "Yes";
pub const NO: &str = "No";

// ── Event type ids ──────────────────────────────────────────────────

pub const EVENT_ATTACH_SCANNED_DOCS: &str = "attachScannedDocs";
pub const EVENT_CREATE_EXCEPTION: &str = "createException";
pub const EVENT_CREATE_NEW_CASE: &str = "createNewCase";

/// A case as returned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseDetails {
    pub id: u64,
    pub jurisdiction: String,
    pub case_type_id: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub data: CaseData,
}

/// Search response: list of matching cases.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub cases: Vec<CaseDetails>,
}

/// Response to a start-event call: the single-use event token plus the
/// case snapshot the payload must be built from.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedEvent {
    pub event_id: String,
    pub token: String,
    pub case_details: Option<CaseDetails>,
}

impl StartedEvent {
    /// Snapshot data from the start-event response, empty when the backend
    /// returned no case (the "create" pseudo-case).
    pub fn case_data(&self) -> CaseData {
        self.case_details
            .as_ref()
            .map(|c| c.data.clone())
            .unwrap_or_default()
    }
}

/// Event metadata sent with a submit call.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Full payload for a submit-event call. `event_token` is the
/// optimistic-concurrency token obtained from start-event; submitting a
/// stale or reused token must fail at the backend.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseDataContent {
    pub data: CaseData,
    pub event: Event,
    pub event_token: String,
}

// ── Envelope references ─────────────────────────────────────────────

/// What an envelope did to a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseAction {
    Create,
    Update,
}

/// One entry in the `bulkScanEnvelopes` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeReference {
    pub id: String,
    pub action: CaseAction,
}

/// Backend collection element wrapper: `{"id": …, "value": …}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionElement<T> {
    pub id: String,
    pub value: T,
}

impl<T> CollectionElement<T> {
    pub fn new(value: T) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            value,
        }
    }
}

/// A single-element envelope-reference list recording `envelope_id` with
/// the given action. Created cases carry this so later searches by
/// envelope id succeed.
pub fn single_envelope_reference(envelope_id: &str, action: CaseAction) -> Value {
    let element = CollectionElement::new(EnvelopeReference {
        id: envelope_id.to_string(),
        action,
    });
    serde_json::json!([element])
}
