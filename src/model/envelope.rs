//! Inbound envelope model.
//!
//! One envelope describes one scanned paper submission. Envelopes are
//! immutable once deserialized; processing never mutates them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Routing classification of an envelope. Closed set — an unknown wire
/// value fails deserialization and the message is dead-lettered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    NewApplication,
    Exception,
    SupplementaryEvidence,
    SupplementaryEvidenceWithOcr,
}

impl Classification {
    /// Wire-format name, used in case data and user-facing messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::NewApplication => "NEW_APPLICATION",
            Classification::Exception => "EXCEPTION",
            Classification::SupplementaryEvidence => "SUPPLEMENTARY_EVIDENCE",
            Classification::SupplementaryEvidenceWithOcr => "SUPPLEMENTARY_EVIDENCE_WITH_OCR",
        }
    }
}

/// One scanned document inside an envelope.
///
/// Two documents are duplicates iff their `uuid` matches OR their
/// `control_number` matches — either alone is sufficient. This tolerates
/// re-scans (new uuid, same control number) and re-deliveries (same uuid,
/// reformatted control number).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Source identity assigned by the scanning supplier.
    pub uuid: String,
    /// Human-facing document control number (DCN).
    pub control_number: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub document_type: String,
    pub scanned_at: Option<DateTime<Utc>>,
}

impl Document {
    pub fn is_duplicate_of(&self, other: &Document) -> bool {
        self.uuid == other.uuid || self.control_number == other.control_number
    }
}

/// One OCR field extracted from a scanned form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrField {
    pub name: String,
    pub value: String,
}

/// A payment document-control number carried by the envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub document_control_number: String,
}

/// One inbound scanned submission.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub id: String,
    pub case_ref: Option<String>,
    pub legacy_case_ref: Option<String>,
    #[serde(default)]
    pub po_box: String,
    pub jurisdiction: String,
    /// Source container — doubles as the service key for configuration.
    pub container: String,
    pub zip_file_name: String,
    pub form_type: Option<String>,
    pub delivery_date: DateTime<Utc>,
    pub opening_date: Option<DateTime<Utc>>,
    pub classification: Classification,
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub ocr_data: Vec<OcrField>,
    #[serde(default)]
    pub payments: Vec<Payment>,
}

impl Envelope {
    /// Standard log context for an envelope.
    pub fn log_context(&self) -> String {
        format!(
            "Envelope ID: {}. File name: {}. Service: {}.",
            self.id, self.zip_file_name, self.container
        )
    }

    pub fn has_payments(&self) -> bool {
        !self.payments.is_empty()
    }
}
