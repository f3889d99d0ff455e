//! Internal representation of an exception record, parsed out of the
//! schema-less case data the backend sends with a callback.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::model::case::{
    CaseData, CollectionElement, CONTAINS_PAYMENTS, DELIVERY_DATE, ENVELOPE_ID, FORM_TYPE,
    JOURNEY_CLASSIFICATION, OPENING_DATE, PO_BOX, PO_BOX_JURISDICTION, SCANNED_DOCUMENTS,
    SCAN_OCR_DATA, YES,
};
use crate::model::{Classification, Document, OcrField};

/// An exception record with its dynamic case data resolved into typed
/// fields. This is the payload shape the transformation service accepts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionRecord {
    /// The exception record's own case id in the backend.
    pub id: String,
    pub case_type_id: String,
    pub po_box: Option<String>,
    pub po_box_jurisdiction: Option<String>,
    pub journey_classification: Classification,
    pub form_type: Option<String>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub opening_date: Option<DateTime<Utc>>,
    pub scanned_documents: Vec<Document>,
    pub ocr_data_fields: Vec<OcrField>,
    #[serde(skip)]
    pub envelope_id: Option<String>,
    #[serde(skip)]
    pub contains_payments: bool,
}

impl ExceptionRecord {
    /// Parse a record from case data. Returns every field-level problem
    /// found, not just the first.
    pub fn from_case_data(
        id: u64,
        case_type_id: &str,
        data: &CaseData,
    ) -> Result<Self, Vec<String>> {
        let mut errors = Vec::new();

        let classification = match data.get(JOURNEY_CLASSIFICATION).and_then(Value::as_str) {
            Some(raw) => {
                match serde_json::from_value::<Classification>(Value::String(raw.to_string())) {
                    Ok(classification) => Some(classification),
                    Err(_) => {
                        errors.push(format!("Invalid journey classification: {raw}"));
                        None
                    }
                }
            }
            None => {
                errors.push("Missing journey classification".to_string());
                None
            }
        };

        let scanned_documents = match data.get(SCANNED_DOCUMENTS) {
            Some(value) => collection_values::<Document>(value).unwrap_or_else(|e| {
                errors.push(format!("Invalid scannedDocuments format: {e}"));
                vec![]
            }),
            None => vec![],
        };

        let ocr_data_fields = match data.get(SCAN_OCR_DATA) {
            Some(value) => ocr_fields(value).unwrap_or_else(|e| {
                errors.push(format!("Invalid OCR data format: {e}"));
                vec![]
            }),
            None => vec![],
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Self {
            id: id.to_string(),
            case_type_id: case_type_id.to_string(),
            po_box: string_field(data, PO_BOX),
            po_box_jurisdiction: string_field(data, PO_BOX_JURISDICTION),
            // Classification parse failure was pushed above.
            journey_classification: classification.unwrap_or(Classification::Exception),
            form_type: string_field(data, FORM_TYPE),
            delivery_date: date_field(data, DELIVERY_DATE),
            opening_date: date_field(data, OPENING_DATE),
            scanned_documents,
            ocr_data_fields,
            envelope_id: string_field(data, ENVELOPE_ID),
            contains_payments: data.get(CONTAINS_PAYMENTS).and_then(Value::as_str) == Some(YES),
        })
    }

    pub fn has_ocr_data(&self) -> bool {
        !self.ocr_data_fields.is_empty()
    }
}

fn string_field(data: &CaseData, key: &str) -> Option<String> {
    data.get(key)
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

fn date_field(data: &CaseData, key: &str) -> Option<DateTime<Utc>> {
    data.get(key)
        .cloned()
        .and_then(|value| serde_json::from_value(value).ok())
}

/// Unwrap a `[{"id": …, "value": …}, …]` collection into its values.
fn collection_values<T: serde::de::DeserializeOwned>(value: &Value) -> Result<Vec<T>, String> {
    let elements: Vec<CollectionElement<T>> =
        serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;
    Ok(elements.into_iter().map(|element| element.value).collect())
}

/// OCR entries are stored as `{"key": …, "value": …}` pairs.
fn ocr_fields(value: &Value) -> Result<Vec<OcrField>, String> {
    #[derive(serde::Deserialize)]
    struct OcrEntry {
        key: String,
        #[serde(default)]
        value: String,
    }

    let entries: Vec<CollectionElement<OcrEntry>> =
        serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;
    Ok(entries
        .into_iter()
        .map(|entry| OcrField {
            name: entry.value.key,
            value: entry.value.value,
        })
        .collect())
}
