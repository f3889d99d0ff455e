//! Validation rules for the create-new-case callback.

use crate::callback::record::ExceptionRecord;
use crate::model::{CaseDetails, Classification};

/// Parses and validates the exception-record data attached to a callback.
/// Field-level problems come back as user-visible error strings rather
/// than failing the whole request.
pub struct ExceptionRecordValidator;

impl ExceptionRecordValidator {
    /// Resolve the callback's case snapshot into a typed exception record.
    pub fn validate(
        &self,
        case_details: &CaseDetails,
        case_type_id: &str,
    ) -> Result<ExceptionRecord, Vec<String>> {
        ExceptionRecord::from_case_data(case_details.id, case_type_id, &case_details.data)
    }

    /// The classification gate: which journeys may finalize into a real
    /// case via this event.
    pub fn check_classification(
        &self,
        event_id: &str,
        record: &ExceptionRecord,
    ) -> Result<(), String> {
        match record.journey_classification {
            Classification::Exception | Classification::SupplementaryEvidenceWithOcr => Ok(()),
            Classification::NewApplication if record.has_ocr_data() => Ok(()),
            Classification::NewApplication => Err(format!(
                "Event {} not allowed for the current journey classification {} without OCR",
                event_id,
                record.journey_classification.as_str()
            )),
            Classification::SupplementaryEvidence => Err(format!(
                "Event {} not allowed for the current journey classification {}",
                event_id,
                record.journey_classification.as_str()
            )),
        }
    }
}

/// Extract the service name from a `{SERVICE}_ExceptionRecord` case type
/// id. Anything else is an invalid format.
pub fn service_from_case_type_id(case_type_id: &str) -> Option<&str> {
    case_type_id
        .strip_suffix("_ExceptionRecord")
        .filter(|service| !service.is_empty())
}
