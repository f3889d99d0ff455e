//! Fixed phrase-match search queries against the case backend.

use serde_json::Value;

/// Field holding the reference a case carried in the service it was
/// migrated from.
pub const LEGACY_ID_FIELD: &str = "alias.previousServiceCaseReference";
/// Field holding the id of the envelope an exception record came from.
pub const ENVELOPE_ID_FIELD: &str = "data.envelopeId";
/// Field inside the envelope-reference collection carried by cases that
/// were created or updated from an envelope.
pub const ENVELOPE_REFERENCES_FIELD: &str = "data.bulkScanEnvelopes.value.id";
/// Field mapping a service case back to the exception record it was
/// created from.
pub const BULK_SCAN_CASE_REFERENCE_FIELD: &str = "data.bulkScanCaseReference";

fn match_phrase(field: &str, value: &str) -> Value {
    serde_json::json!({
        "query": {
            "match_phrase": {
                field: value
            }
        }
    })
}

pub fn by_legacy_id(legacy_id: &str) -> Value {
    match_phrase(LEGACY_ID_FIELD, legacy_id)
}

pub fn by_envelope_id(envelope_id: &str) -> Value {
    match_phrase(ENVELOPE_ID_FIELD, envelope_id)
}

pub fn by_envelope_reference(envelope_id: &str) -> Value {
    match_phrase(ENVELOPE_REFERENCES_FIELD, envelope_id)
}

pub fn by_bulk_scan_case_reference(reference: &str) -> Value {
    match_phrase(BULK_SCAN_CASE_REFERENCE_FIELD, reference)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_phrase_match_query() {
        let query = by_envelope_id("env-123");
        assert_eq!(
            query["query"]["match_phrase"]["data.envelopeId"],
            "env-123"
        );
    }
}
