//! Scanned-document helpers: reading documents out of case data and
//! deduplicating incoming documents against them.

use serde_json::Value;

use crate::model::case::{CaseData, CollectionElement, SCANNED_DOCUMENTS};
use crate::model::envelope::Document;

/// Incoming documents not already present on the case.
///
/// A document counts as present when an existing document matches its
/// uuid OR its control number — either alone is sufficient.
pub fn docs_to_add(existing: &[Document], incoming: &[Document]) -> Vec<Document> {
    incoming
        .iter()
        .filter(|doc| !existing.iter().any(|e| doc.is_duplicate_of(e)))
        .cloned()
        .collect()
}

/// Documents in the case's `scannedDocuments` collection. Elements that
/// do not parse as documents are skipped.
pub fn scanned_documents(data: &CaseData) -> Vec<Document> {
    data.get(SCANNED_DOCUMENTS)
        .and_then(Value::as_array)
        .map(|elements| {
            elements
                .iter()
                .filter_map(|element| {
                    serde_json::from_value::<CollectionElement<Document>>(element.clone())
                        .map(|e| e.value)
                        .ok()
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Serialize documents into the `scannedDocuments` collection shape.
pub fn to_scanned_documents_value(documents: &[Document]) -> Value {
    let elements: Vec<CollectionElement<&Document>> = documents
        .iter()
        .map(|doc| CollectionElement {
            id: doc.uuid.clone(),
            value: doc,
        })
        .collect();
    serde_json::to_value(elements).unwrap_or_else(|_| Value::Array(vec![]))
}
