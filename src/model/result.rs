//! Result types for envelope processing.
//!
//! Closed variants in place of exception-driven control flow: every
//! caller matches exhaustively.

use crate::model::case::CaseData;

/// Outcome of one `create_case` invocation. Constructed once, never
/// mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseCreationResult {
    /// A new case was created with the backend-assigned id.
    Created(u64),
    /// A case already exists for this envelope (idempotent re-delivery).
    AlreadyExists(u64),
    /// Automatic case creation is disabled for the service; no backend
    /// was contacted.
    AbortedNoFailure,
    /// Transient failure — redelivery may succeed.
    PotentiallyRecoverableFailure,
    /// Permanent failure — redelivery cannot succeed.
    UnrecoverableFailure,
}

/// The case backend action taken for an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeCcdAction {
    CaseCreation,
    AutoAttachedToCase,
    ExceptionRecord,
}

/// Terminal output of the router for one envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeProcessingResult {
    pub case_id: u64,
    pub action: EnvelopeCcdAction,
}

impl EnvelopeProcessingResult {
    pub fn new(case_id: u64, action: EnvelopeCcdAction) -> Self {
        Self { case_id, action }
    }
}

/// Output of the create-new-case callback: finalized data plus the
/// warnings and errors collected in the single validation pass. The
/// presence of any error means nothing was persisted by the call.
#[derive(Debug, Clone, Default)]
pub struct ProcessResult {
    pub exception_record_data: CaseData,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ProcessResult {
    pub fn with_data(data: CaseData) -> Self {
        Self {
            exception_record_data: data,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn with_warnings(warnings: Vec<String>) -> Self {
        Self {
            exception_record_data: CaseData::new(),
            warnings,
            errors: Vec::new(),
        }
    }

    pub fn with_errors(errors: Vec<String>) -> Self {
        Self {
            exception_record_data: CaseData::new(),
            warnings: Vec::new(),
            errors,
        }
    }
}
