//! Error types for the orchestrator.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Service {0} is not configured")]
    ServiceNotConfigured(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),
}

/// Errors from the case backend.
///
/// 401/403 responses surface as `Auth` after the per-jurisdiction
/// credential cache entry has been evicted. 404 and 400 on case lookups
/// are distinct kinds so callers can choose not to retry them.
#[derive(Debug, thiserror::Error)]
pub enum CaseBackendError {
    #[error("Case backend rejected credentials for jurisdiction {jurisdiction} (status {status})")]
    Auth { jurisdiction: String, status: u16 },

    #[error("Could not find case: {case_ref}")]
    CaseNotFound { case_ref: String },

    #[error("Invalid case ID: {case_ref}")]
    InvalidCaseId { case_ref: String },

    #[error("Multiple cases ({case_ids}) found for the given bulk scan case reference: {reference}")]
    MultipleCasesFound { case_ids: String, reference: String },

    #[error("Case backend call '{operation}' failed with status {status}")]
    CallFailed { operation: String, status: u16 },

    #[error("Case backend transport error during '{operation}': {reason}")]
    Transport { operation: String, reason: String },

    #[error("Failed to authenticate for jurisdiction {jurisdiction}: {reason}")]
    Authentication { jurisdiction: String, reason: String },

    #[error("Malformed case backend response: {0}")]
    MalformedResponse(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl CaseBackendError {
    /// Whether this failure came from a 400/422 submit response — retrying
    /// the same payload will not help.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CaseBackendError::CallFailed { status: 400, .. }
                | CaseBackendError::CallFailed { status: 422, .. }
                | CaseBackendError::InvalidCaseId { .. }
        )
    }
}

/// Errors from the transformation service.
#[derive(Debug, thiserror::Error)]
pub enum TransformationError {
    /// The service returned 200 but the payload is structurally invalid.
    #[error("Malformed transformation response: {0}")]
    Malformed(String),

    /// The service rejected the request (400/422).
    #[error("Transformation rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Network failure, 5xx, timeout — worth redelivering.
    #[error("Transformation transport error: {0}")]
    Transport(String),
}

impl TransformationError {
    /// Unrecoverable failures: retrying with the same input cannot succeed.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(
            self,
            TransformationError::Malformed(_) | TransformationError::Rejected { .. }
        )
    }
}

/// Failure to obtain a service-to-service credential.
#[derive(Debug, thiserror::Error)]
#[error("Failed to generate service-to-service token: {0}")]
pub struct S2sTokenError(pub String);

/// Payments publishing errors. Recoverable at the infrastructure level,
/// but surfaced as a user-visible error string on the callback path.
#[derive(Debug, thiserror::Error)]
pub enum PaymentsError {
    #[error("Failed to publish payments message: {0}")]
    PublishFailed(String),
}

/// Fatal callback-path errors. Each maps to a distinct, individually
/// worded message returned to the case-management UI.
#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    #[error("The {0} event is not supported. Please contact service team")]
    UnsupportedEvent(String),

    #[error("No case type ID supplied")]
    MissingCaseTypeId,

    #[error("Case type ID ({0}) has invalid format")]
    InvalidCaseTypeId(String),

    #[error("Service {0} is not configured")]
    ServiceNotConfigured(String),

    #[error("Transformation URL is not configured")]
    TransformationUrlNotConfigured,

    #[error("Callback has no Idam token received in the header")]
    MissingIdamToken,

    #[error("Callback has no user id received in the header")]
    MissingUserId,

    #[error("Multiple cases ({case_ids}) found for the given bulk scan case reference: {reference}")]
    MultipleCasesFound { case_ids: String, reference: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Queue-path processing errors.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Invalid envelope message: {0}")]
    InvalidEnvelope(String),

    #[error("Failed to create exception record for envelope {envelope_id}: {source}")]
    ExceptionRecordFailed {
        envelope_id: String,
        #[source]
        source: CaseBackendError,
    },

    #[error("Failed to attach documents from envelope {envelope_id} to case {case_ref}: {source}")]
    AttachFailed {
        envelope_id: String,
        case_ref: String,
        #[source]
        source: CaseBackendError,
    },

    #[error("Case backend error: {0}")]
    CaseBackend(#[from] CaseBackendError),

    #[error("Payments error: {0}")]
    Payments(#[from] PaymentsError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
