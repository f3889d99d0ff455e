//! Top-level routing: one envelope in, one case backend action out.

use std::sync::Arc;

use tracing::{info, warn};

use crate::backend::gateway::CaseBackendGateway;
use crate::error::{CaseBackendError, ProcessingError};
use crate::model::{
    CaseCreationResult, CaseDetails, Classification, Envelope, EnvelopeCcdAction,
    EnvelopeProcessingResult,
};
use crate::payments::PaymentsNotifier;
use crate::processing::case_creator::AutoCaseCreator;
use crate::processing::evidence::EvidenceAttacher;
use crate::processing::exception_record::ExceptionRecordCreator;

/// Maps an envelope's classification to exactly one case backend action.
pub struct EnvelopeRouter {
    backend: Arc<dyn CaseBackendGateway>,
    case_creator: Arc<AutoCaseCreator>,
    evidence_attacher: Arc<EvidenceAttacher>,
    exception_creator: Arc<ExceptionRecordCreator>,
    payments: Arc<dyn PaymentsNotifier>,
}

impl EnvelopeRouter {
    pub fn new(
        backend: Arc<dyn CaseBackendGateway>,
        case_creator: Arc<AutoCaseCreator>,
        evidence_attacher: Arc<EvidenceAttacher>,
        exception_creator: Arc<ExceptionRecordCreator>,
        payments: Arc<dyn PaymentsNotifier>,
    ) -> Self {
        Self {
            backend,
            case_creator,
            evidence_attacher,
            exception_creator,
            payments,
        }
    }

    /// Process one envelope. Total over the classification set; the set
    /// is closed at deserialization time.
    pub async fn handle(
        &self,
        envelope: &Envelope,
    ) -> Result<EnvelopeProcessingResult, ProcessingError> {
        match envelope.classification {
            Classification::SupplementaryEvidence => self.handle_supplementary_evidence(envelope).await,
            Classification::SupplementaryEvidenceWithOcr | Classification::Exception => {
                let record_id = self.create_exception_record(envelope).await?;
                Ok(EnvelopeProcessingResult::new(
                    record_id,
                    EnvelopeCcdAction::ExceptionRecord,
                ))
            }
            Classification::NewApplication => self.handle_new_application(envelope).await,
        }
    }

    async fn handle_supplementary_evidence(
        &self,
        envelope: &Envelope,
    ) -> Result<EnvelopeProcessingResult, ProcessingError> {
        match self.find_case(envelope).await? {
            Some(existing_case) => {
                let attached = self.evidence_attacher.attach(envelope, &existing_case).await?;
                if attached {
                    self.payments
                        .create_payments(envelope, existing_case.id, false)
                        .await?;
                    Ok(EnvelopeProcessingResult::new(
                        existing_case.id,
                        EnvelopeCcdAction::AutoAttachedToCase,
                    ))
                } else {
                    // All documents were duplicates. The submission must
                    // not be silently dropped, so it becomes an
                    // exception record.
                    info!(
                        envelope_id = %envelope.id,
                        case_id = existing_case.id,
                        "Creating exception record as supplementary evidence attachment added no documents"
                    );
                    let record_id = self.create_exception_record(envelope).await?;
                    Ok(EnvelopeProcessingResult::new(
                        record_id,
                        EnvelopeCcdAction::ExceptionRecord,
                    ))
                }
            }
            None => {
                let record_id = self.create_exception_record(envelope).await?;
                Ok(EnvelopeProcessingResult::new(
                    record_id,
                    EnvelopeCcdAction::ExceptionRecord,
                ))
            }
        }
    }

    async fn handle_new_application(
        &self,
        envelope: &Envelope,
    ) -> Result<EnvelopeProcessingResult, ProcessingError> {
        match self.case_creator.create_case(envelope).await? {
            CaseCreationResult::Created(case_id) | CaseCreationResult::AlreadyExists(case_id) => {
                self.payments.create_payments(envelope, case_id, false).await?;
                Ok(EnvelopeProcessingResult::new(
                    case_id,
                    EnvelopeCcdAction::CaseCreation,
                ))
            }
            CaseCreationResult::AbortedNoFailure
            | CaseCreationResult::PotentiallyRecoverableFailure
            | CaseCreationResult::UnrecoverableFailure => {
                let record_id = self.create_exception_record(envelope).await?;
                Ok(EnvelopeProcessingResult::new(
                    record_id,
                    EnvelopeCcdAction::ExceptionRecord,
                ))
            }
        }
    }

    /// Create (or reuse) the exception record and notify payments.
    /// Payments are notified on every exception-record path, whichever
    /// route produced the record id.
    async fn create_exception_record(&self, envelope: &Envelope) -> Result<u64, ProcessingError> {
        let record_id = self.exception_creator.try_create_from(envelope).await?;
        self.payments.create_payments(envelope, record_id, true).await?;
        Ok(record_id)
    }

    /// Look up the case a supplementary-evidence envelope refers to: by
    /// case reference when present, otherwise by legacy reference.
    async fn find_case(&self, envelope: &Envelope) -> Result<Option<CaseDetails>, ProcessingError> {
        if let Some(case_ref) = &envelope.case_ref {
            return match self.backend.get_case(case_ref, &envelope.jurisdiction).await {
                Ok(case) => Ok(Some(case)),
                Err(CaseBackendError::CaseNotFound { .. }) => {
                    warn!(envelope_id = %envelope.id, case_ref, "Case referenced by envelope was not found");
                    Ok(None)
                }
                Err(CaseBackendError::InvalidCaseId { .. }) => {
                    warn!(envelope_id = %envelope.id, case_ref, "Envelope contains an invalid case reference");
                    Ok(None)
                }
                Err(e) => Err(e.into()),
            };
        }

        let Some(legacy_ref) = &envelope.legacy_case_ref else {
            return Ok(None);
        };

        let case_ids = self
            .backend
            .search_case_refs_by_legacy_id(legacy_ref, &envelope.container)
            .await?;

        match case_ids.as_slice() {
            [] => Ok(None),
            [case_id] => {
                let case = self
                    .backend
                    .get_case(&case_id.to_string(), &envelope.jurisdiction)
                    .await?;
                Ok(Some(case))
            }
            ids => {
                warn!(
                    envelope_id = %envelope.id,
                    legacy_ref,
                    ?ids,
                    "Multiple cases found for legacy reference - falling back to exception record"
                );
                Ok(None)
            }
        }
    }
}
