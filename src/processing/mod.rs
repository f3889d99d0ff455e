//! Envelope processing: routing, case creation, evidence attachment,
//! and the exception-record fallback.

pub mod case_creator;
pub mod documents;
pub mod evidence;
pub mod exception_record;
pub mod router;

pub use case_creator::AutoCaseCreator;
pub use evidence::EvidenceAttacher;
pub use exception_record::ExceptionRecordCreator;
pub use router::EnvelopeRouter;
