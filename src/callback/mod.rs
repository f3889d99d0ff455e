//! Synchronous create-new-case callback invoked by the case-management
//! UI against an exception record.

pub mod record;
pub mod service;
pub mod validator;

pub use record::ExceptionRecord;
pub use service::{
    CallbackRequest, CreateCaseCallbackService, AWAITING_PAYMENTS_MESSAGE, PAYMENT_ERROR_MESSAGE,
};
pub use validator::ExceptionRecordValidator;
