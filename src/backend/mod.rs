//! Case backend gateway: authentication, search, and the two-phase
//! start-event/submit-event write protocol.

pub mod auth;
pub mod gateway;
pub mod query;

pub use auth::{
    AuthCache, AuthProvider, Credentials, HttpAuthProvider, HttpS2sTokenGenerator,
    S2sTokenGenerator,
};
pub use gateway::{CaseBackendGateway, HttpCaseBackend};
