//! Domain model: envelopes, cases, and processing results.

pub mod case;
pub mod envelope;
pub mod result;

pub use case::*;
pub use envelope::*;
pub use result::*;
