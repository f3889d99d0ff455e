//! Queue-facing envelope processing.
//!
//! The transport delivers raw message bodies and settles them according
//! to the returned disposition. At-least-once delivery means the same
//! envelope may arrive more than once; idempotency lives downstream in
//! the router and creators, not here.

use std::sync::Arc;

use tracing::{error, info};

use crate::error::ProcessingError;
use crate::model::Envelope;
use crate::processing::router::EnvelopeRouter;

/// How the transport should settle a delivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Processed; remove from the queue.
    Complete,
    /// Transient failure; redeliver later.
    Retry,
    /// The message can never be processed; park it.
    DeadLetter,
}

/// Parses raw queue messages and runs them through the router.
pub struct EnvelopeProcessor {
    router: Arc<EnvelopeRouter>,
}

impl EnvelopeProcessor {
    pub fn new(router: Arc<EnvelopeRouter>) -> Self {
        Self { router }
    }

    pub async fn process(&self, raw: &str) -> Disposition {
        match self.try_process(raw).await {
            Ok(result) => {
                info!(
                    case_id = result.case_id,
                    action = ?result.action,
                    "Processed envelope"
                );
                Disposition::Complete
            }
            Err(e) => {
                error!(error = %e, "Failed to process envelope");
                match e {
                    // Bad input or bad deployment configuration: no
                    // amount of redelivery will change the outcome.
                    ProcessingError::InvalidEnvelope(_) | ProcessingError::Config(_) => {
                        Disposition::DeadLetter
                    }
                    _ => Disposition::Retry,
                }
            }
        }
    }

    async fn try_process(
        &self,
        raw: &str,
    ) -> Result<crate::model::EnvelopeProcessingResult, ProcessingError> {
        let envelope: Envelope = serde_json::from_str(raw)
            .map_err(|e| ProcessingError::InvalidEnvelope(e.to_string()))?;

        info!("Started processing envelope. {}", envelope.log_context());
        self.router.handle(&envelope).await
    }
}
