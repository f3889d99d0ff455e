//! Payments collaborator.
//!
//! Every processed envelope outcome is reported to payments — including
//! exception-record fallbacks. The publishing transport is behind the
//! trait; the orchestrator only decides *when* to notify.

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::error::PaymentsError;
use crate::model::Envelope;

/// Payments notifications sent by the orchestrators.
#[async_trait]
pub trait PaymentsNotifier: Send + Sync {
    /// Report payment DCNs carried by an envelope against the case (or
    /// exception record) the envelope ended up on.
    async fn create_payments(
        &self,
        envelope: &Envelope,
        case_id: u64,
        is_exception_record: bool,
    ) -> Result<(), PaymentsError>;

    /// Re-point payments recorded against an exception record at the
    /// service case created from it.
    async fn update_payments(
        &self,
        exception_record_ref: &str,
        jurisdiction: &str,
        new_case_ref: &str,
    ) -> Result<(), PaymentsError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePaymentsCommand<'a> {
    envelope_id: &'a str,
    ccd_reference: String,
    jurisdiction: &'a str,
    service: &'a str,
    po_box: &'a str,
    is_exception_record: bool,
    payments: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdatePaymentsCommand<'a> {
    exception_record_ref: &'a str,
    jurisdiction: &'a str,
    new_case_ref: &'a str,
}

/// Publishes payments commands to the payments endpoint.
pub struct HttpPaymentsPublisher {
    client: reqwest::Client,
    payments_url: String,
}

impl HttpPaymentsPublisher {
    pub fn new(client: reqwest::Client, payments_url: String) -> Self {
        Self {
            client,
            payments_url,
        }
    }

    async fn publish<T: Serialize + Sync>(
        &self,
        path: &str,
        command: &T,
    ) -> Result<(), PaymentsError> {
        self.client
            .post(format!("{}/{path}", self.payments_url))
            .json(command)
            .send()
            .await
            .map_err(|e| PaymentsError::PublishFailed(e.to_string()))?
            .error_for_status()
            .map_err(|e| PaymentsError::PublishFailed(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl PaymentsNotifier for HttpPaymentsPublisher {
    async fn create_payments(
        &self,
        envelope: &Envelope,
        case_id: u64,
        is_exception_record: bool,
    ) -> Result<(), PaymentsError> {
        if !envelope.has_payments() {
            info!(
                envelope_id = %envelope.id,
                "Envelope has no payments, not sending create command"
            );
            return Ok(());
        }

        let command = CreatePaymentsCommand {
            envelope_id: &envelope.id,
            ccd_reference: case_id.to_string(),
            jurisdiction: &envelope.jurisdiction,
            service: &envelope.container,
            po_box: &envelope.po_box,
            is_exception_record,
            payments: envelope
                .payments
                .iter()
                .map(|p| p.document_control_number.as_str())
                .collect(),
        };

        self.publish("payments", &command).await?;
        info!(
            envelope_id = %envelope.id,
            case_id,
            is_exception_record,
            "Sent create payments command"
        );
        Ok(())
    }

    async fn update_payments(
        &self,
        exception_record_ref: &str,
        jurisdiction: &str,
        new_case_ref: &str,
    ) -> Result<(), PaymentsError> {
        let command = UpdatePaymentsCommand {
            exception_record_ref,
            jurisdiction,
            new_case_ref,
        };

        self.publish("payments/update", &command).await?;
        info!(
            exception_record_ref,
            new_case_ref, "Sent update payments command"
        );
        Ok(())
    }
}
