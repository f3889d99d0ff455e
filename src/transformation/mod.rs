//! Gateway to the external transformation service.
//!
//! The service converts raw envelope or exception-record payloads into
//! structured case-creation data. Failures are classified so callers can
//! tell caller/input errors (never retry) from transport trouble.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::callback::record::ExceptionRecord;
use crate::error::TransformationError;
use crate::model::{CaseData, Envelope};

/// How much of a rejection body is kept for logging and error messages.
const MAX_BODY_SNIPPET: usize = 10_000;

/// Successful transformation: everything needed to create the case.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseCreationDetails {
    pub case_type_id: String,
    pub event_id: String,
    pub case_data: CaseData,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessfulTransformation {
    pub case_creation_details: CaseCreationDetails,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl SuccessfulTransformation {
    /// Structural validation of the response the service handed back.
    /// A violation means the service itself is broken — unrecoverable.
    pub fn validate(&self) -> Result<(), TransformationError> {
        if self.case_creation_details.case_type_id.is_empty() {
            return Err(TransformationError::Malformed(
                "caseCreationDetails.caseTypeId: must not be empty".to_string(),
            ));
        }
        if self.case_creation_details.event_id.is_empty() {
            return Err(TransformationError::Malformed(
                "caseCreationDetails.eventId: must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Transformation operations used by the case creators.
#[async_trait]
pub trait TransformationGateway: Send + Sync {
    async fn transform_envelope(
        &self,
        transformation_url: &str,
        envelope: &Envelope,
        s2s_token: &str,
    ) -> Result<SuccessfulTransformation, TransformationError>;

    async fn transform_exception_record(
        &self,
        transformation_url: &str,
        record: &ExceptionRecord,
        s2s_token: &str,
    ) -> Result<SuccessfulTransformation, TransformationError>;
}

/// `reqwest` implementation posting to per-service transformation URLs.
pub struct HttpTransformationClient {
    client: reqwest::Client,
}

impl HttpTransformationClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn post_for_transformation(
        &self,
        url: &str,
        body: serde_json::Value,
        s2s_token: &str,
    ) -> Result<SuccessfulTransformation, TransformationError> {
        let response = self
            .client
            .post(url)
            .header("ServiceAuthorization", s2s_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| TransformationError::Transport(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::BAD_REQUEST
            || status == reqwest::StatusCode::UNPROCESSABLE_ENTITY
        {
            let body = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(MAX_BODY_SNIPPET)
                .collect();
            return Err(TransformationError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        if !status.is_success() {
            return Err(TransformationError::Transport(format!(
                "transformation endpoint answered with status {}",
                status.as_u16()
            )));
        }

        let transformation: SuccessfulTransformation = response
            .json()
            .await
            .map_err(|e| TransformationError::Malformed(e.to_string()))?;
        transformation.validate()?;

        info!("Received successful transformation response");
        Ok(transformation)
    }
}

#[async_trait]
impl TransformationGateway for HttpTransformationClient {
    async fn transform_envelope(
        &self,
        transformation_url: &str,
        envelope: &Envelope,
        s2s_token: &str,
    ) -> Result<SuccessfulTransformation, TransformationError> {
        let body = serde_json::json!({
            "id": envelope.id,
            "caseTypeId": null,
            "poBox": envelope.po_box,
            "jurisdiction": envelope.jurisdiction,
            "formType": envelope.form_type,
            "journeyClassification": envelope.classification.as_str(),
            "deliveryDate": envelope.delivery_date,
            "openingDate": envelope.opening_date,
            "scannedDocuments": envelope.documents,
            "ocrDataFields": envelope.ocr_data,
        });
        self.post_for_transformation(transformation_url, body, s2s_token)
            .await
    }

    async fn transform_exception_record(
        &self,
        transformation_url: &str,
        record: &ExceptionRecord,
        s2s_token: &str,
    ) -> Result<SuccessfulTransformation, TransformationError> {
        let body = serde_json::to_value(record)
            .map_err(|e| TransformationError::Transport(e.to_string()))?;
        self.post_for_transformation(transformation_url, body, s2s_token)
            .await
    }
}
