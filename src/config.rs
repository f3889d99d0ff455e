//! Per-service configuration.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::ConfigError;

/// Configuration for one onboarded service (keyed by envelope container).
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name, lowercase (matches the envelope `container`).
    pub service: String,
    /// Jurisdiction the service's cases live under.
    pub jurisdiction: String,
    /// Case type ids searched when correlating envelopes to cases.
    #[serde(default)]
    pub case_type_ids: Vec<String>,
    /// Transformation service endpoint. Empty means not configured.
    #[serde(default)]
    pub transformation_url: String,
    /// Whether NEW_APPLICATION envelopes may create cases automatically.
    #[serde(default)]
    pub auto_case_creation_enabled: bool,
    /// Whether the callback path may create a case while payment DCNs
    /// are still being processed.
    #[serde(default)]
    pub allow_creating_case_before_payments_are_processed: bool,
    /// Whether case data for this service carries the envelope-reference
    /// collection (`bulkScanEnvelopes`).
    #[serde(default)]
    pub supports_envelope_references: bool,
}

impl ServiceConfig {
    /// Case type id of the service's exception records.
    pub fn exception_record_case_type_id(&self) -> String {
        format!("{}_ExceptionRecord", self.service.to_uppercase())
    }
}

/// Looks up service configuration by container name.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfigProvider {
    services: HashMap<String, ServiceConfig>,
}

impl ServiceConfigProvider {
    pub fn new(configs: Vec<ServiceConfig>) -> Self {
        Self {
            services: configs
                .into_iter()
                .map(|c| (c.service.to_lowercase(), c))
                .collect(),
        }
    }

    /// Parse the service list from its JSON wire form.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let configs: Vec<ServiceConfig> =
            serde_json::from_str(json).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        Ok(Self::new(configs))
    }

    pub fn get(&self, service: &str) -> Result<&ServiceConfig, ConfigError> {
        self.services
            .get(&service.to_lowercase())
            .ok_or_else(|| ConfigError::ServiceNotConfigured(service.to_string()))
    }
}

/// Endpoints and runtime settings read from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Case backend base URL.
    pub case_backend_url: String,
    /// Idam (user credential) service base URL.
    pub idam_url: String,
    /// Service-to-service auth provider base URL.
    pub s2s_url: String,
    /// Payments publisher endpoint.
    pub payments_url: String,
    /// HTTP bind port.
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            case_backend_url: require_env("CASE_BACKEND_URL")?,
            idam_url: require_env("IDAM_URL")?,
            s2s_url: require_env("S2S_URL")?,
            payments_url: require_env("PAYMENTS_URL")?,
            port: std::env::var("SCAN_ORCHESTRATOR_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    key: "SCAN_ORCHESTRATOR_PORT".to_string(),
                    message: "not a valid port number".to_string(),
                })?,
        })
    }
}

fn require_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}
