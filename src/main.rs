use std::sync::Arc;

use scan_orchestrator::backend::auth::{AuthCache, HttpAuthProvider, HttpS2sTokenGenerator};
use scan_orchestrator::backend::gateway::{CaseBackendGateway, HttpCaseBackend};
use scan_orchestrator::callback::CreateCaseCallbackService;
use scan_orchestrator::config::{AppConfig, ServiceConfigProvider};
use scan_orchestrator::payments::{HttpPaymentsPublisher, PaymentsNotifier};
use scan_orchestrator::processing::{
    AutoCaseCreator, EnvelopeRouter, EvidenceAttacher, ExceptionRecordCreator,
};
use scan_orchestrator::queue::EnvelopeProcessor;
use scan_orchestrator::server;
use scan_orchestrator::transformation::HttpTransformationClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env()?;

    let services_json = std::env::var("SCAN_ORCHESTRATOR_SERVICES").unwrap_or_else(|_| {
        eprintln!("Error: SCAN_ORCHESTRATOR_SERVICES not set");
        eprintln!("  export SCAN_ORCHESTRATOR_SERVICES='[{{\"service\": ..., \"jurisdiction\": ...}}]'");
        std::process::exit(1);
    });
    let service_configs = Arc::new(ServiceConfigProvider::from_json(&services_json)?);

    let client = reqwest::Client::new();

    // ── Auth ─────────────────────────────────────────────────────────
    let s2s = Arc::new(HttpS2sTokenGenerator::new(
        client.clone(),
        config.s2s_url.clone(),
    ));
    let auth_provider = Arc::new(HttpAuthProvider::new(
        client.clone(),
        config.idam_url.clone(),
        Arc::clone(&s2s) as _,
    ));
    let auth_cache = Arc::new(AuthCache::new(auth_provider));

    // ── Gateways ─────────────────────────────────────────────────────
    let backend: Arc<dyn CaseBackendGateway> = Arc::new(HttpCaseBackend::new(
        client.clone(),
        config.case_backend_url.clone(),
        auth_cache,
        Arc::clone(&service_configs),
    ));
    let transformer = Arc::new(HttpTransformationClient::new(client.clone()));
    let payments: Arc<dyn PaymentsNotifier> = Arc::new(HttpPaymentsPublisher::new(
        client,
        config.payments_url.clone(),
    ));

    // ── Orchestrators ────────────────────────────────────────────────
    let case_creator = Arc::new(AutoCaseCreator::new(
        Arc::clone(&backend),
        Arc::clone(&transformer) as _,
        Arc::clone(&s2s) as _,
        Arc::clone(&service_configs),
    ));
    let evidence_attacher = Arc::new(EvidenceAttacher::new(
        Arc::clone(&backend),
        Arc::clone(&service_configs),
    ));
    let exception_creator = Arc::new(ExceptionRecordCreator::new(
        Arc::clone(&backend),
        Arc::clone(&service_configs),
    ));
    let router = Arc::new(EnvelopeRouter::new(
        Arc::clone(&backend),
        case_creator,
        evidence_attacher,
        exception_creator,
        Arc::clone(&payments),
    ));
    let envelope_processor = Arc::new(EnvelopeProcessor::new(router));

    let callback_service = Arc::new(CreateCaseCallbackService::new(
        backend,
        transformer,
        s2s,
        payments,
        service_configs,
    ));

    // ── HTTP server ──────────────────────────────────────────────────
    let app = server::routes(callback_service, envelope_processor);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "Scan orchestrator started");
    axum::serve(listener, app).await?;

    Ok(())
}
