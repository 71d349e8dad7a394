//! Provider Request Service entry point.
//!
//! Connects to PostgreSQL, applies pending migrations and reports the state of
//! the directory.

use provider_request_service::config::ProviderRequestConfig;
use provider_request_service::services::{init_metrics, ApprovalEngine, Database};
use service_core::observability::init_tracing;
use std::sync::Arc;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load configuration
    let config = ProviderRequestConfig::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    // Initialize tracing
    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    tracing::info!(
        version = %config.service_version,
        environment = %config.common.environment,
        "Starting provider-request-service"
    );

    // Initialize metrics
    init_metrics();

    // Log configuration (mask sensitive values)
    tracing::info!(
        service_name = %config.service_name,
        db_max_connections = %config.database.max_connections,
        db_min_connections = %config.database.min_connections,
        evidence_validity_days = %config.approval.evidence_validity_days,
        max_providers_per_owner = %config.approval.max_providers_per_owner,
        "Configuration loaded"
    );

    let db = Database::new(
        &config.database.url,
        config.database.max_connections,
        config.database.min_connections,
    )
    .await
    .map_err(|e| {
        tracing::error!(error = %e, kind = e.kind(), "Failed to connect to database");
        std::io::Error::other(format!("Database error: {}", e))
    })?;

    db.run_migrations().await.map_err(|e| {
        tracing::error!(error = %e, kind = e.kind(), "Failed to run migrations");
        std::io::Error::other(format!("Migration error: {}", e))
    })?;

    db.health_check().await.map_err(|e| {
        tracing::error!(error = %e, kind = e.kind(), "Database health check failed");
        std::io::Error::other(format!("Health check error: {}", e))
    })?;

    let engine = ApprovalEngine::new(Arc::new(db), config.approval);
    let providers = engine.list_providers().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to read directory");
        std::io::Error::other(format!("Directory error: {}", e))
    })?;

    tracing::info!(providers = providers.len(), "Directory ready");
    Ok(())
}
