//! Configuration module for provider-request-service.

use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

use crate::services::ApprovalPolicy;

#[derive(Debug, Clone)]
pub struct ProviderRequestConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub approval: ApprovalPolicy,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

impl ProviderRequestConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        Self::from_lookup(common, |key| env::var(key).ok())
    }

    /// Build the configuration from `common` plus whatever `var` returns for
    /// each service variable.
    pub fn from_lookup<F>(common: core_config::Config, var: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parsed_or = |key: &str, default: u64| -> u64 {
            var(key).and_then(|s| s.parse().ok()).unwrap_or(default)
        };
        let defaults = ApprovalPolicy::default();

        let max_providers_per_owner =
            parsed_or("MAX_PROVIDERS_PER_OWNER", defaults.max_providers_per_owner as u64) as usize;
        if max_providers_per_owner == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "MAX_PROVIDERS_PER_OWNER must be at least 1"
            )));
        }

        Ok(Self {
            service_name: var("SERVICE_NAME")
                .unwrap_or_else(|| "provider-request-service".to_string()),
            service_version: var("SERVICE_VERSION")
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            log_level: var("LOG_LEVEL").unwrap_or_else(|| common.log_level.clone()),
            otlp_endpoint: var("OTLP_ENDPOINT").filter(|s| !s.is_empty()),
            database: DatabaseConfig {
                url: var("DATABASE_URL").ok_or_else(|| {
                    AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required"))
                })?,
                max_connections: var("DATABASE_MAX_CONNECTIONS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
                min_connections: var("DATABASE_MIN_CONNECTIONS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
            },
            approval: ApprovalPolicy {
                evidence_validity_days: parsed_or(
                    "EVIDENCE_VALIDITY_DAYS",
                    defaults.evidence_validity_days,
                ),
                max_providers_per_owner,
            },
            common,
        })
    }
}
