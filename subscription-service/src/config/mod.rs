//! Configuration module for subscription-service.

use crate::models::PlanTable;
use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SubscriptionConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub kiwify: KiwifyConfig,
    pub plans: PlanTable,
    pub admin: AdminConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct KiwifyConfig {
    pub api_base_url: String,
    pub account_id: String,
    pub api_token: Secret<String>,
    pub webhook_secret: Secret<String>,
    pub page_size: u32,
    pub request_timeout: Duration,
    /// Give up retrying a provider call after this long.
    pub retry_max_elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// Bearer token for `/admin/*`. Empty disables the admin API.
    pub api_token: Secret<String>,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl SubscriptionConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let plans = PlanTable::parse(&env_or("KIWIFY_PLAN_MAP", ""))
            .map_err(|e| AppError::ConfigError(e.context("KIWIFY_PLAN_MAP is invalid")))?;

        Ok(Self {
            common,
            service_name: env_or("SERVICE_NAME", "subscription-service"),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env_or("LOG_LEVEL", "info"),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").map_err(|_| {
                    AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required"))
                })?,
                max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 10),
                min_connections: env_parse("DATABASE_MIN_CONNECTIONS", 2),
            },
            kiwify: KiwifyConfig {
                api_base_url: env_or("KIWIFY_API_BASE_URL", "https://public-api.kiwify.com"),
                account_id: env_or("KIWIFY_ACCOUNT_ID", ""),
                api_token: Secret::new(env_or("KIWIFY_API_TOKEN", "")),
                webhook_secret: Secret::new(env_or("KIWIFY_WEBHOOK_SECRET", "")),
                page_size: env_parse("KIWIFY_PAGE_SIZE", 100),
                request_timeout: Duration::from_secs(env_parse("KIWIFY_REQUEST_TIMEOUT_SECS", 15)),
                retry_max_elapsed: Duration::from_secs(env_parse(
                    "KIWIFY_RETRY_MAX_ELAPSED_SECS",
                    60,
                )),
            },
            plans,
            admin: AdminConfig {
                api_token: Secret::new(env_or("ADMIN_API_TOKEN", "")),
            },
        })
    }
}
