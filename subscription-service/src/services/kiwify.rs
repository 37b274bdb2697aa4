//! Kiwify API client.
//!
//! Pages through the provider's subscription list and hands back raw
//! records; interpretation happens in the normalizer.

use crate::config::KiwifyConfig;
use crate::models::SubscriptionRecord;
use crate::services::metrics::record_provider_request;
use backoff::{future::retry, ExponentialBackoff};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use service_core::error::AppError;
use service_core::observability::TracedClientExt;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, instrument, warn};

/// Hard stop for pagination in case the provider never returns a short page.
const MAX_PAGES: u32 = 500;

#[derive(Debug, Error)]
pub enum KiwifyError {
    #[error("Kiwify credentials not configured")]
    NotConfigured,

    #[error("Kiwify request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Kiwify returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Kiwify response could not be decoded: {0}")]
    Decode(String),
}

impl KiwifyError {
    /// Timeouts, connection errors, 429 and 5xx are worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            KiwifyError::Transport(_) => true,
            KiwifyError::Status { status, .. } => *status == 429 || *status >= 500,
            KiwifyError::NotConfigured | KiwifyError::Decode(_) => false,
        }
    }

    fn into_backoff(self) -> backoff::Error<KiwifyError> {
        if self.is_transient() {
            backoff::Error::transient(self)
        } else {
            backoff::Error::permanent(self)
        }
    }
}

impl From<KiwifyError> for AppError {
    fn from(err: KiwifyError) -> Self {
        match err {
            KiwifyError::NotConfigured => AppError::ServiceUnavailable,
            other => AppError::BadGateway(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubscriptionPage {
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

/// Kiwify client for interacting with the Kiwify public API.
#[derive(Clone)]
pub struct KiwifyClient {
    client: Client,
    config: KiwifyConfig,
}

impl KiwifyClient {
    pub fn new(config: KiwifyConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Check if API credentials are set.
    pub fn is_configured(&self) -> bool {
        !self.config.account_id.is_empty() && !self.config.api_token.expose_secret().is_empty()
    }

    /// Verify a webhook body against the configured webhook secret.
    pub fn verify_webhook_signature(&self, body: &[u8], signature: &str) -> bool {
        match service_core::utils::signature::verify_body_signature(
            self.config.webhook_secret.expose_secret(),
            body,
            signature,
        ) {
            Ok(valid) => valid,
            Err(e) => {
                warn!(error = %e, "Webhook signature verification error");
                false
            }
        }
    }

    /// Fetch one page of subscriptions, retrying transient failures.
    #[instrument(skip(self))]
    pub async fn list_subscriptions(
        &self,
        page_number: u32,
    ) -> Result<Vec<SubscriptionRecord>, KiwifyError> {
        if !self.is_configured() {
            return Err(KiwifyError::NotConfigured);
        }

        let policy = ExponentialBackoff {
            max_elapsed_time: Some(self.config.retry_max_elapsed),
            ..Default::default()
        };

        retry(policy, || async {
            self.fetch_page(page_number).await.map_err(|e| {
                warn!(page_number, error = %e, transient = e.is_transient(), "Kiwify page fetch failed");
                e.into_backoff()
            })
        })
        .await
    }

    /// Fetch every subscription, page by page, until a short page.
    #[instrument(skip(self))]
    pub async fn fetch_all_subscriptions(&self) -> Result<Vec<SubscriptionRecord>, KiwifyError> {
        let page_size = self.config.page_size.max(1) as usize;
        let mut records = Vec::new();

        for page_number in 1..=MAX_PAGES {
            let page = self.list_subscriptions(page_number).await?;
            let last_page = page.len() < page_size;
            records.extend(page);

            if last_page {
                info!(pages = page_number, records = records.len(), "Fetched Kiwify subscriptions");
                return Ok(records);
            }
        }

        warn!(
            max_pages = MAX_PAGES,
            records = records.len(),
            "Kiwify pagination limit reached, result may be incomplete"
        );
        Ok(records)
    }

    async fn fetch_page(&self, page_number: u32) -> Result<Vec<SubscriptionRecord>, KiwifyError> {
        let url = format!(
            "{}/v1/subscriptions",
            self.config.api_base_url.trim_end_matches('/')
        );
        let start = Instant::now();

        let response = self
            .client
            .traced_get(&url)
            .bearer_auth(self.config.api_token.expose_secret())
            .header("x-kiwify-account-id", &self.config.account_id)
            .query(&[
                ("page_number", page_number),
                ("page_size", self.config.page_size),
            ])
            .timeout(self.config.request_timeout)
            .send()
            .await?;

        let status = response.status();
        record_provider_request(
            "list_subscriptions",
            status.as_str(),
            start.elapsed().as_secs_f64(),
        );

        let body = response.text().await?;

        if !status.is_success() {
            return Err(KiwifyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let page: SubscriptionPage =
            serde_json::from_str(&body).map_err(|e| KiwifyError::Decode(e.to_string()))?;

        Ok(page.data.into_iter().map(SubscriptionRecord::new).collect())
    }
}
