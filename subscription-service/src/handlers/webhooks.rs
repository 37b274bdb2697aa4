//! Kiwify webhook endpoint.
//!
//! Deliveries are verified against the raw body before any parsing. A
//! persistence failure answers 500 so the provider redelivers; reconciliation
//! is idempotent, so redelivery is safe.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;

use crate::models::ReconcileOutcome;
use crate::services::{normalizer, parse_webhook, record_error, record_webhook_event};
use crate::startup::AppState;

pub const SIGNATURE_HEADER: &str = "x-kiwify-signature";

#[derive(Debug, Default, Deserialize)]
pub struct WebhookParams {
    pub signature: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub received: bool,
    pub event_type: &'static str,
    #[serde(flatten)]
    pub outcome: ReconcileOutcome,
}

fn signature<'a>(params: &'a WebhookParams, headers: &'a HeaderMap) -> Option<&'a str> {
    params
        .signature
        .as_deref()
        .or_else(|| headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub async fn kiwify_webhook(
    State(state): State<AppState>,
    Query(params): Query<WebhookParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, AppError> {
    let signature = signature(&params, &headers).ok_or_else(|| {
        tracing::warn!("Missing Kiwify webhook signature");
        record_webhook_event("unknown", "unauthorized");
        AppError::Unauthorized(anyhow::anyhow!("Missing webhook signature"))
    })?;

    if !state.kiwify.verify_webhook_signature(&body, signature) {
        tracing::warn!("Invalid Kiwify webhook signature");
        record_webhook_event("unknown", "unauthorized");
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Invalid webhook signature"
        )));
    }

    let webhook = parse_webhook(&body).inspect_err(|e| {
        tracing::warn!(error = %e, "Rejected Kiwify webhook payload");
        record_webhook_event("unknown", "invalid");
    })?;

    let event_type = webhook.event_label();
    let subscription_state = normalizer::normalize(&webhook.record);

    tracing::info!(
        event_type,
        state = %subscription_state,
        order_id = ?webhook.record.field(&["order_id"]),
        "Processing Kiwify webhook"
    );

    let outcome = state
        .reconciler
        .reconcile_record(&webhook.record)
        .await
        .inspect_err(|e| {
            tracing::error!(error = %e, event_type, "Failed to reconcile webhook");
            record_webhook_event(event_type, "error");
            record_error(e.kind(), "kiwify_webhook");
        })?;

    record_webhook_event(event_type, outcome.label());

    Ok(Json(WebhookResponse {
        received: true,
        event_type,
        outcome,
    }))
}
