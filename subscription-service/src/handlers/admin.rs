//! Admin endpoints: manual provider sync and plan inspection.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use service_core::error::AppError;
use std::collections::HashSet;
use uuid::Uuid;

use crate::middleware::AdminContext;
use crate::models::{
    CustomerKey, PlanTier, SubscriptionRecord, SubscriptionSnapshot, SyncAction, SyncReport,
    SyncRequest,
};
use crate::services::normalizer;
use crate::startup::AppState;

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub action: SyncAction,
    /// Records the provider returned.
    pub fetched: usize,
    /// Records left after the email filter.
    pub matched: usize,
    pub report: SyncReport,
}

/// Keep only records whose customer email is in `emails` (case-insensitive).
fn filter_by_emails(records: Vec<SubscriptionRecord>, emails: &[String]) -> Vec<SubscriptionRecord> {
    let wanted: HashSet<String> = emails
        .iter()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect();

    records
        .into_iter()
        .filter(|record| match normalizer::customer_key(record) {
            Some(CustomerKey::Email(email)) => wanted.contains(&email.to_lowercase()),
            _ => false,
        })
        .collect()
}

pub async fn sync_subscriptions(
    _admin: AdminContext,
    State(state): State<AppState>,
    Json(request): Json<SyncRequest>,
) -> Result<Json<SyncResponse>, AppError> {
    let action = SyncAction::parse(&request.action)?;

    if action == SyncAction::SyncEmails && request.emails.iter().all(|e| e.trim().is_empty()) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "sync_emails requires at least one email"
        )));
    }

    tracing::info!(
        action = action.as_str(),
        emails = request.emails.len(),
        "Starting subscription sync"
    );

    let records = state.kiwify.fetch_all_subscriptions().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to fetch subscriptions from Kiwify");
        AppError::from(e)
    })?;
    let fetched = records.len();

    let records = match action {
        SyncAction::SyncAll => records,
        SyncAction::SyncEmails => filter_by_emails(records, &request.emails),
    };

    let report = state
        .reconciler
        .reconcile_batch(&records, action.as_str())
        .await;

    Ok(Json(SyncResponse {
        action,
        fetched,
        matched: records.len(),
        report,
    }))
}

#[derive(Debug, Serialize)]
pub struct UserPlanResponse {
    pub user_id: Uuid,
    pub email: String,
    pub plan: PlanTier,
    pub effective_plan: PlanTier,
    pub plan_expires_at: Option<DateTime<Utc>>,
    pub history_limit_days: i32,
    pub subscriptions: Vec<SubscriptionSnapshot>,
}

pub async fn get_user_plan(
    _admin: AdminContext,
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserPlanResponse>, AppError> {
    let user = state
        .db
        .get_user_plan(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User {} not found", user_id)))?;

    let subscriptions = state.db.list_subscriptions_for_user(user_id).await?;
    let effective_plan = user.effective_tier(Utc::now());

    Ok(Json(UserPlanResponse {
        user_id: user.user_id,
        plan: user.tier(),
        effective_plan,
        plan_expires_at: user.plan_expires_at,
        history_limit_days: effective_plan.history_limit_days(),
        email: user.email,
        subscriptions,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn email_filter_is_case_insensitive_and_ignores_other_keys() {
        let records = vec![
            SubscriptionRecord::new(json!({ "id": "a", "customer_email": "Ana@Example.com" })),
            SubscriptionRecord::new(json!({ "id": "b", "customer": { "email": "bia@example.com" } })),
            SubscriptionRecord::new(json!({ "id": "c", "external_id": "ana@example.com" })),
            SubscriptionRecord::new(json!({ "id": "d" })),
        ];

        let kept = filter_by_emails(records, &[" ana@example.com ".to_string()]);
        let ids: Vec<_> = kept
            .iter()
            .filter_map(normalizer::subscription_id)
            .collect();
        assert_eq!(ids, vec!["a".to_string()]);
    }
}
