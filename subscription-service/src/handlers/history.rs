//! Meal history reads, gated by the requester's plan tier.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use service_core::error::AppError;
use validator::Validate;

use crate::middleware::RequesterContext;
use crate::models::{HistoryQuery, HistoryRequest, HistoryWindow, MealHistoryEntry, PlanTier};
use crate::services::{effective_window, record_history_query};
use crate::startup::AppState;

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub tier: PlanTier,
    pub window: HistoryWindow,
    pub entries: Vec<MealHistoryEntry>,
}

pub async fn meal_history(
    requester: RequesterContext,
    State(state): State<AppState>,
    Query(request): Query<HistoryRequest>,
) -> Result<Json<HistoryResponse>, AppError> {
    request.validate()?;

    let user = state
        .db
        .get_user_plan(requester.user_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("Profile {} not found", requester.user_id))
        })?;

    let tier = user.effective_tier(Utc::now());
    let window = effective_window(tier, &request);
    let clamped = request.days.is_some_and(|days| days > window.days);

    record_history_query(tier.as_str(), clamped);
    tracing::debug!(
        user_id = %requester.user_id,
        tier = %tier,
        days = window.days,
        clamped,
        "Reading meal history"
    );

    let entries = state
        .db
        .fetch_meal_history(&HistoryQuery {
            requester_id: requester.user_id,
            window,
        })
        .await?;

    Ok(Json(HistoryResponse {
        tier,
        window,
        entries,
    }))
}
