//! Reconciliation requests and results.

use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;

use super::{PlanTier, SubscriptionState};

/// Admin-triggered sync action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    /// Reconcile every subscription the provider returns.
    SyncAll,
    /// Reconcile only subscriptions belonging to the given emails.
    SyncEmails,
}

impl SyncAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncAction::SyncAll => "sync_all",
            SyncAction::SyncEmails => "sync_emails",
        }
    }

    /// Unknown actions are a client error, never a default.
    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "sync_all" => Ok(SyncAction::SyncAll),
            "sync_emails" => Ok(SyncAction::SyncEmails),
            other => Err(AppError::BadRequest(anyhow::anyhow!(
                "Unknown sync action '{}'",
                other
            ))),
        }
    }
}

/// Body of `POST /admin/subscriptions/sync`.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncRequest {
    pub action: String,
    #[serde(default)]
    pub emails: Vec<String>,
}

/// Result of reconciling one provider record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    Updated {
        user_id: Uuid,
        state: SubscriptionState,
        previous: PlanTier,
        tier: PlanTier,
    },
    Unchanged {
        user_id: Uuid,
        state: SubscriptionState,
        tier: PlanTier,
    },
    SkippedNoCustomer,
    SkippedUnknownUser {
        customer: String,
    },
    /// Another record for the same customer in the batch decided the tier.
    Superseded {
        subscription_id: Option<String>,
    },
}

impl ReconcileOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ReconcileOutcome::Updated { .. } => "updated",
            ReconcileOutcome::Unchanged { .. } => "unchanged",
            ReconcileOutcome::SkippedNoCustomer => "skipped_no_customer",
            ReconcileOutcome::SkippedUnknownUser { .. } => "skipped_unknown_user",
            ReconcileOutcome::Superseded { .. } => "superseded",
        }
    }
}

/// Per-batch counters. One failing record never aborts the batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub processed: u32,
    pub updated: u32,
    pub unchanged: u32,
    pub skipped: u32,
    pub errors: u32,
}

impl SyncReport {
    pub fn record(&mut self, result: &Result<ReconcileOutcome, AppError>) {
        self.processed += 1;
        match result {
            Ok(ReconcileOutcome::Updated { .. }) => self.updated += 1,
            Ok(ReconcileOutcome::Unchanged { .. }) => self.unchanged += 1,
            Ok(ReconcileOutcome::SkippedNoCustomer)
            | Ok(ReconcileOutcome::SkippedUnknownUser { .. })
            | Ok(ReconcileOutcome::Superseded { .. }) => self.skipped += 1,
            Err(_) => self.errors += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_action_is_bad_request() {
        let err = SyncAction::parse("sync_everything").unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(SyncAction::parse("").is_err());
        assert_eq!(SyncAction::parse("sync_all").unwrap(), SyncAction::SyncAll);
    }

    #[test]
    fn report_counts_each_outcome() {
        let user_id = Uuid::new_v4();
        let mut report = SyncReport::default();
        report.record(&Ok(ReconcileOutcome::Updated {
            user_id,
            state: SubscriptionState::Active,
            previous: PlanTier::Free,
            tier: PlanTier::Yearly,
        }));
        report.record(&Ok(ReconcileOutcome::SkippedNoCustomer));
        report.record(&Ok(ReconcileOutcome::Superseded {
            subscription_id: Some("sub_old".to_string()),
        }));
        report.record(&Err(AppError::DatabaseError(anyhow::anyhow!("down"))));

        assert_eq!(
            report,
            SyncReport {
                processed: 4,
                updated: 1,
                unchanged: 0,
                skipped: 2,
                errors: 1,
            }
        );
    }
}
