//! Applies provider subscription records to user plans.
//!
//! Webhooks and admin syncs both funnel through [`Reconciler::reconcile_record`]:
//! normalize the record, find the user, resolve the tier, persist. Writes are
//! plain assignments keyed by subscription, so replaying a record is harmless.

use crate::models::{
    CustomerKey, PlanTable, PlanTier, ReconcileOutcome, SubscriptionRecord, SubscriptionSnapshot,
    SubscriptionState, SyncReport, UserPlan,
};
use crate::services::database::Database;
use crate::services::metrics::{record_error, record_sync_record};
use crate::services::normalizer;
use crate::services::tier::resolve_tier;
use async_trait::async_trait;
use chrono::Utc;
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Persistence the reconciler needs.
#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserPlan>, AppError>;
    async fn get_user_plan(&self, user_id: Uuid) -> Result<Option<UserPlan>, AppError>;
    async fn update_user_plan(
        &self,
        user_id: Uuid,
        tier: PlanTier,
        duration_days: i32,
    ) -> Result<UserPlan, AppError>;
    async fn upsert_subscription(&self, snapshot: &SubscriptionSnapshot) -> Result<(), AppError>;
}

#[async_trait]
impl PlanStore for Database {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserPlan>, AppError> {
        Database::find_user_by_email(self, email).await
    }

    async fn get_user_plan(&self, user_id: Uuid) -> Result<Option<UserPlan>, AppError> {
        Database::get_user_plan(self, user_id).await
    }

    async fn update_user_plan(
        &self,
        user_id: Uuid,
        tier: PlanTier,
        duration_days: i32,
    ) -> Result<UserPlan, AppError> {
        Database::update_user_plan(self, user_id, tier, duration_days).await
    }

    async fn upsert_subscription(&self, snapshot: &SubscriptionSnapshot) -> Result<(), AppError> {
        Database::upsert_subscription(self, snapshot).await
    }
}

pub struct Reconciler<S: PlanStore> {
    store: Arc<S>,
    plans: Arc<PlanTable>,
}

impl<S: PlanStore> Clone for Reconciler<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            plans: Arc::clone(&self.plans),
        }
    }
}

impl<S: PlanStore> Reconciler<S> {
    pub fn new(store: Arc<S>, plans: PlanTable) -> Self {
        Self {
            store,
            plans: Arc::new(plans),
        }
    }

    pub fn plans(&self) -> &PlanTable {
        &self.plans
    }

    async fn find_user(&self, key: &CustomerKey) -> Result<Option<UserPlan>, AppError> {
        match key {
            CustomerKey::Email(email) => self.store.find_user_by_email(email).await,
            CustomerKey::ExternalId(external_id) => match Uuid::parse_str(external_id) {
                Ok(user_id) => self.store.get_user_plan(user_id).await,
                Err(_) => {
                    warn!(external_id = %external_id, "External id is not a user id");
                    Ok(None)
                }
            },
        }
    }

    /// Reconcile a single provider record.
    #[instrument(skip(self, record))]
    pub async fn reconcile_record(
        &self,
        record: &SubscriptionRecord,
    ) -> Result<ReconcileOutcome, AppError> {
        let state = normalizer::normalize(record);

        let Some(key) = normalizer::customer_key(record) else {
            warn!(state = %state, "Subscription record has no customer identity, skipping");
            return Ok(ReconcileOutcome::SkippedNoCustomer);
        };

        let Some(user) = self.find_user(&key).await? else {
            info!(customer = %key.as_str(), "No user for subscription customer, skipping");
            return Ok(ReconcileOutcome::SkippedUnknownUser {
                customer: key.as_str().to_string(),
            });
        };

        // Resolve against the tier in force, so a lapsed paid plan cannot be
        // carried forward by a record with an unmapped plan.
        let stored = user.tier();
        let previous = user.effective_tier(Utc::now());
        let plan_identifier = normalizer::plan_identifier(record);
        let tier = resolve_tier(state, previous, plan_identifier.as_deref(), &self.plans);

        // Paid tiers are rewritten even when unchanged so the expiry moves
        // forward with each renewal.
        if tier.is_paid() || tier != stored {
            self.store
                .update_user_plan(user.user_id, tier, tier.duration_days())
                .await?;

            info!(
                user_id = %user.user_id,
                state = %state,
                previous = %previous,
                tier = %tier,
                "User plan reconciled"
            );
        }

        // Written after the plan so the snapshot never records a tier the
        // profile did not receive.
        let snapshot = SubscriptionSnapshot {
            subscription_key: normalizer::subscription_id(record)
                .unwrap_or_else(|| format!("customer:{}", key.as_str())),
            user_id: user.user_id,
            customer_email: match &key {
                CustomerKey::Email(email) => Some(email.clone()),
                CustomerKey::ExternalId(_) => Some(user.email.clone()),
            },
            provider_status: normalizer::raw_status(record),
            state: state.as_str().to_string(),
            plan: tier.as_str().to_string(),
            plan_identifier,
            raw: record.as_value().clone(),
            synced_utc: Utc::now(),
        };
        self.store.upsert_subscription(&snapshot).await?;

        if tier == previous {
            Ok(ReconcileOutcome::Unchanged {
                user_id: user.user_id,
                state,
                tier,
            })
        } else {
            Ok(ReconcileOutcome::Updated {
                user_id: user.user_id,
                state,
                previous,
                tier,
            })
        }
    }

    /// Reconcile a batch. A failing record is counted and logged; the rest of
    /// the batch still runs.
    ///
    /// Records are grouped by customer and only one record per customer
    /// decides the tier: the last active one, or the last record when none is
    /// active. The others are reported as `superseded` and not applied.
    #[instrument(skip(self, records), fields(records = records.len()))]
    pub async fn reconcile_batch(&self, records: &[SubscriptionRecord], trigger: &str) -> SyncReport {
        let mut report = SyncReport::default();

        for group in group_by_customer(records) {
            let decisive = decisive_index(&group);

            for (i, record) in group.iter().enumerate() {
                let result = if i == decisive {
                    self.reconcile_record(record).await
                } else {
                    Ok(ReconcileOutcome::Superseded {
                        subscription_id: normalizer::subscription_id(record),
                    })
                };

                match &result {
                    Ok(outcome) => record_sync_record(trigger, outcome.label()),
                    Err(e) => {
                        warn!(
                            error = %e,
                            subscription_id = ?normalizer::subscription_id(record),
                            "Failed to reconcile subscription record"
                        );
                        record_sync_record(trigger, "error");
                        record_error(e.kind(), "reconcile_record");
                    }
                }
                report.record(&result);
            }
        }

        info!(
            trigger,
            processed = report.processed,
            updated = report.updated,
            unchanged = report.unchanged,
            skipped = report.skipped,
            errors = report.errors,
            "Subscription batch reconciled"
        );

        report
    }
}

fn customer_group_key(key: &CustomerKey) -> String {
    match key {
        CustomerKey::Email(email) => format!("email:{}", email.to_lowercase()),
        CustomerKey::ExternalId(id) => format!("external:{}", id),
    }
}

/// Group records by customer, keeping first-seen order. Records without a
/// customer identity each form their own group.
fn group_by_customer(records: &[SubscriptionRecord]) -> Vec<Vec<&SubscriptionRecord>> {
    let mut groups: Vec<Vec<&SubscriptionRecord>> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for record in records {
        match normalizer::customer_key(record).map(|k| customer_group_key(&k)) {
            Some(group_key) => match positions.get(&group_key) {
                Some(&position) => groups[position].push(record),
                None => {
                    positions.insert(group_key, groups.len());
                    groups.push(vec![record]);
                }
            },
            None => groups.push(vec![record]),
        }
    }

    groups
}

fn decisive_index(group: &[&SubscriptionRecord]) -> usize {
    group
        .iter()
        .rposition(|record| normalizer::normalize(record) == SubscriptionState::Active)
        .unwrap_or(group.len().saturating_sub(1))
}
