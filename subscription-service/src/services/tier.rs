//! Plan/feature resolution from a normalized subscription state.

use crate::models::{PlanTable, PlanTier, SubscriptionState};

/// Compute the tier a user should hold. Pure; persisting is the caller's job.
///
/// Only `Active` can grant a paid tier. An active record whose plan
/// identifier is missing or unmapped keeps `previous`, so a renewal carrying
/// an unfamiliar product id neither downgrades nor upgrades the user.
pub fn resolve_tier(
    state: SubscriptionState,
    previous: PlanTier,
    plan_identifier: Option<&str>,
    plans: &PlanTable,
) -> PlanTier {
    match state {
        SubscriptionState::Active => plan_identifier
            .and_then(|id| plans.lookup(id))
            .unwrap_or_else(|| {
                tracing::warn!(
                    plan_identifier = ?plan_identifier,
                    previous = %previous,
                    "Active subscription with unmapped plan, keeping previous tier"
                );
                previous
            }),
        SubscriptionState::PastDue | SubscriptionState::Cancelled | SubscriptionState::Incomplete => {
            PlanTier::Free
        }
    }
}
