//! Status normalization for provider subscription records.
//!
//! The provider's field names and status vocabulary are not stable, so both
//! are isolated here as ordered tables:
//!
//! - alias accessors: the first field present wins;
//! - status rules: `(predicate, state)` pairs evaluated top to bottom, with
//!   `Incomplete` as the fall-through so unknown statuses never grant access.

use crate::models::{CustomerKey, SubscriptionRecord, SubscriptionState};

type Accessor = fn(&SubscriptionRecord) -> Option<String>;

const STATUS_ACCESSORS: &[Accessor] = &[
    |r| r.field(&["status"]),
    |r| r.field(&["subscription_status"]),
    |r| r.field(&["state"]),
];

const PLAN_ACCESSORS: &[Accessor] = &[
    |r| r.field(&["plan_id"]),
    |r| r.field(&["product_id"]),
    |r| r.field(&["plan", "id"]),
    |r| r.field(&["product", "id"]),
];

const SUBSCRIPTION_ID_ACCESSORS: &[Accessor] = &[
    |r| r.field(&["id"]),
    |r| r.field(&["subscription_id"]),
];

type CustomerAccessor = fn(&SubscriptionRecord) -> Option<CustomerKey>;

const CUSTOMER_ACCESSORS: &[CustomerAccessor] = &[
    |r| r.field(&["customer", "email"]).map(CustomerKey::Email),
    |r| r.field(&["customer_email"]).map(CustomerKey::Email),
    |r| r.field(&["external_id"]).map(CustomerKey::ExternalId),
    |r| r.field(&["customer_external_id"]).map(CustomerKey::ExternalId),
];

struct StatusRule {
    needles: &'static [&'static str],
    state: SubscriptionState,
}

/// Priority order matters: "paid" beats "cancel", "cancel" beats "expire".
const STATUS_RULES: &[StatusRule] = &[
    StatusRule {
        needles: &["approved", "paid", "completed", "active"],
        state: SubscriptionState::Active,
    },
    StatusRule {
        needles: &["cancel"],
        state: SubscriptionState::Cancelled,
    },
    StatusRule {
        needles: &["past_due", "overdue"],
        state: SubscriptionState::PastDue,
    },
    StatusRule {
        needles: &["expire"],
        state: SubscriptionState::Cancelled,
    },
];

fn first_present<T>(
    record: &SubscriptionRecord,
    accessors: &[fn(&SubscriptionRecord) -> Option<T>],
) -> Option<T> {
    accessors.iter().find_map(|accessor| accessor(record))
}

/// Raw status string as the provider sent it, if any alias is present.
pub fn raw_status(record: &SubscriptionRecord) -> Option<String> {
    first_present(record, STATUS_ACCESSORS)
}

/// Classify an already-extracted status string.
pub fn classify_status(status: &str) -> SubscriptionState {
    let status = status.to_lowercase();
    STATUS_RULES
        .iter()
        .find(|rule| rule.needles.iter().any(|needle| status.contains(needle)))
        .map(|rule| rule.state)
        .unwrap_or(SubscriptionState::Incomplete)
}

/// Map a raw provider record onto one canonical state. Never fails.
pub fn normalize(record: &SubscriptionRecord) -> SubscriptionState {
    classify_status(&raw_status(record).unwrap_or_default())
}

pub fn plan_identifier(record: &SubscriptionRecord) -> Option<String> {
    first_present(record, PLAN_ACCESSORS)
}

pub fn customer_key(record: &SubscriptionRecord) -> Option<CustomerKey> {
    first_present(record, CUSTOMER_ACCESSORS)
}

pub fn subscription_id(record: &SubscriptionRecord) -> Option<String> {
    first_present(record, SUBSCRIPTION_ID_ACCESSORS)
}
