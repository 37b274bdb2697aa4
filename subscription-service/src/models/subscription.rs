//! Subscription model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Canonical subscription state.
///
/// Every provider record maps to exactly one of these. Anything the
/// normalizer does not recognize becomes `Incomplete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    Active,
    PastDue,
    Cancelled,
    Incomplete,
}

impl SubscriptionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionState::Active => "active",
            SubscriptionState::PastDue => "past_due",
            SubscriptionState::Cancelled => "cancelled",
            SubscriptionState::Incomplete => "incomplete",
        }
    }

    /// Parse a persisted state. Unknown values fall back to `Incomplete`.
    pub fn from_string(s: &str) -> Self {
        match s {
            "active" => SubscriptionState::Active,
            "past_due" => SubscriptionState::PastDue,
            "cancelled" => SubscriptionState::Cancelled,
            _ => SubscriptionState::Incomplete,
        }
    }

    pub fn grants_paid_access(&self) -> bool {
        matches!(self, SubscriptionState::Active)
    }
}

impl std::fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw subscription payload from the payment provider.
///
/// Untrusted and partially populated: every accessor returns `Option`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionRecord(Value);

impl SubscriptionRecord {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Read a scalar at `path` as a trimmed, non-empty string.
    ///
    /// Numbers and booleans are stringified. Objects, arrays, null and blank
    /// strings count as absent.
    pub fn field(&self, path: &[&str]) -> Option<String> {
        let mut current = &self.0;
        for key in path {
            current = current.as_object()?.get(*key)?;
        }

        match current {
            Value::String(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

impl From<Value> for SubscriptionRecord {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// How a provider record identifies the paying customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomerKey {
    Email(String),
    ExternalId(String),
}

impl CustomerKey {
    pub fn as_str(&self) -> &str {
        match self {
            CustomerKey::Email(v) | CustomerKey::ExternalId(v) => v,
        }
    }
}

/// Last known provider view of a subscription, kept for audit and support.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SubscriptionSnapshot {
    pub subscription_key: String,
    pub user_id: Uuid,
    pub customer_email: Option<String>,
    pub provider_status: Option<String>,
    pub state: String,
    pub plan: String,
    pub plan_identifier: Option<String>,
    pub raw: Value,
    pub synced_utc: DateTime<Utc>,
}
