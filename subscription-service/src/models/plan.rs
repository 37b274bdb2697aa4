//! Plan tiers and the provider plan table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Days of meal history the free tier may read.
pub const FREE_HISTORY_LIMIT_DAYS: i32 = 6;

/// Days of meal history any paid tier may read. Finite on purpose: storage
/// always receives a concrete ceiling.
pub const PAID_HISTORY_LIMIT_DAYS: i32 = 365;

/// Internal plan level gating features and history retention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    Free,
    Monthly,
    Quarterly,
    Yearly,
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Monthly => "monthly",
            PlanTier::Quarterly => "quarterly",
            PlanTier::Yearly => "yearly",
        }
    }

    /// Strict parse, used for configuration.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Some(PlanTier::Free),
            "monthly" => Some(PlanTier::Monthly),
            "quarterly" => Some(PlanTier::Quarterly),
            "yearly" => Some(PlanTier::Yearly),
            _ => None,
        }
    }

    /// Lenient parse for persisted values. Unknown falls back to `Free`.
    pub fn from_string(s: &str) -> Self {
        Self::parse(s).unwrap_or(PlanTier::Free)
    }

    pub fn history_limit_days(&self) -> i32 {
        match self {
            PlanTier::Free => FREE_HISTORY_LIMIT_DAYS,
            PlanTier::Monthly | PlanTier::Quarterly | PlanTier::Yearly => PAID_HISTORY_LIMIT_DAYS,
        }
    }

    /// Length of one paid period, written alongside the tier.
    pub fn duration_days(&self) -> i32 {
        match self {
            PlanTier::Free => 0,
            PlanTier::Monthly => 30,
            PlanTier::Quarterly => 90,
            PlanTier::Yearly => 365,
        }
    }

    pub fn is_paid(&self) -> bool {
        !matches!(self, PlanTier::Free)
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keywords found in provider plan/product identifiers, checked in order.
const KEYWORD_RULES: &[(&[&str], PlanTier)] = &[
    (&["yearly", "annual", "anual"], PlanTier::Yearly),
    (&["quarterly", "trimestral"], PlanTier::Quarterly),
    (&["monthly", "mensal"], PlanTier::Monthly),
];

/// Maps provider plan identifiers to tiers.
///
/// Explicit entries (from configuration) win; otherwise the identifier is
/// matched against [`KEYWORD_RULES`].
#[derive(Debug, Clone, Default)]
pub struct PlanTable {
    entries: HashMap<String, PlanTier>,
}

impl PlanTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, identifier: &str, tier: PlanTier) -> Self {
        self.entries.insert(normalize_key(identifier), tier);
        self
    }

    /// Parse `identifier=tier` pairs separated by commas.
    pub fn parse(spec: &str) -> Result<Self, anyhow::Error> {
        let mut table = Self::new();
        for pair in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (identifier, tier) = pair
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("Plan mapping '{}' is missing '='", pair))?;
            let identifier = identifier.trim();
            if identifier.is_empty() {
                anyhow::bail!("Plan mapping '{}' has an empty identifier", pair);
            }
            let tier = PlanTier::parse(tier)
                .ok_or_else(|| anyhow::anyhow!("Unknown plan tier in mapping '{}'", pair))?;
            table = table.with_entry(identifier, tier);
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&self, identifier: &str) -> Option<PlanTier> {
        let key = normalize_key(identifier);
        if key.is_empty() {
            return None;
        }

        if let Some(tier) = self.entries.get(&key) {
            return Some(*tier);
        }

        KEYWORD_RULES
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|k| key.contains(k)))
            .map(|(_, tier)| *tier)
    }
}

fn normalize_key(identifier: &str) -> String {
    identifier.trim().to_lowercase()
}

/// A user's persisted plan.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserPlan {
    pub user_id: Uuid,
    pub email: String,
    pub plan: String,
    pub plan_expires_at: Option<DateTime<Utc>>,
    pub updated_utc: DateTime<Utc>,
}

impl UserPlan {
    pub fn tier(&self) -> PlanTier {
        PlanTier::from_string(&self.plan)
    }

    /// Tier in force at `now`; a lapsed paid plan reads as `Free`.
    pub fn effective_tier(&self, now: DateTime<Utc>) -> PlanTier {
        match (self.tier(), self.plan_expires_at) {
            (tier, Some(expires)) if tier.is_paid() && expires <= now => PlanTier::Free,
            (tier, _) => tier,
        }
    }
}
