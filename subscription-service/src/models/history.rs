//! Meal history read models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Upper bound accepted for a requested `days` value; larger requests are a
/// client error, not a clamp.
pub const MAX_REQUESTED_DAYS: i32 = 3650;

/// What a caller asks for, before the tier cap is applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Validate)]
#[validate(schema(function = "validate_range"))]
pub struct HistoryRequest {
    #[validate(range(min = 1, max = 3650))]
    pub days: Option<i32>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

fn validate_range(request: &HistoryRequest) -> Result<(), ValidationError> {
    match (request.start, request.end) {
        (Some(start), Some(end)) if start > end => {
            let mut err = ValidationError::new("invalid_range");
            err.message = Some("start must not be after end".into());
            Err(err)
        }
        _ => Ok(()),
    }
}

impl HistoryRequest {
    pub fn days(days: i32) -> Self {
        Self {
            days: Some(days),
            ..Default::default()
        }
    }

    pub fn range(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            days: None,
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn has_explicit_range(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }
}

/// The window actually sent to storage.
///
/// `days` is always present and is the authoritative ceiling; `start`/`end`
/// only narrow inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistoryWindow {
    pub days: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDate>,
}

/// A single bounded history read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryQuery {
    pub requester_id: Uuid,
    pub window: HistoryWindow,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MealHistoryEntry {
    pub entry_id: Uuid,
    pub user_id: Uuid,
    pub consumed_at: DateTime<Utc>,
    pub meal_name: String,
    pub calories: i32,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub created_utc: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn zero_days_is_rejected() {
        assert!(HistoryRequest::days(0).validate().is_err());
        assert!(HistoryRequest::days(-3).validate().is_err());
    }

    #[test]
    fn absurd_days_is_rejected() {
        assert!(HistoryRequest::days(MAX_REQUESTED_DAYS + 1).validate().is_err());
        assert!(HistoryRequest::days(MAX_REQUESTED_DAYS).validate().is_ok());
    }

    #[test]
    fn inverted_range_is_rejected() {
        let request = HistoryRequest::range(date("2026-03-10"), date("2026-03-01"));
        assert!(request.validate().is_err());
    }

    #[test]
    fn empty_request_is_valid() {
        let request = HistoryRequest::default();
        assert!(request.validate().is_ok());
        assert!(!request.has_explicit_range());
    }

    #[test]
    fn one_sided_range_counts_as_explicit() {
        let request = HistoryRequest {
            start: Some(date("2026-01-01")),
            ..Default::default()
        };
        assert!(request.validate().is_ok());
        assert!(request.has_explicit_range());
    }
}
