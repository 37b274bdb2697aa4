//! Retention gate: clamp history reads to what the tier allows.

use crate::models::{HistoryRequest, HistoryWindow, PlanTier};

/// Compute the window sent to storage.
///
/// `days` is always populated and never exceeds the tier allowance. An
/// explicit `start`/`end` is passed through unchanged and narrows within that
/// ceiling; storage applies both constraints.
pub fn effective_window(tier: PlanTier, requested: &HistoryRequest) -> HistoryWindow {
    let allowance = tier.history_limit_days();
    let days = requested
        .days
        .map(|days| days.clamp(1, allowance))
        .unwrap_or(allowance);

    HistoryWindow {
        days,
        start: requested.start,
        end: requested.end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn free_tier_caps_long_request() {
        let window = effective_window(PlanTier::Free, &HistoryRequest::days(365));
        assert_eq!(
            window,
            HistoryWindow {
                days: 6,
                start: None,
                end: None
            }
        );
    }

    #[test]
    fn narrower_request_passes_through() {
        let window = effective_window(PlanTier::Yearly, &HistoryRequest::days(7));
        assert_eq!(window.days, 7);
        assert_eq!(window.start, None);
        assert_eq!(window.end, None);
    }

    #[test]
    fn explicit_range_keeps_tier_ceiling() {
        let start = date("2026-01-01");
        let end = date("2026-03-31");
        let window = effective_window(PlanTier::Free, &HistoryRequest::range(start, end));

        assert_eq!(window.days, 6);
        assert_eq!(window.start, Some(start));
        assert_eq!(window.end, Some(end));
    }

    #[test]
    fn explicit_range_with_days_uses_smaller_of_both() {
        let request = HistoryRequest {
            days: Some(30),
            start: Some(date("2025-01-01")),
            end: Some(date("2026-01-01")),
        };
        assert_eq!(effective_window(PlanTier::Monthly, &request).days, 30);
        assert_eq!(effective_window(PlanTier::Free, &request).days, 6);
    }

    #[test]
    fn empty_request_gets_full_allowance() {
        assert_eq!(
            effective_window(PlanTier::Free, &HistoryRequest::default()).days,
            6
        );
        assert_eq!(
            effective_window(PlanTier::Quarterly, &HistoryRequest::default()).days,
            365
        );
    }

    #[test]
    fn non_positive_days_never_reach_storage() {
        assert_eq!(effective_window(PlanTier::Yearly, &HistoryRequest::days(0)).days, 1);
        assert_eq!(effective_window(PlanTier::Free, &HistoryRequest::days(-10)).days, 1);
    }

    #[test]
    fn window_never_exceeds_allowance() {
        for tier in [
            PlanTier::Free,
            PlanTier::Monthly,
            PlanTier::Quarterly,
            PlanTier::Yearly,
        ] {
            for days in [1, 5, 6, 7, 364, 365, 366, 3650] {
                let window = effective_window(tier, &HistoryRequest::days(days));
                assert!(window.days <= tier.history_limit_days());
                assert!(window.days >= 1);
            }
        }
    }
}
