//! Domain models for subscription-service.

pub mod history;
pub mod plan;
pub mod subscription;
pub mod sync;

pub use history::{HistoryQuery, HistoryRequest, HistoryWindow, MealHistoryEntry};
pub use plan::{PlanTable, PlanTier, UserPlan};
pub use subscription::{CustomerKey, SubscriptionRecord, SubscriptionSnapshot, SubscriptionState};
pub use sync::{ReconcileOutcome, SyncAction, SyncReport, SyncRequest};
