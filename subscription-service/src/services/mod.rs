//! Services module for subscription-service.

pub mod database;
pub mod kiwify;
pub mod metrics;
pub mod normalizer;
pub mod reconciler;
pub mod retention;
pub mod tier;
pub mod webhook;

pub use database::Database;
pub use kiwify::{KiwifyClient, KiwifyError};
pub use metrics::{
    get_metrics, init_metrics, record_error, record_history_query, record_provider_request,
    record_sync_record, record_webhook_event,
};
pub use reconciler::{PlanStore, Reconciler};
pub use retention::effective_window;
pub use tier::resolve_tier;
pub use webhook::{parse_webhook, KiwifyWebhook, WebhookEventType};
