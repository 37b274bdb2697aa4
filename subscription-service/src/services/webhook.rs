//! Kiwify webhook payload handling.
//!
//! A delivery carries order-level fields at the top (`order_status`,
//! `Customer`, `Product`) and the subscription object nested under
//! `Subscription`. Both are folded into one [`SubscriptionRecord`] so the
//! normalizer sees the same shape as an API sync.

use crate::models::SubscriptionRecord;
use crate::services::normalizer;
use serde_json::{Map, Value};
use service_core::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WebhookEventType {
    OrderApproved,
    OrderRejected,
    OrderRefunded,
    Chargeback,
    BilletCreated,
    PixCreated,
    SubscriptionRenewed,
    SubscriptionLate,
    SubscriptionCanceled,
}

impl WebhookEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEventType::OrderApproved => "order_approved",
            WebhookEventType::OrderRejected => "order_rejected",
            WebhookEventType::OrderRefunded => "order_refunded",
            WebhookEventType::Chargeback => "chargeback",
            WebhookEventType::BilletCreated => "billet_created",
            WebhookEventType::PixCreated => "pix_created",
            WebhookEventType::SubscriptionRenewed => "subscription_renewed",
            WebhookEventType::SubscriptionLate => "subscription_late",
            WebhookEventType::SubscriptionCanceled => "subscription_canceled",
        }
    }

    /// Unknown event types are rejected rather than processed as a default.
    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "order_approved" => Ok(WebhookEventType::OrderApproved),
            "order_rejected" => Ok(WebhookEventType::OrderRejected),
            "order_refunded" => Ok(WebhookEventType::OrderRefunded),
            "chargeback" => Ok(WebhookEventType::Chargeback),
            "billet_created" => Ok(WebhookEventType::BilletCreated),
            "pix_created" => Ok(WebhookEventType::PixCreated),
            "subscription_renewed" => Ok(WebhookEventType::SubscriptionRenewed),
            "subscription_late" => Ok(WebhookEventType::SubscriptionLate),
            "subscription_canceled" => Ok(WebhookEventType::SubscriptionCanceled),
            other => Err(AppError::BadRequest(anyhow::anyhow!(
                "Unknown webhook event type '{}'",
                other
            ))),
        }
    }

    /// Status implied by the event itself.
    fn implied_status(&self) -> &'static str {
        match self {
            WebhookEventType::OrderApproved => "approved",
            WebhookEventType::OrderRejected => "refused",
            WebhookEventType::OrderRefunded => "refunded",
            WebhookEventType::Chargeback => "chargedback",
            WebhookEventType::BilletCreated | WebhookEventType::PixCreated => "waiting_payment",
            WebhookEventType::SubscriptionRenewed => "active",
            WebhookEventType::SubscriptionLate => "past_due",
            WebhookEventType::SubscriptionCanceled => "canceled",
        }
    }

    /// Revoking events override whatever status the payload snapshot carries.
    fn overrides_payload_status(&self) -> bool {
        matches!(
            self,
            WebhookEventType::OrderRejected
                | WebhookEventType::OrderRefunded
                | WebhookEventType::Chargeback
                | WebhookEventType::SubscriptionLate
                | WebhookEventType::SubscriptionCanceled
        )
    }
}

/// A parsed webhook delivery.
#[derive(Debug, Clone)]
pub struct KiwifyWebhook {
    pub event_type: Option<WebhookEventType>,
    pub record: SubscriptionRecord,
}

impl KiwifyWebhook {
    pub fn event_label(&self) -> &'static str {
        self.event_type.map(|e| e.as_str()).unwrap_or("untyped")
    }
}

fn nested_object(payload: &Map<String, Value>, keys: &[&str]) -> Option<Map<String, Value>> {
    keys.iter()
        .find_map(|key| payload.get(*key).and_then(Value::as_object))
        .cloned()
}

fn first_field(record: &SubscriptionRecord, paths: &[&[&str]]) -> Option<String> {
    paths.iter().find_map(|path| record.field(path))
}

/// Parse a webhook body into a normalizable record.
pub fn parse_webhook(body: &[u8]) -> Result<KiwifyWebhook, AppError> {
    let payload: Value = serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid webhook payload: {}", e)))?;

    let top_object = payload
        .as_object()
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Webhook payload must be an object")))?;

    let top = SubscriptionRecord::new(payload.clone());

    let event_type = first_field(&top, &[&["webhook_event_type"], &["event_type"]])
        .map(|s| WebhookEventType::parse(&s))
        .transpose()?;

    let mut merged = nested_object(top_object, &["Subscription", "subscription"]).unwrap_or_default();
    let nested = SubscriptionRecord::new(Value::Object(merged.clone()));

    let status = match event_type {
        Some(event) if event.overrides_payload_status() => Some(event.implied_status().to_string()),
        _ => normalizer::raw_status(&nested)
            .or_else(|| top.field(&["order_status"]))
            .or_else(|| normalizer::raw_status(&top))
            .or_else(|| event_type.map(|e| e.implied_status().to_string())),
    };
    if let Some(status) = status {
        merged.insert("status".to_string(), Value::String(status));
    }

    if normalizer::customer_key(&nested).is_none() {
        if let Some(email) = first_field(
            &top,
            &[&["Customer", "email"], &["customer", "email"], &["customer_email"]],
        ) {
            merged.insert("customer_email".to_string(), Value::String(email));
        } else if let Some(external_id) = first_field(
            &top,
            &[&["external_id"], &["TrackingParameters", "external_id"]],
        ) {
            merged.insert("external_id".to_string(), Value::String(external_id));
        }
    }

    if normalizer::plan_identifier(&nested).is_none() {
        if let Some(product_id) = first_field(
            &top,
            &[&["Product", "product_id"], &["product_id"], &["plan_id"]],
        ) {
            merged.insert("product_id".to_string(), Value::String(product_id));
        }
    }

    if normalizer::subscription_id(&nested).is_none() {
        if let Some(id) = top.field(&["subscription_id"]) {
            merged.insert("subscription_id".to_string(), Value::String(id));
        }
    }

    if let Some(order_id) = top.field(&["order_id"]) {
        merged.insert("order_id".to_string(), Value::String(order_id));
    }

    Ok(KiwifyWebhook {
        event_type,
        record: SubscriptionRecord::new(Value::Object(merged)),
    })
}
