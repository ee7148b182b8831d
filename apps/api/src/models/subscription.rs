use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Billing-provider subscription, keyed by the customer's email for entitlement checks.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SubscriptionRow {
    pub id: Uuid,
    /// Provider event that created the row; replays of it are ignored.
    pub event_id: String,
    pub email: String,
    pub customer_id: String,
    pub subscription_id: String,
    pub item_price_id: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }
}

/// Fields taken from a `subscription_created` event.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSubscription {
    pub event_id: String,
    pub email: String,
    pub customer_id: String,
    pub subscription_id: String,
    pub item_price_id: String,
    pub status: String,
}
