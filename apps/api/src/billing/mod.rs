//! Entitlement, usage metering and the subscription feed behind them.
//!
//! Entitlement and metering are injected into the orchestrator as trait
//! objects so subscription lookups stay out of the orchestration path.
//! `SubscriptionBilling` is the production implementation of both.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::subscription::SubscriptionStatus;
use crate::models::user::UserRow;
use crate::queue::messages::MeterEvent;
use crate::queue::{self, MessageDispatcher, QueueName};
use crate::store::SubscriptionStore;
use crate::webhooks::commands::SubscriptionCommand;

const SUBSCRIPTION_REQUIRED: &str =
    "You need to have an active subscription to use this feature, head over to the web app to subscribe";

/// Decides whether a user may start document generation.
#[async_trait]
pub trait EntitlementPolicy: Send + Sync {
    /// `Err(AppError::EntitlementDenied)` when the user must upgrade first.
    async fn ensure_entitled(&self, user: &UserRow) -> Result<(), AppError>;
}

/// Records billable generation units.
#[async_trait]
pub trait UsageMeter: Send + Sync {
    async fn record_usage(&self, user: &UserRow, amount: i32) -> Result<(), AppError>;
}

/// Entitled with an active subscription, or while usage is under the free allowance.
pub fn is_entitled(has_active_subscription: bool, used: i64, free_allowance: i64) -> bool {
    has_active_subscription || used < free_allowance
}

/// Applies one billing-provider event to the subscription records.
///
/// Replayed creations and status changes for unknown subscriptions are
/// logged and skipped; only store failures are errors.
pub async fn apply_subscription_event(
    subscriptions: &dyn SubscriptionStore,
    command: SubscriptionCommand,
) -> Result<(), AppError> {
    match command {
        SubscriptionCommand::Created(new) => {
            if subscriptions.create(&new).await? {
                info!(
                    "Created subscription {} for customer {}",
                    new.subscription_id, new.customer_id
                );
            } else {
                debug!("Subscription event {} already recorded", new.event_id);
            }
        }
        SubscriptionCommand::Cancelled { subscription_id } => {
            set_status(subscriptions, &subscription_id, SubscriptionStatus::Cancelled).await?;
        }
        SubscriptionCommand::Reactivated { subscription_id } => {
            set_status(subscriptions, &subscription_id, SubscriptionStatus::Active).await?;
        }
        SubscriptionCommand::Ignored { event_type } => {
            debug!("Ignoring subscription event {event_type}");
        }
    }
    Ok(())
}

async fn set_status(
    subscriptions: &dyn SubscriptionStore,
    subscription_id: &str,
    status: SubscriptionStatus,
) -> Result<(), AppError> {
    if subscriptions.set_status(subscription_id, status).await? == 0 {
        warn!("Status change for unknown subscription {subscription_id}; ignoring");
    } else {
        info!("Subscription {subscription_id} is now {}", status.as_str());
    }
    Ok(())
}

pub struct SubscriptionBilling {
    pool: PgPool,
    subscriptions: Arc<dyn SubscriptionStore>,
    dispatcher: Arc<dyn MessageDispatcher>,
    free_allowance: i64,
}

impl SubscriptionBilling {
    pub fn new(
        pool: PgPool,
        subscriptions: Arc<dyn SubscriptionStore>,
        dispatcher: Arc<dyn MessageDispatcher>,
        free_allowance: i64,
    ) -> Self {
        Self {
            pool,
            subscriptions,
            dispatcher,
            free_allowance,
        }
    }

    async fn usage_total(&self, user_id: Uuid) -> Result<i64, AppError> {
        Ok(sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0)::BIGINT FROM usage_events WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?)
    }
}

#[async_trait]
impl EntitlementPolicy for SubscriptionBilling {
    async fn ensure_entitled(&self, user: &UserRow) -> Result<(), AppError> {
        let subscribed = self.subscriptions.find_active(&user.email).await?.is_some();
        let used = if subscribed {
            0
        } else {
            self.usage_total(user.id).await?
        };

        if is_entitled(subscribed, used, self.free_allowance) {
            Ok(())
        } else {
            Err(AppError::EntitlementDenied(SUBSCRIPTION_REQUIRED.to_string()))
        }
    }
}

#[async_trait]
impl UsageMeter for SubscriptionBilling {
    async fn record_usage(&self, user: &UserRow, amount: i32) -> Result<(), AppError> {
        let event_id: Uuid = sqlx::query_scalar(
            "INSERT INTO usage_events (user_id, amount) VALUES ($1, $2) RETURNING id",
        )
        .bind(user.id)
        .bind(amount)
        .fetch_one(&self.pool)
        .await?;

        let Some(subscription) = self.subscriptions.find_active(&user.email).await? else {
            warn!(
                "No active subscription for user {}; usage counted against free allowance",
                user.id
            );
            return Ok(());
        };

        let event = MeterEvent {
            subscription_id: &subscription.subscription_id,
            customer_id: &subscription.customer_id,
            item_price_id: &subscription.item_price_id,
            user_internal_id: user.id,
            meter_amount: amount,
        };
        // Grouped per billing entity so its metering events stay ordered.
        let group = format!("{}{}", subscription.subscription_id, subscription.customer_id);
        let dedup = format!("{}-{}", user.id, event_id);

        if queue::dispatch(self.dispatcher.as_ref(), QueueName::Meter, &event, &dedup, &group).await {
            info!(
                "Meter event queued for subscription {}",
                subscription.subscription_id
            );
        }
        Ok(())
    }
}
