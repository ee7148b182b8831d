use std::sync::Arc;

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::billing::EntitlementPolicy;
use crate::errors::AppError;
use crate::queue::messages::LinkedinScrapeRequest;
use crate::queue::{self, MessageDispatcher, QueueName};
use crate::store::UserDirectory;
use crate::webhooks::callbacks::CallbackUrls;
use crate::webhooks::commands::LinkedinCommand;

/// Integrity value carried on the LinkedIn callback URL: hex SHA-256 of the stored password hash.
///
/// The callback endpoint has no other authentication; a changed password
/// invalidates every outstanding callback.
pub fn check_value(password_hash: &str) -> String {
    hex::encode(Sha256::digest(password_hash.as_bytes()))
}

/// Requests and stores scraped LinkedIn profiles.
#[derive(Clone)]
pub struct LinkedinProfiles {
    pub users: Arc<dyn UserDirectory>,
    pub dispatcher: Arc<dyn MessageDispatcher>,
    pub entitlement: Arc<dyn EntitlementPolicy>,
    pub callbacks: CallbackUrls,
}

impl LinkedinProfiles {
    pub async fn request_refresh(&self, user_id: Uuid) -> Result<(), AppError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let Some(username) = user.linkedin_username.as_deref().filter(|u| !u.trim().is_empty()) else {
            return Err(AppError::Validation(
                "You need to have a linkedin username to do this, head over to your account to add it"
                    .to_string(),
            ));
        };

        self.entitlement.ensure_entitled(&user).await?;

        let request = LinkedinScrapeRequest {
            linkedin_username: username,
            callback_url: self
                .callbacks
                .linkedin(user.id, &check_value(&user.password_hash)),
        };
        let key = format!("{}{username}", user.id);
        queue::dispatch(
            self.dispatcher.as_ref(),
            QueueName::LinkedinScraper,
            &request,
            &key,
            &key,
        )
        .await;

        info!("LinkedIn refresh requested for user {user_id}");
        Ok(())
    }

    /// Stores the payload only when the check value matches. Returns whether it was stored.
    pub async fn update_from_webhook(&self, command: LinkedinCommand) -> Result<bool, AppError> {
        let LinkedinCommand {
            user_id,
            check_value: received,
            payload,
        } = command;

        let Some(user) = self.users.find_by_id(user_id).await? else {
            warn!("LinkedIn data for unknown user {user_id}; ignoring");
            return Ok(false);
        };
        if received != check_value(&user.password_hash) {
            warn!("LinkedIn check value mismatch for user {user_id}; ignoring");
            return Ok(false);
        }

        self.users.store_linkedin_data(user_id, &payload).await?;
        debug!("Stored LinkedIn data for user {user_id}");
        Ok(true)
    }

    pub async fn scraped_data(&self, user_id: Uuid) -> Result<Option<Value>, AppError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        Ok(user.linkedin_scraped_data)
    }
}
