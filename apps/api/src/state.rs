use std::sync::Arc;

use crate::applications::orchestrator::Orchestrator;
use crate::storage::UrlSigner;
use crate::store::{ApplicationStore, JobStore, SubscriptionStore};
use crate::users::linkedin::LinkedinProfiles;

/// Shared application state injected into all route handlers via Axum extractors.
///
/// Collaborators are trait objects so tests can swap in in-memory implementations.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub linkedin: LinkedinProfiles,
    /// Read-side access for the user-facing listing and status endpoints.
    pub applications: Arc<dyn ApplicationStore>,
    pub jobs: Arc<dyn JobStore>,
    /// Written by the billing provider's subscription alerts.
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub signer: Arc<dyn UrlSigner>,
}
