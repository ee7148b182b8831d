pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::applications::handlers as applications;
use crate::state::AppState;
use crate::users::handlers as users;
use crate::webhooks::handlers as webhooks;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // User-facing API
        .route(
            "/api/applications",
            post(applications::handle_create).get(applications::handle_list),
        )
        .route(
            "/api/applications/:id",
            get(applications::handle_get_status)
                .patch(applications::handle_update)
                .delete(applications::handle_delete),
        )
        .route(
            "/api/applications/:id/reprocess",
            post(applications::handle_reprocess),
        )
        .route("/api/users/linkedin", get(users::handle_get_linkedin))
        .route(
            "/api/users/linkedin/refresh",
            post(users::handle_refresh_linkedin),
        )
        // Worker callbacks
        .route(
            "/api/_internal/job-scraper",
            post(webhooks::handle_job_scraper),
        )
        .route(
            "/api/_internal/resume-segments",
            post(webhooks::handle_resume_segments),
        )
        .route(
            "/api/_internal/cover-letter-segments",
            post(webhooks::handle_cover_letter_segments),
        )
        .route(
            "/api/_internal/pdf-processed",
            post(webhooks::handle_pdf_processed),
        )
        .route(
            "/api/_internal/users/:user_id/linkedin",
            post(webhooks::handle_linkedin),
        )
        // Billing provider
        .route(
            "/api/_internal/chargebee-subscription-alert",
            post(webhooks::handle_subscription_alert),
        )
        .with_state(state)
}
