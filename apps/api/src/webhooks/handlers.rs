//! Internal webhook handlers. Malformed requests and unknown records are
//! logged and acknowledged with 200; workers cannot act on an error.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::warn;

use crate::billing;
use crate::errors::AppError;
use crate::models::document::DocumentKind;
use crate::state::AppState;
use crate::webhooks::commands::{
    ApplicationQuery, DocumentCommand, JobScraperCommand, JobScraperQuery, LinkedinCommand,
    LinkedinQuery, RenderCommand, SubscriptionCommand,
};

/// POST /api/_internal/job-scraper
pub async fn handle_job_scraper(
    State(state): State<AppState>,
    Query(query): Query<JobScraperQuery>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    match JobScraperCommand::parse(query, &body) {
        Some(JobScraperCommand::Started { job_url }) => {
            state.orchestrator.scraping_started(&job_url).await?;
        }
        Some(JobScraperCommand::Scraped { job_url, job }) => {
            state.orchestrator.job_scraped(&job_url, job).await?;
        }
        None => warn!("Malformed job-scraper callback; ignoring"),
    }
    Ok(StatusCode::OK)
}

async fn handle_document(
    state: AppState,
    kind: DocumentKind,
    query: ApplicationQuery,
    body: &[u8],
) -> Result<StatusCode, AppError> {
    match DocumentCommand::parse(kind, query, body) {
        Some(DocumentCommand::Started { application_id, kind }) => {
            state.orchestrator.document_started(application_id, kind).await?;
        }
        Some(DocumentCommand::Delivered { application_id, draft }) => {
            state.orchestrator.store_draft(application_id, draft).await?;
        }
        None => warn!("Malformed {kind} callback; ignoring"),
    }
    Ok(StatusCode::OK)
}

/// POST /api/_internal/resume-segments
pub async fn handle_resume_segments(
    State(state): State<AppState>,
    Query(query): Query<ApplicationQuery>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    handle_document(state, DocumentKind::Resume, query, &body).await
}

/// POST /api/_internal/cover-letter-segments
pub async fn handle_cover_letter_segments(
    State(state): State<AppState>,
    Query(query): Query<ApplicationQuery>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    handle_document(state, DocumentKind::CoverLetter, query, &body).await
}

/// POST /api/_internal/pdf-processed
pub async fn handle_pdf_processed(
    State(state): State<AppState>,
    Query(query): Query<ApplicationQuery>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    match RenderCommand::parse(query, &body) {
        Some(command) => {
            state
                .orchestrator
                .store_document_links(command.application_id, command.documents)
                .await?;
        }
        None => warn!("Malformed pdf-processed callback; ignoring"),
    }
    Ok(StatusCode::OK)
}

/// POST /api/_internal/users/:user_id/linkedin
pub async fn handle_linkedin(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<LinkedinQuery>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    match LinkedinCommand::parse(&user_id, query, &body) {
        Some(command) => {
            state.linkedin.update_from_webhook(command).await?;
        }
        None => warn!("Malformed LinkedIn callback for user {user_id}; ignoring"),
    }
    Ok(StatusCode::OK)
}

/// POST /api/_internal/chargebee-subscription-alert
pub async fn handle_subscription_alert(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    match SubscriptionCommand::parse(&body) {
        Some(command) => {
            billing::apply_subscription_event(state.subscriptions.as_ref(), command).await?;
        }
        None => warn!("Malformed subscription alert; ignoring"),
    }
    Ok(StatusCode::OK)
}
