use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::applications::orchestrator::CreateApplicationRequest;
use crate::applications::status::{aggregate, sign_download_urls, ApplicationProgress, DownloadUrls};
use crate::errors::AppError;
use crate::models::application::{ApplicationPatch, ApplicationRow, HiringStage};
use crate::models::document::DocumentKind;
use crate::models::job::JobRow;
use crate::state::AppState;
use crate::store::ListQuery;

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Deserialize)]
pub struct ListParams {
    pub user_id: Uuid,
    pub status: Option<HiringStage>,
    pub page: Option<i64>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedApplication {
    pub application_id: Uuid,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReprocessRequest {
    pub document_type: DocumentKind,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub title: String,
    pub company_name: String,
    pub location: Option<String>,
    pub url: String,
}

impl From<&JobRow> for JobSummary {
    fn from(job: &JobRow) -> Self {
        JobSummary {
            title: job.title.clone(),
            company_name: job.company_name.clone(),
            location: job.location.clone(),
            url: job.url.clone(),
        }
    }
}

/// An application as listed to its owner. Drafts are not exposed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSummary {
    pub id: Uuid,
    pub job_url: String,
    pub application_status: String,
    pub notes: Option<String>,
    pub generate_resume: bool,
    pub generate_cover_letter: bool,
    pub applied_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub job: Option<JobSummary>,
    /// Signed download URLs of the rendered documents.
    pub applied_with: DownloadUrls,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationPage {
    pub data: Vec<ApplicationSummary>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

/// Joins each row with its job and signs its artifact keys.
async fn summarize(state: &AppState, rows: Vec<ApplicationRow>) -> Result<Vec<ApplicationSummary>, AppError> {
    let job_ids: Vec<Uuid> = rows.iter().filter_map(|a| a.job_id).collect();
    let jobs: HashMap<Uuid, JobRow> = state
        .jobs
        .find_many(&job_ids)
        .await?
        .into_iter()
        .map(|job| (job.id, job))
        .collect();

    let mut summaries = Vec::with_capacity(rows.len());
    for row in rows {
        let mut applied_with = DownloadUrls {
            resume: row.resume_key.clone(),
            cover_letter: row.cover_letter_key.clone(),
        };
        sign_download_urls(state.signer.as_ref(), &mut applied_with).await?;

        summaries.push(ApplicationSummary {
            id: row.id,
            job: row.job_id.and_then(|id| jobs.get(&id)).map(JobSummary::from),
            job_url: row.job_url,
            application_status: row.application_status,
            notes: row.notes,
            generate_resume: row.generate_resume,
            generate_cover_letter: row.generate_cover_letter,
            applied_at: row.applied_at,
            created_at: row.created_at,
            applied_with,
        });
    }
    Ok(summaries)
}

fn list_query(params: &ListParams) -> Result<ListQuery, AppError> {
    let page = params.page.unwrap_or(1);
    let page_size = params.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    if page < 1 {
        return Err(AppError::invalid_field("page", "must be at least 1"));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(AppError::invalid_field(
            "pageSize",
            format!("must be between 1 and {MAX_PAGE_SIZE}"),
        ));
    }
    ListQuery::new(params.status, page, page_size)
        .ok_or_else(|| AppError::invalid_field("page", "is beyond the last possible page"))
}

/// POST /api/applications
pub async fn handle_create(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
    Json(req): Json<CreateApplicationRequest>,
) -> Result<(StatusCode, Json<CreatedApplication>), AppError> {
    let application = state.orchestrator.create(req, params.user_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedApplication {
            application_id: application.id,
        }),
    ))
}

/// GET /api/applications
pub async fn handle_list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ApplicationPage>, AppError> {
    let query = list_query(&params)?;
    let (rows, total) = state.applications.list_for_user(params.user_id, &query).await?;
    let data = summarize(&state, rows).await?;

    Ok(Json(ApplicationPage {
        data,
        total,
        page: query.page,
        page_size: query.page_size,
        total_pages: (total + query.page_size - 1) / query.page_size,
    }))
}

/// GET /api/applications/:id
pub async fn handle_get_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<ApplicationProgress>, AppError> {
    let application = state
        .applications
        .find_for_user(id, params.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Application {id} not found")))?;

    let job_status = match application.job_id {
        Some(job_id) => state.jobs.find_by_id(job_id).await?.map(|job| job.status()),
        None => None,
    };

    let mut progress = aggregate(&application, job_status);
    sign_download_urls(state.signer.as_ref(), &mut progress.download_urls).await?;
    Ok(Json(progress))
}

/// PATCH /api/applications/:id
pub async fn handle_update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
    Json(patch): Json<ApplicationPatch>,
) -> Result<Json<ApplicationSummary>, AppError> {
    let row = state
        .applications
        .update(id, params.user_id, &patch)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Application {id} not found")))?;

    let summary = summarize(&state, vec![row])
        .await?
        .pop()
        .ok_or_else(|| AppError::NotFound(format!("Application {id} not found")))?;
    Ok(Json(summary))
}

/// DELETE /api/applications/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<StatusCode, AppError> {
    state
        .applications
        .soft_delete(id, params.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Application {id} not found")))?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/applications/:id/reprocess
pub async fn handle_reprocess(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
    Json(req): Json<ReprocessRequest>,
) -> Result<StatusCode, AppError> {
    state
        .orchestrator
        .reprocess(id, params.user_id, req.document_type)
        .await?;
    Ok(StatusCode::ACCEPTED)
}
