use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::applications::handlers::UserIdQuery;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedinData {
    pub linkedin_scraped_data: Option<Value>,
}

/// GET /api/users/linkedin
pub async fn handle_get_linkedin(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<LinkedinData>, AppError> {
    let data = state.linkedin.scraped_data(params.user_id).await?;
    Ok(Json(LinkedinData {
        linkedin_scraped_data: data,
    }))
}

/// POST /api/users/linkedin/refresh
pub async fn handle_refresh_linkedin(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<StatusCode, AppError> {
    state.linkedin.request_refresh(params.user_id).await?;
    Ok(StatusCode::ACCEPTED)
}
