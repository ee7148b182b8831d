use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub portfolio_url: Option<String>,
    pub linkedin_username: Option<String>,
    pub github_username: Option<String>,
    pub additional_instructions: Option<String>,
    pub linkedin_scraped_data: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Applicant data snapshotted into generation requests.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicantProfile {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub portfolio_url: Option<String>,
    pub linkedin_username: Option<String>,
    pub github_username: Option<String>,
    pub additional_instructions: Option<String>,
    pub linkedin_scraped_data: Option<Value>,
}

impl UserRow {
    pub fn applicant_profile(&self) -> ApplicantProfile {
        ApplicantProfile {
            id: self.id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            portfolio_url: self.portfolio_url.clone(),
            linkedin_username: self.linkedin_username.clone(),
            github_username: self.github_username.clone(),
            additional_instructions: self.additional_instructions.clone(),
            linkedin_scraped_data: self.linkedin_scraped_data.clone(),
        }
    }
}
