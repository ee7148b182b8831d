use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Placeholder written for any field the scraper leaves out.
pub const PLACEHOLDER: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Done,
    Error,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        }
    }

    /// Unknown values read as `Pending`: the job has not been scraped successfully.
    pub fn parse(value: &str) -> Self {
        match value {
            "done" => JobStatus::Done,
            "error" => JobStatus::Error,
            _ => JobStatus::Pending,
        }
    }
}

/// One row per distinct job-posting URL, shared by every application that references it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub url: String,
    pub status: String,
    pub title: String,
    pub company_name: String,
    pub description: Option<String>,
    pub skills: Vec<String>,
    pub location: Option<String>,
    pub salary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRow {
    pub fn status(&self) -> JobStatus {
        JobStatus::parse(&self.status)
    }
}

/// Body of the job-scraper webhook. Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedJob {
    pub title: Option<String>,
    pub company_name: Option<String>,
    pub description: Option<String>,
    pub skills: Option<Vec<String>>,
    pub location: Option<String>,
    pub salary: Option<String>,
}

/// Scraped fields with placeholders substituted, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDetails {
    pub title: String,
    pub company_name: String,
    pub description: String,
    pub skills: Vec<String>,
    pub location: String,
    pub salary: String,
}

impl From<ScrapedJob> for JobDetails {
    fn from(scraped: ScrapedJob) -> Self {
        let or_placeholder = |v: Option<String>| {
            v.filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| PLACEHOLDER.to_string())
        };
        JobDetails {
            title: or_placeholder(scraped.title),
            company_name: or_placeholder(scraped.company_name),
            description: or_placeholder(scraped.description),
            skills: scraped.skills.unwrap_or_default(),
            location: or_placeholder(scraped.location),
            salary: or_placeholder(scraped.salary),
        }
    }
}
