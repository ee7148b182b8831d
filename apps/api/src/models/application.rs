use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::document::{DocumentKind, Draft};

/// Where the user is in their hiring process. Set by the user, not by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HiringStage {
    #[default]
    Applied,
    Interviewing,
    Rejected,
    Accepted,
}

impl HiringStage {
    pub fn as_str(self) -> &'static str {
        match self {
            HiringStage::Applied => "applied",
            HiringStage::Interviewing => "interviewing",
            HiringStage::Rejected => "rejected",
            HiringStage::Accepted => "accepted",
        }
    }
}

/// One row per (user, job posting) intent to apply.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApplicationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub job_id: Option<Uuid>,
    pub job_url: String,
    pub application_status: String,
    pub notes: Option<String>,
    pub generate_resume: bool,
    pub generate_cover_letter: bool,
    /// Set while a manual regeneration is in flight; suppresses usage billing.
    pub is_recreation: bool,
    pub job_scraping_started: bool,
    pub resume_started: bool,
    pub cover_letter_started: bool,
    pub resume_raw: Option<Value>,
    pub cover_letter_raw: Option<String>,
    /// Claimed before a render request is published, so at most one is in flight per draft set.
    pub render_dispatched: bool,
    pub resume_key: Option<String>,
    pub cover_letter_key: Option<String>,
    pub applied_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ApplicationRow {
    pub fn requires(&self, kind: DocumentKind) -> bool {
        match kind {
            DocumentKind::Resume => self.generate_resume,
            DocumentKind::CoverLetter => self.generate_cover_letter,
        }
    }

    pub fn started(&self, kind: DocumentKind) -> bool {
        match kind {
            DocumentKind::Resume => self.resume_started,
            DocumentKind::CoverLetter => self.cover_letter_started,
        }
    }

    pub fn has_draft(&self, kind: DocumentKind) -> bool {
        match kind {
            DocumentKind::Resume => self.resume_raw.is_some(),
            DocumentKind::CoverLetter => self.cover_letter_raw.is_some(),
        }
    }

    pub fn artifact_key(&self, kind: DocumentKind) -> Option<&str> {
        match kind {
            DocumentKind::Resume => self.resume_key.as_deref(),
            DocumentKind::CoverLetter => self.cover_letter_key.as_deref(),
        }
    }

    /// The draft to hand to the renderer: `None` when the document is not requested.
    pub fn render_input(&self, kind: DocumentKind) -> Option<Draft> {
        if !self.requires(kind) {
            return None;
        }
        match kind {
            DocumentKind::Resume => self.resume_raw.clone().map(Draft::Resume),
            DocumentKind::CoverLetter => self.cover_letter_raw.clone().map(Draft::CoverLetter),
        }
    }

    /// True once every requested draft is present.
    pub fn ready_for_render(&self) -> bool {
        DocumentKind::ALL
            .iter()
            .all(|&kind| !self.requires(kind) || self.has_draft(kind))
    }
}

/// Fields supplied when an application row is created.
#[derive(Debug, Clone)]
pub struct NewApplication {
    pub user_id: Uuid,
    pub job_id: Uuid,
    pub job_url: String,
    pub stage: HiringStage,
    pub notes: Option<String>,
    pub generate_resume: bool,
    pub generate_cover_letter: bool,
    pub applied_at: DateTime<Utc>,
}

/// User-editable fields. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationPatch {
    pub application_status: Option<HiringStage>,
    pub notes: Option<String>,
}
