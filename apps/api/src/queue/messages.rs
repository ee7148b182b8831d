//! Payload contracts of the outbound queues.
//!
//! Field names are camelCase on the wire; the external workers depend on them.

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::models::job::JobRow;
use crate::models::user::ApplicantProfile;

/// `jobScraper`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeRequest<'a> {
    pub job_url: &'a str,
    pub callback_url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationJobDetails<'a> {
    pub company_name: &'a str,
    pub description: Option<&'a str>,
    pub location: Option<&'a str>,
    pub skills: &'a [String],
    pub title: &'a str,
}

impl<'a> From<&'a JobRow> for GenerationJobDetails<'a> {
    fn from(job: &'a JobRow) -> Self {
        GenerationJobDetails {
            company_name: &job.company_name,
            description: job.description.as_deref(),
            location: job.location.as_deref(),
            skills: &job.skills,
            title: &job.title,
        }
    }
}

/// `resumeCreator` / `coverLetterCreator`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest<'a> {
    pub job_details: GenerationJobDetails<'a>,
    pub applicant_details: ApplicantProfile,
    pub callback_url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderJobDetails<'a> {
    pub title: &'a str,
    pub company_name: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderApplicantDetails<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
}

/// `pdfProcessor`. Unrequested documents are sent as `null`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest<'a> {
    pub callback_url: String,
    pub job_details: RenderJobDetails<'a>,
    pub applicant_details: RenderApplicantDetails<'a>,
    /// Storage prefix the renderer writes into.
    pub path: String,
    pub resume: Option<Value>,
    pub cover_letter: Option<String>,
}

/// `meter`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterEvent<'a> {
    pub subscription_id: &'a str,
    pub customer_id: &'a str,
    pub item_price_id: &'a str,
    pub user_internal_id: Uuid,
    pub meter_amount: i32,
}

/// `sendEmail`
#[derive(Debug, Clone, Serialize)]
pub struct EmailMessage {
    pub to: String,
    #[serde(flatten)]
    pub kind: EmailKind,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "emailType", rename_all = "camelCase")]
pub enum EmailKind {
    #[serde(rename_all = "camelCase")]
    Templated {
        template: String,
        template_data: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        reply_to: Option<String>,
    },
    #[allow(dead_code)]
    Simple { subject: String, body: String },
}

/// `linkedinScraper`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedinScrapeRequest<'a> {
    pub linkedin_username: &'a str,
    pub callback_url: String,
}
