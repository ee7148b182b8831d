//! Read-side progress of an application, derived from its row on every read.
//!
//! Nothing here writes. `aggregate` is a pure function of the row and the job
//! status; signing the download links is the only I/O and happens afterwards.

use serde::Serialize;

use crate::errors::AppError;
use crate::models::application::ApplicationRow;
use crate::models::document::DocumentKind;
use crate::models::job::JobStatus;
use crate::storage::UrlSigner;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Processing,
    Done,
    Skipped,
}

impl StepStatus {
    fn settled(self) -> bool {
        matches!(self, StepStatus::Done | StepStatus::Skipped)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Enqueue,
    Processing,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Steps {
    pub scraping: StepStatus,
    pub resume: StepStatus,
    pub cover_letter: StepStatus,
    pub pdf: StepStatus,
}

impl Steps {
    fn all(&self) -> [StepStatus; 4] {
        [self.scraping, self.resume, self.cover_letter, self.pdf]
    }
}

/// Storage keys until signed, short-lived URLs afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadUrls {
    pub resume: Option<String>,
    pub cover_letter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationProgress {
    pub status: OverallStatus,
    pub steps: Steps,
    pub download_urls: DownloadUrls,
}

fn document_step(application: &ApplicationRow, kind: DocumentKind) -> StepStatus {
    if !application.requires(kind) {
        StepStatus::Skipped
    } else if application.has_draft(kind) {
        StepStatus::Done
    } else if application.started(kind) {
        StepStatus::Processing
    } else {
        StepStatus::Pending
    }
}

/// A document counts towards the PDF step once it is skipped, or drafted with a rendered artifact.
fn document_rendered(application: &ApplicationRow, kind: DocumentKind, step: StepStatus) -> bool {
    match step {
        StepStatus::Skipped => true,
        StepStatus::Done => application.artifact_key(kind).is_some(),
        _ => false,
    }
}

/// Computes step and overall status. `job_status` is `None` when the job row is missing.
pub fn aggregate(application: &ApplicationRow, job_status: Option<JobStatus>) -> ApplicationProgress {
    let scraping = if job_status == Some(JobStatus::Done) {
        StepStatus::Done
    } else if application.job_scraping_started {
        StepStatus::Processing
    } else {
        StepStatus::Pending
    };
    let resume = document_step(application, DocumentKind::Resume);
    let cover_letter = document_step(application, DocumentKind::CoverLetter);

    let rendered = document_rendered(application, DocumentKind::Resume, resume)
        && document_rendered(application, DocumentKind::CoverLetter, cover_letter);
    let pdf = if rendered {
        StepStatus::Done
    } else {
        StepStatus::Pending
    };

    let download_urls = if rendered {
        DownloadUrls {
            resume: application.resume_key.clone(),
            cover_letter: application.cover_letter_key.clone(),
        }
    } else {
        DownloadUrls::default()
    };

    let steps = Steps {
        scraping,
        resume,
        cover_letter,
        pdf,
    };
    let status = if steps.all().iter().all(|s| s.settled()) {
        OverallStatus::Finished
    } else if steps.all().contains(&StepStatus::Processing) {
        OverallStatus::Processing
    } else {
        OverallStatus::Enqueue
    };

    ApplicationProgress {
        status,
        steps,
        download_urls,
    }
}

/// Replaces every storage key in `urls` with a signed download URL.
pub async fn sign_download_urls(signer: &dyn UrlSigner, urls: &mut DownloadUrls) -> Result<(), AppError> {
    for slot in [&mut urls.resume, &mut urls.cover_letter] {
        if let Some(key) = slot.clone() {
            *slot = Some(signer.sign_download(&key).await?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{make_application, FakeSigner};
    use serde_json::json;

    #[test]
    fn test_fresh_application_is_enqueued() {
        let app = make_application(true, false);
        let progress = aggregate(&app, Some(JobStatus::Pending));

        assert_eq!(progress.status, OverallStatus::Enqueue);
        assert_eq!(progress.steps.scraping, StepStatus::Pending);
        assert_eq!(progress.steps.resume, StepStatus::Pending);
        assert_eq!(progress.steps.cover_letter, StepStatus::Skipped);
        assert_eq!(progress.steps.pdf, StepStatus::Pending);
    }

    #[test]
    fn test_started_steps_report_processing() {
        let mut app = make_application(true, true);
        app.job_scraping_started = true;
        let progress = aggregate(&app, Some(JobStatus::Pending));
        assert_eq!(progress.steps.scraping, StepStatus::Processing);
        assert_eq!(progress.status, OverallStatus::Processing);

        app.resume_started = true;
        let progress = aggregate(&app, Some(JobStatus::Done));
        assert_eq!(progress.steps.scraping, StepStatus::Done);
        assert_eq!(progress.steps.resume, StepStatus::Processing);
        assert_eq!(progress.steps.cover_letter, StepStatus::Pending);
    }

    #[test]
    fn test_draft_without_artifact_leaves_pdf_pending() {
        let mut app = make_application(true, false);
        app.resume_raw = Some(json!({"summary": "x"}));
        let progress = aggregate(&app, Some(JobStatus::Done));

        assert_eq!(progress.steps.resume, StepStatus::Done);
        assert_eq!(progress.steps.pdf, StepStatus::Pending);
        assert_eq!(progress.status, OverallStatus::Enqueue);
        assert_eq!(progress.download_urls, DownloadUrls::default());
    }

    #[test]
    fn test_finished_exposes_artifact_keys() {
        let mut app = make_application(true, false);
        app.resume_raw = Some(json!({"summary": "x"}));
        app.resume_key = Some("key1".to_string());
        let progress = aggregate(&app, Some(JobStatus::Done));

        assert_eq!(progress.status, OverallStatus::Finished);
        assert_eq!(progress.steps.pdf, StepStatus::Done);
        assert_eq!(progress.download_urls.resume.as_deref(), Some("key1"));
        assert!(progress.download_urls.cover_letter.is_none());
    }

    #[test]
    fn test_missing_job_reads_as_not_scraped() {
        let app = make_application(false, false);
        let progress = aggregate(&app, None);
        assert_eq!(progress.steps.scraping, StepStatus::Pending);
        assert_eq!(progress.status, OverallStatus::Enqueue);
    }

    #[test]
    fn test_aggregate_is_repeatable() {
        let mut app = make_application(true, true);
        app.job_scraping_started = true;
        app.cover_letter_started = true;
        app.resume_raw = Some(json!({"summary": "x"}));

        let first = serde_json::to_vec(&aggregate(&app, Some(JobStatus::Done))).unwrap();
        let second = serde_json::to_vec(&aggregate(&app, Some(JobStatus::Done))).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_wire_shape() {
        let app = make_application(true, false);
        let value = serde_json::to_value(aggregate(&app, Some(JobStatus::Pending))).unwrap();
        assert_eq!(value["status"], "enqueue");
        assert_eq!(value["steps"]["coverLetter"], "skipped");
        assert!(value["downloadUrls"]["resume"].is_null());
    }

    #[tokio::test]
    async fn test_sign_download_urls_replaces_keys() {
        let mut urls = DownloadUrls {
            resume: Some("key1".to_string()),
            cover_letter: None,
        };
        sign_download_urls(&FakeSigner, &mut urls).await.unwrap();
        assert_eq!(urls.resume.as_deref(), Some("https://signed.example.com/key1"));
        assert!(urls.cover_letter.is_none());
    }
}
