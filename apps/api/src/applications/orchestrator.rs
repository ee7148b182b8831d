use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::billing::{EntitlementPolicy, UsageMeter};
use crate::errors::AppError;
use crate::jobs::lifecycle;
use crate::models::application::{ApplicationRow, HiringStage, NewApplication};
use crate::models::document::{DocumentKind, Draft, RenderedDocuments};
use crate::models::job::{JobRow, JobStatus, ScrapedJob};
use crate::models::user::UserRow;
use crate::queue::messages::{
    EmailKind, EmailMessage, GenerationJobDetails, GenerationRequest, RenderApplicantDetails,
    RenderJobDetails, RenderRequest,
};
use crate::queue::{self, MessageDispatcher, QueueName};
use crate::store::{ApplicationStore, JobStore, UserDirectory};
use crate::webhooks::callbacks::CallbackUrls;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateApplicationRequest {
    pub job_url: String,
    #[serde(default)]
    pub generate_resume: bool,
    #[serde(default)]
    pub generate_cover_letter: bool,
    pub notes: Option<String>,
    pub application_status: Option<HiringStage>,
    pub applied_at: Option<DateTime<Utc>>,
}

/// Drives an application from creation to rendered documents.
///
/// Nothing here waits on a worker: each method handles one step and hands the
/// next one to a queue. Webhook-driven methods log and return `Ok` when the
/// record they refer to is gone; user-driven methods return `NotFound`.
#[derive(Clone)]
pub struct Orchestrator {
    pub applications: Arc<dyn ApplicationStore>,
    pub jobs: Arc<dyn JobStore>,
    pub users: Arc<dyn UserDirectory>,
    pub dispatcher: Arc<dyn MessageDispatcher>,
    pub entitlement: Arc<dyn EntitlementPolicy>,
    pub meter: Arc<dyn UsageMeter>,
    pub callbacks: CallbackUrls,
    /// Email template sent once documents are rendered; `None` disables the email.
    pub documents_ready_template: Option<String>,
}

impl Orchestrator {
    /// Creates an application and makes sure its job is (or will be) scraped.
    ///
    /// An absent or errored job gets a scrape request; a pending one is left
    /// alone since the scrape callback fans out to every application on the URL;
    /// a done one triggers generation for this application only.
    pub async fn create(
        &self,
        request: CreateApplicationRequest,
        user_id: Uuid,
    ) -> Result<ApplicationRow, AppError> {
        let job_url = validate_job_url(&request.job_url)?;
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))?;

        self.entitlement.ensure_entitled(&user).await?;

        let job = match self.jobs.find_by_url(&job_url).await? {
            Some(job) if job.status() != JobStatus::Error => job,
            _ => {
                lifecycle::init_job(
                    self.jobs.as_ref(),
                    self.dispatcher.as_ref(),
                    &self.callbacks,
                    &job_url,
                )
                .await?
            }
        };

        let application = self
            .applications
            .insert(NewApplication {
                user_id,
                job_id: job.id,
                job_url,
                stage: request.application_status.unwrap_or_default(),
                notes: request.notes,
                generate_resume: request.generate_resume,
                generate_cover_letter: request.generate_cover_letter,
                applied_at: request.applied_at.unwrap_or_else(Utc::now),
            })
            .await?;

        if job.status() == JobStatus::Done {
            self.dispatch_generation(&application, &job, &user).await;
        }

        info!(
            "Application {} created for job {} ({})",
            application.id,
            job.id,
            job.status().as_str()
        );
        Ok(application)
    }

    /// Fans generation out to every live application on `url`, one request per
    /// requested document. Returns the number of dispatch attempts.
    pub async fn start_processing_by_url(&self, url: &str, job: &JobRow) -> Result<usize, AppError> {
        let applications = self.applications.find_by_job_url(url).await?;
        let mut applicants: HashMap<Uuid, Option<UserRow>> = HashMap::new();
        let mut attempts = 0;

        for application in &applications {
            if !DocumentKind::ALL.iter().any(|&kind| application.requires(kind)) {
                continue;
            }
            if !applicants.contains_key(&application.user_id) {
                let user = self.users.find_by_id(application.user_id).await?;
                applicants.insert(application.user_id, user);
            }
            let Some(user) = applicants.get(&application.user_id).and_then(Option::as_ref) else {
                warn!(
                    "Owner {} of application {} not found; skipping generation",
                    application.user_id, application.id
                );
                continue;
            };
            attempts += self.dispatch_generation(application, job, user).await;
        }

        Ok(attempts)
    }

    /// Scrape webhook: stores the result and fans out generation.
    pub async fn job_scraped(&self, url: &str, scraped: ScrapedJob) -> Result<(), AppError> {
        let Some(job) = lifecycle::update_from_webhook(self.jobs.as_ref(), url, scraped).await? else {
            return Ok(());
        };
        let attempts = self.start_processing_by_url(url, &job).await?;
        info!("Job {} fanned out {attempts} generation request(s)", job.id);
        Ok(())
    }

    /// Marks scraping as started on every application sharing the URL.
    pub async fn scraping_started(&self, url: &str) -> Result<(), AppError> {
        let touched = self.applications.mark_scraping_started(url).await?;
        debug!("Scraping started for {url} ({touched} application(s))");
        Ok(())
    }

    pub async fn document_started(&self, application_id: Uuid, kind: DocumentKind) -> Result<(), AppError> {
        if !self.applications.mark_started(application_id, kind).await? {
            warn!("{kind} started for unknown application {application_id}; ignoring");
        }
        Ok(())
    }

    /// Generation webhook: stores a draft, bills it, then tries to render.
    ///
    /// The draft a manual reprocess asked for fills the slot `reprocess`
    /// cleared; it is not billed and the recreation flag is cleared instead.
    /// Any other draft arriving meanwhile is handled as usual.
    pub async fn store_draft(&self, application_id: Uuid, draft: Draft) -> Result<(), AppError> {
        let kind = draft.kind();
        let regenerated = match self.applications.find_by_id(application_id).await? {
            Some(current) if current.deleted_at.is_none() => {
                current.is_recreation && !current.has_draft(kind)
            }
            _ => {
                warn!("{kind} draft for unknown application {application_id}; ignoring");
                return Ok(());
            }
        };
        let Some(application) = self.applications.store_draft(application_id, &draft).await? else {
            warn!("{kind} draft for unknown application {application_id}; ignoring");
            return Ok(());
        };

        if regenerated {
            self.applications.clear_recreation(application_id).await?;
            info!("Stored regenerated {kind} for application {application_id}; not billed");
        } else {
            self.bill_generation(&application).await;
            info!("Stored {kind} draft for application {application_id}");
        }

        self.create_pdf(application_id).await?;
        Ok(())
    }

    /// Publishes a render request once every requested draft is present.
    ///
    /// Claims the application's render slot first, so concurrent or repeated
    /// calls publish at most one request per draft set. Returns whether this
    /// call published.
    pub async fn create_pdf(&self, application_id: Uuid) -> Result<bool, AppError> {
        let Some(application) = self
            .applications
            .find_by_id(application_id)
            .await?
            .filter(|a| a.deleted_at.is_none())
        else {
            warn!("Render requested for unknown application {application_id}; ignoring");
            return Ok(false);
        };
        if !application.ready_for_render() {
            debug!("Application {application_id} still waiting on drafts");
            return Ok(false);
        }

        let job = match application.job_id {
            Some(job_id) => self.jobs.find_by_id(job_id).await?,
            None => None,
        };
        let Some(job) = job else {
            warn!("Application {application_id} has no job; cannot render");
            return Ok(false);
        };
        let Some(user) = self.users.find_by_id(application.user_id).await? else {
            warn!("Owner of application {application_id} not found; cannot render");
            return Ok(false);
        };

        if !self.applications.claim_render(application_id).await? {
            debug!("Render already dispatched for application {application_id}");
            return Ok(false);
        }

        let resume = match application.render_input(DocumentKind::Resume) {
            Some(Draft::Resume(segments)) => Some(segments),
            _ => None,
        };
        let cover_letter = match application.render_input(DocumentKind::CoverLetter) {
            Some(Draft::CoverLetter(content)) => Some(content),
            _ => None,
        };
        let dedup = format!(
            "{application_id}-{}",
            draft_digest(resume.as_ref(), cover_letter.as_deref())
        );

        let request = RenderRequest {
            callback_url: self.callbacks.pdf_processed(application_id),
            job_details: RenderJobDetails {
                title: &job.title,
                company_name: &job.company_name,
            },
            applicant_details: RenderApplicantDetails {
                first_name: &user.first_name,
                last_name: &user.last_name,
                email: &user.email,
            },
            path: format!("generated/users/{}/applications/{application_id}", user.id),
            resume,
            cover_letter,
        };

        let group = application_id.to_string();
        if !queue::dispatch(
            self.dispatcher.as_ref(),
            QueueName::PdfProcessor,
            &request,
            &dedup,
            &group,
        )
        .await
        {
            // Let a redelivered webhook try again.
            self.applications.release_render(application_id).await?;
            return Ok(false);
        }

        info!("Render dispatched for application {application_id}");
        Ok(true)
    }

    /// Render webhook: stores the artifact keys and notifies the applicant.
    pub async fn store_document_links(
        &self,
        application_id: Uuid,
        documents: RenderedDocuments,
    ) -> Result<(), AppError> {
        let Some(application) = self
            .applications
            .store_artifacts(application_id, &documents)
            .await?
        else {
            warn!("Rendered documents for unknown application {application_id}; ignoring");
            return Ok(());
        };
        info!("Stored rendered documents for application {application_id}");

        let Some(template) = &self.documents_ready_template else {
            return Ok(());
        };
        let Some(user) = self.users.find_by_id(application.user_id).await? else {
            warn!("Owner of application {application_id} not found; skipping email");
            return Ok(());
        };
        let job = match application.job_id {
            Some(job_id) => self.jobs.find_by_id(job_id).await?,
            None => None,
        };

        let message = EmailMessage {
            to: user.email.clone(),
            kind: EmailKind::Templated {
                template: template.clone(),
                template_data: json!({
                    "firstName": user.first_name,
                    "applicationId": application_id,
                    "jobTitle": job.as_ref().map(|j| j.title.as_str()),
                    "companyName": job.as_ref().map(|j| j.company_name.as_str()),
                }),
                reply_to: None,
            },
        };
        queue::dispatch(
            self.dispatcher.as_ref(),
            QueueName::SendEmail,
            &message,
            &format!("{application_id}-documents-ready"),
            &application_id.to_string(),
        )
        .await;
        Ok(())
    }

    /// Regenerates one document of an existing application without billing it.
    pub async fn reprocess(
        &self,
        application_id: Uuid,
        user_id: Uuid,
        kind: DocumentKind,
    ) -> Result<(), AppError> {
        let application = self
            .applications
            .find_for_user(application_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Application not found".to_string()))?;

        let job = match application.job_id {
            Some(job_id) => self.jobs.find_by_id(job_id).await?,
            None => None,
        }
        .ok_or_else(|| AppError::NotFound("Job not found".to_string()))?;
        if job.status() != JobStatus::Done {
            return Err(AppError::Validation(
                "The job posting has not been scraped yet".to_string(),
            ));
        }

        let user = self
            .users
            .find_by_id(application.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        self.applications
            .begin_recreation(application_id, kind)
            .await?
            .ok_or_else(|| AppError::NotFound("Application not found".to_string()))?;

        // A fresh key per request: a reprocess must never be deduplicated away.
        let dedup = format!("{application_id}-{kind}-{}", Utc::now().timestamp_millis());
        if !self
            .dispatch_document(application_id, kind, &job, &user, &dedup)
            .await
        {
            // Nothing is coming back: put the previous draft, flags and claim back.
            self.applications.abandon_recreation(&application, kind).await?;
            warn!("Reprocess of {kind} for application {application_id} was not dispatched");
            return Ok(());
        }

        info!("Reprocessing {kind} for application {application_id}");
        Ok(())
    }

    /// One generation request per document the application asks for.
    async fn dispatch_generation(&self, application: &ApplicationRow, job: &JobRow, user: &UserRow) -> usize {
        let mut attempts = 0;
        for kind in DocumentKind::ALL {
            if application.requires(kind) {
                let dedup = format!("{}-{kind}", application.id);
                self.dispatch_document(application.id, kind, job, user, &dedup)
                    .await;
                attempts += 1;
            }
        }
        attempts
    }

    async fn dispatch_document(
        &self,
        application_id: Uuid,
        kind: DocumentKind,
        job: &JobRow,
        user: &UserRow,
        dedup: &str,
    ) -> bool {
        let request = GenerationRequest {
            job_details: GenerationJobDetails::from(job),
            applicant_details: user.applicant_profile(),
            callback_url: self.callbacks.document(kind, application_id),
        };
        queue::dispatch(
            self.dispatcher.as_ref(),
            kind.generator_queue(),
            &request,
            dedup,
            &application_id.to_string(),
        )
        .await
    }

    /// Metering failures never block rendering.
    async fn bill_generation(&self, application: &ApplicationRow) {
        let user = match self.users.find_by_id(application.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!("Owner of application {} not found; usage not recorded", application.id);
                return;
            }
            Err(e) => {
                error!("Failed to load owner of application {}: {e}", application.id);
                return;
            }
        };
        if let Err(e) = self.meter.record_usage(&user, 1).await {
            error!("Failed to record usage for user {}: {e}", user.id);
        }
    }
}

/// Trims the URL and requires an absolute http(s) URL.
fn validate_job_url(raw: &str) -> Result<String, AppError> {
    let trimmed = raw.trim();
    match Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {
            Ok(trimmed.to_string())
        }
        _ => Err(AppError::invalid_field(
            "jobUrl",
            "must be an absolute http(s) URL",
        )),
    }
}

/// Hex SHA-256 over the drafts being rendered.
fn draft_digest(resume: Option<&Value>, cover_letter: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    if let Some(resume) = resume {
        hasher.update(resume.to_string().as_bytes());
    }
    hasher.update([0u8]);
    if let Some(cover_letter) = cover_letter {
        hasher.update(cover_letter.as_bytes());
    }
    hex::encode(hasher.finalize())
}
