//! In-memory stand-ins for the stores, the queue transport and the billing
//! policies, so the pipeline can be exercised without Postgres or SQS.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::applications::orchestrator::Orchestrator;
use crate::billing::{EntitlementPolicy, UsageMeter};
use crate::errors::AppError;
use crate::models::application::{ApplicationPatch, ApplicationRow, NewApplication};
use crate::models::document::{DocumentKind, Draft, RenderedDocuments};
use crate::models::job::{JobDetails, JobRow, JobStatus};
use crate::models::subscription::{NewSubscription, SubscriptionRow, SubscriptionStatus};
use crate::models::user::UserRow;
use crate::queue::{DispatchError, MessageDispatcher, OutboundMessage, QueueName};
use crate::state::AppState;
use crate::storage::UrlSigner;
use crate::store::{ApplicationStore, JobStore, ListQuery, SubscriptionStore, UserDirectory};
use crate::users::linkedin::LinkedinProfiles;
use crate::webhooks::callbacks::CallbackUrls;

pub const BASE_URL: &str = "http://localhost:3000";

pub fn make_application(resume: bool, cover_letter: bool) -> ApplicationRow {
    let now = Utc::now();
    ApplicationRow {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        job_id: Some(Uuid::new_v4()),
        job_url: "https://jobs.example.com/42".to_string(),
        application_status: "applied".to_string(),
        notes: None,
        generate_resume: resume,
        generate_cover_letter: cover_letter,
        is_recreation: false,
        job_scraping_started: false,
        resume_started: false,
        cover_letter_started: false,
        resume_raw: None,
        cover_letter_raw: None,
        render_dispatched: false,
        resume_key: None,
        cover_letter_key: None,
        applied_at: now,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }
}

pub fn make_user(email: &str) -> UserRow {
    let now = Utc::now();
    UserRow {
        id: Uuid::new_v4(),
        email: email.to_string(),
        password_hash: format!("$argon2id$hash-of-{email}"),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        phone: None,
        portfolio_url: None,
        linkedin_username: Some("ada-lovelace".to_string()),
        github_username: None,
        additional_instructions: None,
        linkedin_scraped_data: None,
        created_at: now,
        updated_at: now,
    }
}

#[derive(Default)]
struct Tables {
    jobs: Vec<JobRow>,
    applications: Vec<ApplicationRow>,
    users: Vec<UserRow>,
    subscriptions: Vec<SubscriptionRow>,
}

/// Implements every store trait over one mutex, so each call is atomic like a single-row write.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    fn with<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> R {
        let mut tables = self.tables.lock().unwrap();
        f(&mut tables)
    }

    fn update_application<R>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut ApplicationRow) -> R,
    ) -> Option<R> {
        self.with(|t| {
            t.applications.iter_mut().find(|a| a.id == id).map(|a| {
                a.updated_at = Utc::now();
                f(a)
            })
        })
    }

    /// Like `update_application`, but a soft-deleted row counts as absent.
    fn update_live_application<R>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut ApplicationRow) -> R,
    ) -> Option<R> {
        self.with(|t| {
            t.applications
                .iter_mut()
                .find(|a| a.id == id && a.deleted_at.is_none())
                .map(|a| {
                    a.updated_at = Utc::now();
                    f(a)
                })
        })
    }

    pub fn seed_user(&self, email: &str) -> UserRow {
        let user = make_user(email);
        self.with(|t| t.users.push(user.clone()));
        user
    }

    pub fn job_count(&self) -> usize {
        self.with(|t| t.jobs.len())
    }

    pub fn job(&self, url: &str) -> Option<JobRow> {
        self.with(|t| t.jobs.iter().find(|j| j.url == url).cloned())
    }

    pub fn set_job_status(&self, url: &str, status: JobStatus) {
        self.with(|t| {
            if let Some(job) = t.jobs.iter_mut().find(|j| j.url == url) {
                job.status = status.as_str().to_string();
            }
        });
    }

    pub fn application(&self, id: Uuid) -> ApplicationRow {
        self.with(|t| t.applications.iter().find(|a| a.id == id).cloned())
            .unwrap_or_else(|| panic!("application {id} not seeded"))
    }

    pub fn user(&self, id: Uuid) -> UserRow {
        self.with(|t| t.users.iter().find(|u| u.id == id).cloned())
            .unwrap_or_else(|| panic!("user {id} not seeded"))
    }

    pub fn clear_linkedin_username(&self, id: Uuid) {
        self.with(|t| {
            if let Some(user) = t.users.iter_mut().find(|u| u.id == id) {
                user.linkedin_username = None;
            }
        });
    }

    pub fn subscription_count(&self) -> usize {
        self.with(|t| t.subscriptions.len())
    }

    pub fn subscription(&self, subscription_id: &str) -> Option<SubscriptionRow> {
        self.with(|t| {
            t.subscriptions
                .iter()
                .find(|s| s.subscription_id == subscription_id)
                .cloned()
        })
    }

    /// Writes a draft directly, bypassing the orchestrator.
    pub fn put_draft(&self, id: Uuid, draft: Draft) {
        self.update_application(id, |a| apply_draft(a, &draft));
    }
}

fn apply_draft(application: &mut ApplicationRow, draft: &Draft) {
    match draft {
        Draft::Resume(segments) => application.resume_raw = Some(segments.clone()),
        Draft::CoverLetter(content) => application.cover_letter_raw = Some(content.clone()),
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn find_by_url(&self, url: &str) -> Result<Option<JobRow>, AppError> {
        Ok(self.job(url))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<JobRow>, AppError> {
        Ok(self.with(|t| t.jobs.iter().find(|j| j.id == id).cloned()))
    }

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<JobRow>, AppError> {
        Ok(self.with(|t| {
            t.jobs
                .iter()
                .filter(|j| ids.contains(&j.id))
                .cloned()
                .collect()
        }))
    }

    async fn upsert_pending(&self, url: &str) -> Result<JobRow, AppError> {
        Ok(self.with(|t| {
            if let Some(job) = t.jobs.iter_mut().find(|j| j.url == url) {
                job.status = JobStatus::Pending.as_str().to_string();
                job.updated_at = Utc::now();
                return job.clone();
            }
            let now = Utc::now();
            let job = JobRow {
                id: Uuid::new_v4(),
                url: url.to_string(),
                status: JobStatus::Pending.as_str().to_string(),
                title: "---".to_string(),
                company_name: "---".to_string(),
                description: None,
                skills: Vec::new(),
                location: None,
                salary: None,
                created_at: now,
                updated_at: now,
            };
            t.jobs.push(job.clone());
            job
        }))
    }

    async fn mark_scraped(&self, url: &str, details: &JobDetails) -> Result<Option<JobRow>, AppError> {
        Ok(self.with(|t| {
            t.jobs.iter_mut().find(|j| j.url == url).map(|job| {
                job.title = details.title.clone();
                job.company_name = details.company_name.clone();
                job.description = Some(details.description.clone());
                job.skills = details.skills.clone();
                job.location = Some(details.location.clone());
                job.salary = Some(details.salary.clone());
                job.status = JobStatus::Done.as_str().to_string();
                job.updated_at = Utc::now();
                job.clone()
            })
        }))
    }
}

#[async_trait]
impl ApplicationStore for MemoryStore {
    async fn insert(&self, new: NewApplication) -> Result<ApplicationRow, AppError> {
        let mut row = make_application(new.generate_resume, new.generate_cover_letter);
        row.user_id = new.user_id;
        row.job_id = Some(new.job_id);
        row.job_url = new.job_url;
        row.application_status = new.stage.as_str().to_string();
        row.notes = new.notes;
        row.applied_at = new.applied_at;
        self.with(|t| t.applications.push(row.clone()));
        Ok(row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ApplicationRow>, AppError> {
        Ok(self.with(|t| t.applications.iter().find(|a| a.id == id).cloned()))
    }

    async fn find_for_user(&self, id: Uuid, user_id: Uuid) -> Result<Option<ApplicationRow>, AppError> {
        Ok(self.with(|t| {
            t.applications
                .iter()
                .find(|a| a.id == id && a.user_id == user_id && a.deleted_at.is_none())
                .cloned()
        }))
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        query: &ListQuery,
    ) -> Result<(Vec<ApplicationRow>, i64), AppError> {
        Ok(self.with(|t| {
            let mut matching: Vec<ApplicationRow> = t
                .applications
                .iter()
                .filter(|a| a.user_id == user_id && a.deleted_at.is_none())
                .filter(|a| {
                    query
                        .stage
                        .map_or(true, |stage| a.application_status == stage.as_str())
                })
                .cloned()
                .collect();
            // Insertion order stands in for created_at.
            matching.reverse();
            let total = matching.len() as i64;
            let page = matching
                .into_iter()
                .skip(query.offset() as usize)
                .take(query.page_size as usize)
                .collect();
            (page, total)
        }))
    }

    async fn find_by_job_url(&self, url: &str) -> Result<Vec<ApplicationRow>, AppError> {
        Ok(self.with(|t| {
            t.applications
                .iter()
                .filter(|a| a.job_url == url && a.deleted_at.is_none())
                .cloned()
                .collect()
        }))
    }

    async fn mark_scraping_started(&self, url: &str) -> Result<u64, AppError> {
        Ok(self.with(|t| {
            let mut touched = 0;
            for a in t
                .applications
                .iter_mut()
                .filter(|a| a.job_url == url && a.deleted_at.is_none())
            {
                a.job_scraping_started = true;
                touched += 1;
            }
            touched
        }))
    }

    async fn mark_started(&self, id: Uuid, kind: DocumentKind) -> Result<bool, AppError> {
        Ok(self
            .update_live_application(id, |a| match kind {
                DocumentKind::Resume => a.resume_started = true,
                DocumentKind::CoverLetter => a.cover_letter_started = true,
            })
            .is_some())
    }

    async fn store_draft(&self, id: Uuid, draft: &Draft) -> Result<Option<ApplicationRow>, AppError> {
        Ok(self.update_live_application(id, |a| {
            apply_draft(a, draft);
            a.clone()
        }))
    }

    async fn clear_recreation(&self, id: Uuid) -> Result<(), AppError> {
        self.update_application(id, |a| a.is_recreation = false);
        Ok(())
    }

    async fn begin_recreation(&self, id: Uuid, kind: DocumentKind) -> Result<Option<ApplicationRow>, AppError> {
        Ok(self.update_live_application(id, |a| {
            a.is_recreation = true;
            a.render_dispatched = false;
            match kind {
                DocumentKind::Resume => {
                    a.generate_resume = true;
                    a.resume_raw = None;
                }
                DocumentKind::CoverLetter => {
                    a.generate_cover_letter = true;
                    a.cover_letter_raw = None;
                }
            }
            a.clone()
        }))
    }

    async fn abandon_recreation(&self, previous: &ApplicationRow, kind: DocumentKind) -> Result<(), AppError> {
        self.update_application(previous.id, |a| {
            a.is_recreation = false;
            a.render_dispatched = previous.render_dispatched;
            match kind {
                DocumentKind::Resume => {
                    a.generate_resume = previous.generate_resume;
                    a.resume_raw = previous.resume_raw.clone();
                }
                DocumentKind::CoverLetter => {
                    a.generate_cover_letter = previous.generate_cover_letter;
                    a.cover_letter_raw = previous.cover_letter_raw.clone();
                }
            }
        });
        Ok(())
    }

    async fn claim_render(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self
            .update_application(id, |a| {
                let won = !a.render_dispatched;
                a.render_dispatched = true;
                won
            })
            .unwrap_or(false))
    }

    async fn release_render(&self, id: Uuid) -> Result<(), AppError> {
        self.update_application(id, |a| a.render_dispatched = false);
        Ok(())
    }

    async fn store_artifacts(
        &self,
        id: Uuid,
        documents: &RenderedDocuments,
    ) -> Result<Option<ApplicationRow>, AppError> {
        Ok(self.update_live_application(id, |a| {
            a.resume_key = documents.resume_pdf.clone();
            a.cover_letter_key = documents.cover_letter_pdf.clone();
            a.clone()
        }))
    }

    async fn update(
        &self,
        id: Uuid,
        user_id: Uuid,
        patch: &ApplicationPatch,
    ) -> Result<Option<ApplicationRow>, AppError> {
        Ok(self.with(|t| {
            t.applications
                .iter_mut()
                .find(|a| a.id == id && a.user_id == user_id && a.deleted_at.is_none())
                .map(|a| {
                    if let Some(stage) = patch.application_status {
                        a.application_status = stage.as_str().to_string();
                    }
                    if let Some(notes) = &patch.notes {
                        a.notes = Some(notes.clone());
                    }
                    a.clone()
                })
        }))
    }

    async fn soft_delete(&self, id: Uuid, user_id: Uuid) -> Result<Option<ApplicationRow>, AppError> {
        Ok(self.with(|t| {
            t.applications
                .iter_mut()
                .find(|a| a.id == id && a.user_id == user_id && a.deleted_at.is_none())
                .map(|a| {
                    a.deleted_at = Some(Utc::now());
                    a.clone()
                })
        }))
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRow>, AppError> {
        Ok(self.with(|t| t.users.iter().find(|u| u.id == id).cloned()))
    }

    async fn store_linkedin_data(&self, id: Uuid, data: &Value) -> Result<(), AppError> {
        self.with(|t| {
            if let Some(user) = t.users.iter_mut().find(|u| u.id == id) {
                user.linkedin_scraped_data = Some(data.clone());
            }
        });
        Ok(())
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn find_active(&self, email: &str) -> Result<Option<SubscriptionRow>, AppError> {
        Ok(self.with(|t| {
            t.subscriptions
                .iter()
                .rev()
                .find(|s| s.email == email && s.status == SubscriptionStatus::Active.as_str())
                .cloned()
        }))
    }

    async fn create(&self, new: &NewSubscription) -> Result<bool, AppError> {
        Ok(self.with(|t| {
            if t.subscriptions.iter().any(|s| s.event_id == new.event_id) {
                return false;
            }
            let now = Utc::now();
            t.subscriptions.push(SubscriptionRow {
                id: Uuid::new_v4(),
                event_id: new.event_id.clone(),
                email: new.email.clone(),
                customer_id: new.customer_id.clone(),
                subscription_id: new.subscription_id.clone(),
                item_price_id: new.item_price_id.clone(),
                status: new.status.clone(),
                created_at: now,
                updated_at: now,
            });
            true
        }))
    }

    async fn set_status(&self, subscription_id: &str, status: SubscriptionStatus) -> Result<u64, AppError> {
        Ok(self.with(|t| {
            let mut touched = 0;
            for s in t
                .subscriptions
                .iter_mut()
                .filter(|s| s.subscription_id == subscription_id)
            {
                s.status = status.as_str().to_string();
                s.updated_at = Utc::now();
                touched += 1;
            }
            touched
        }))
    }
}

/// Records every message; fails every send while `set_failing(true)`.
#[derive(Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<OutboundMessage>>,
    failing: AtomicBool,
}

impl RecordingDispatcher {
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, queue: QueueName) -> Vec<OutboundMessage> {
        self.sent().into_iter().filter(|m| m.queue == queue).collect()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl MessageDispatcher for RecordingDispatcher {
    async fn send(&self, message: OutboundMessage) -> Result<(), DispatchError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DispatchError::Transport {
                queue: message.queue,
                message: "simulated outage".to_string(),
            });
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingMeter {
    units: Mutex<Vec<(Uuid, i32)>>,
}

impl RecordingMeter {
    pub fn units_for(&self, user_id: Uuid) -> i32 {
        self.units
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == user_id)
            .map(|(_, amount)| amount)
            .sum()
    }
}

#[async_trait]
impl UsageMeter for RecordingMeter {
    async fn record_usage(&self, user: &UserRow, amount: i32) -> Result<(), AppError> {
        self.units.lock().unwrap().push((user.id, amount));
        Ok(())
    }
}

pub struct StaticEntitlement {
    pub entitled: bool,
}

#[async_trait]
impl EntitlementPolicy for StaticEntitlement {
    async fn ensure_entitled(&self, _user: &UserRow) -> Result<(), AppError> {
        if self.entitled {
            Ok(())
        } else {
            Err(AppError::EntitlementDenied("subscription required".to_string()))
        }
    }
}

pub struct FakeSigner;

#[async_trait]
impl UrlSigner for FakeSigner {
    async fn sign_download(&self, key: &str) -> Result<String, AppError> {
        Ok(format!("https://signed.example.com/{key}"))
    }
}

/// An orchestrator wired to in-memory collaborators, with handles to inspect them.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub meter: Arc<RecordingMeter>,
    pub orchestrator: Orchestrator,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_entitlement(true)
    }

    pub fn with_entitlement(entitled: bool) -> Self {
        let store = Arc::new(MemoryStore::default());
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let meter = Arc::new(RecordingMeter::default());
        let orchestrator = Orchestrator {
            applications: store.clone(),
            jobs: store.clone(),
            users: store.clone(),
            dispatcher: dispatcher.clone(),
            entitlement: Arc::new(StaticEntitlement { entitled }),
            meter: meter.clone(),
            callbacks: CallbackUrls::new(BASE_URL).unwrap(),
            documents_ready_template: None,
        };
        Self {
            store,
            dispatcher,
            meter,
            orchestrator,
        }
    }

    pub fn with_template(mut self, template: &str) -> Self {
        self.orchestrator.documents_ready_template = Some(template.to_string());
        self
    }

    /// Router state over the same collaborators as `orchestrator`.
    pub fn state(&self) -> AppState {
        AppState {
            orchestrator: self.orchestrator.clone(),
            linkedin: LinkedinProfiles {
                users: self.store.clone(),
                dispatcher: self.dispatcher.clone(),
                entitlement: self.orchestrator.entitlement.clone(),
                callbacks: self.orchestrator.callbacks.clone(),
            },
            applications: self.store.clone(),
            jobs: self.store.clone(),
            subscriptions: self.store.clone(),
            signer: Arc::new(FakeSigner),
        }
    }
}
