//! Record stores. Every mutation is a single-row (or single-statement) write
//! scoped by id or job URL; there are no multi-statement transactions.

pub mod postgres;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::application::{ApplicationPatch, ApplicationRow, HiringStage, NewApplication};
use crate::models::document::{DocumentKind, Draft, RenderedDocuments};
use crate::models::job::{JobDetails, JobRow};
use crate::models::subscription::{NewSubscription, SubscriptionRow, SubscriptionStatus};
use crate::models::user::UserRow;

#[derive(Debug, Clone)]
pub struct ListQuery {
    pub stage: Option<HiringStage>,
    pub page: i64,
    pub page_size: i64,
    offset: i64,
}

impl ListQuery {
    /// `None` unless `page` and `page_size` are positive and the row offset fits in an `i64`.
    pub fn new(stage: Option<HiringStage>, page: i64, page_size: i64) -> Option<Self> {
        if page < 1 || page_size < 1 {
            return None;
        }
        let offset = (page - 1).checked_mul(page_size)?;
        Some(Self {
            stage,
            page,
            page_size,
            offset,
        })
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }
}


#[async_trait]
pub trait JobStore: Send + Sync {
    async fn find_by_url(&self, url: &str) -> Result<Option<JobRow>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<JobRow>, AppError>;

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<JobRow>, AppError>;

    /// Creates the job in `pending`, or resets an existing row for the URL to `pending`.
    /// Never produces a second row for the same URL.
    async fn upsert_pending(&self, url: &str) -> Result<JobRow, AppError>;

    /// Writes scraped fields and flips the job to `done`. `None` if no job has this URL.
    async fn mark_scraped(&self, url: &str, details: &JobDetails)
        -> Result<Option<JobRow>, AppError>;
}

#[async_trait]
pub trait ApplicationStore: Send + Sync {
    async fn insert(&self, new: NewApplication) -> Result<ApplicationRow, AppError>;

    /// Looks up by id, soft-deleted rows included.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ApplicationRow>, AppError>;

    /// Looks up by id for an owner, soft-deleted rows excluded.
    async fn find_for_user(&self, id: Uuid, user_id: Uuid)
        -> Result<Option<ApplicationRow>, AppError>;

    /// One page of a user's live applications, newest first, plus the total count.
    async fn list_for_user(
        &self,
        user_id: Uuid,
        query: &ListQuery,
    ) -> Result<(Vec<ApplicationRow>, i64), AppError>;

    /// Every live application referencing the job URL, regardless of owner.
    async fn find_by_job_url(&self, url: &str) -> Result<Vec<ApplicationRow>, AppError>;

    /// Bulk-marks scraping as started for every application on the URL. Returns rows touched.
    async fn mark_scraping_started(&self, url: &str) -> Result<u64, AppError>;

    /// Returns false if the application does not exist or was deleted.
    async fn mark_started(&self, id: Uuid, kind: DocumentKind) -> Result<bool, AppError>;

    /// Stores the draft and returns the updated row. `None` for unknown or deleted applications.
    async fn store_draft(&self, id: Uuid, draft: &Draft) -> Result<Option<ApplicationRow>, AppError>;

    async fn clear_recreation(&self, id: Uuid) -> Result<(), AppError>;

    /// Flags a manual regeneration: sets `is_recreation`, force-enables the document,
    /// clears its current draft and re-arms the render claim. With the draft gone, a
    /// redelivered callback for the other document cannot render before the new draft lands.
    async fn begin_recreation(&self, id: Uuid, kind: DocumentKind)
        -> Result<Option<ApplicationRow>, AppError>;

    /// Undoes `begin_recreation` from the row as it was before it, when the
    /// regeneration request could not be sent.
    async fn abandon_recreation(&self, previous: &ApplicationRow, kind: DocumentKind)
        -> Result<(), AppError>;

    /// Atomically sets `render_dispatched` if it was false. Returns whether this caller won.
    async fn claim_render(&self, id: Uuid) -> Result<bool, AppError>;

    async fn release_render(&self, id: Uuid) -> Result<(), AppError>;

    /// `None` for unknown or deleted applications.
    async fn store_artifacts(
        &self,
        id: Uuid,
        documents: &RenderedDocuments,
    ) -> Result<Option<ApplicationRow>, AppError>;

    async fn update(
        &self,
        id: Uuid,
        user_id: Uuid,
        patch: &ApplicationPatch,
    ) -> Result<Option<ApplicationRow>, AppError>;

    async fn soft_delete(&self, id: Uuid, user_id: Uuid) -> Result<Option<ApplicationRow>, AppError>;
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Newest active subscription billed to this email.
    async fn find_active(&self, email: &str) -> Result<Option<SubscriptionRow>, AppError>;

    /// Returns false when the creating event was already recorded.
    async fn create(&self, new: &NewSubscription) -> Result<bool, AppError>;

    /// Returns the number of rows carrying this provider subscription id.
    async fn set_status(&self, subscription_id: &str, status: SubscriptionStatus)
        -> Result<u64, AppError>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRow>, AppError>;

    async fn store_linkedin_data(&self, id: Uuid, data: &Value) -> Result<(), AppError>;
}
