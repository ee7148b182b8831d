use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::application::{ApplicationPatch, ApplicationRow, NewApplication};
use crate::models::document::{DocumentKind, Draft, RenderedDocuments};
use crate::models::job::{JobDetails, JobRow};
use crate::models::subscription::{NewSubscription, SubscriptionRow, SubscriptionStatus};
use crate::models::user::UserRow;
use crate::store::{ApplicationStore, JobStore, ListQuery, SubscriptionStore, UserDirectory};

/// PostgreSQL-backed implementation of every store trait.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn started_column(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Resume => "resume_started",
        DocumentKind::CoverLetter => "cover_letter_started",
    }
}

fn generate_column(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Resume => "generate_resume",
        DocumentKind::CoverLetter => "generate_cover_letter",
    }
}

fn draft_column(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Resume => "resume_raw",
        DocumentKind::CoverLetter => "cover_letter_raw",
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn find_by_url(&self, url: &str) -> Result<Option<JobRow>, AppError> {
        Ok(
            sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE url = $1")
                .bind(url)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<JobRow>, AppError> {
        Ok(
            sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<JobRow>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(
            sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ANY($1)")
                .bind(ids)
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn upsert_pending(&self, url: &str) -> Result<JobRow, AppError> {
        // The unique index on url makes concurrent first references converge on one row.
        Ok(sqlx::query_as::<_, JobRow>(
            r#"
            INSERT INTO jobs (url, status)
            VALUES ($1, 'pending')
            ON CONFLICT (url) DO UPDATE SET status = 'pending', updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(url)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn mark_scraped(
        &self,
        url: &str,
        details: &JobDetails,
    ) -> Result<Option<JobRow>, AppError> {
        Ok(sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE jobs
            SET title = $2, company_name = $3, description = $4, skills = $5,
                location = $6, salary = $7, status = 'done', updated_at = NOW()
            WHERE url = $1
            RETURNING *
            "#,
        )
        .bind(url)
        .bind(&details.title)
        .bind(&details.company_name)
        .bind(&details.description)
        .bind(&details.skills)
        .bind(&details.location)
        .bind(&details.salary)
        .fetch_optional(&self.pool)
        .await?)
    }
}

#[async_trait]
impl ApplicationStore for PgStore {
    async fn insert(&self, new: NewApplication) -> Result<ApplicationRow, AppError> {
        Ok(sqlx::query_as::<_, ApplicationRow>(
            r#"
            INSERT INTO applications
                (user_id, job_id, job_url, application_status, notes,
                 generate_resume, generate_cover_letter, applied_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(new.user_id)
        .bind(new.job_id)
        .bind(&new.job_url)
        .bind(new.stage.as_str())
        .bind(&new.notes)
        .bind(new.generate_resume)
        .bind(new.generate_cover_letter)
        .bind(new.applied_at)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ApplicationRow>, AppError> {
        Ok(
            sqlx::query_as::<_, ApplicationRow>("SELECT * FROM applications WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_for_user(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ApplicationRow>, AppError> {
        Ok(sqlx::query_as::<_, ApplicationRow>(
            "SELECT * FROM applications WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        query: &ListQuery,
    ) -> Result<(Vec<ApplicationRow>, i64), AppError> {
        let stage = query.stage.map(|s| s.as_str());

        let rows = sqlx::query_as::<_, ApplicationRow>(
            r#"
            SELECT * FROM applications
            WHERE user_id = $1 AND deleted_at IS NULL
              AND ($2::TEXT IS NULL OR application_status = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(user_id)
        .bind(stage)
        .bind(query.page_size)
        .bind(query.offset())
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM applications
            WHERE user_id = $1 AND deleted_at IS NULL
              AND ($2::TEXT IS NULL OR application_status = $2)
            "#,
        )
        .bind(user_id)
        .bind(stage)
        .fetch_one(&self.pool)
        .await?;

        Ok((rows, total))
    }

    async fn find_by_job_url(&self, url: &str) -> Result<Vec<ApplicationRow>, AppError> {
        Ok(sqlx::query_as::<_, ApplicationRow>(
            "SELECT * FROM applications WHERE job_url = $1 AND deleted_at IS NULL ORDER BY created_at",
        )
        .bind(url)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn mark_scraping_started(&self, url: &str) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE applications SET job_scraping_started = TRUE, updated_at = NOW()
            WHERE job_url = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(url)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn mark_started(&self, id: Uuid, kind: DocumentKind) -> Result<bool, AppError> {
        let sql = format!(
            "UPDATE applications SET {} = TRUE, updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
            started_column(kind)
        );
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn store_draft(
        &self,
        id: Uuid,
        draft: &Draft,
    ) -> Result<Option<ApplicationRow>, AppError> {
        let row = match draft {
            Draft::Resume(segments) => {
                sqlx::query_as::<_, ApplicationRow>(
                    r#"
                    UPDATE applications SET resume_raw = $2, updated_at = NOW()
                    WHERE id = $1 AND deleted_at IS NULL
                    RETURNING *
                    "#,
                )
                .bind(id)
                .bind(segments)
                .fetch_optional(&self.pool)
                .await?
            }
            Draft::CoverLetter(text) => {
                sqlx::query_as::<_, ApplicationRow>(
                    r#"
                    UPDATE applications SET cover_letter_raw = $2, updated_at = NOW()
                    WHERE id = $1 AND deleted_at IS NULL
                    RETURNING *
                    "#,
                )
                .bind(id)
                .bind(text)
                .fetch_optional(&self.pool)
                .await?
            }
        };
        Ok(row)
    }

    async fn clear_recreation(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE applications SET is_recreation = FALSE, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn begin_recreation(
        &self,
        id: Uuid,
        kind: DocumentKind,
    ) -> Result<Option<ApplicationRow>, AppError> {
        let sql = format!(
            r#"
            UPDATE applications
            SET is_recreation = TRUE, {} = TRUE, {} = NULL,
                render_dispatched = FALSE, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *
            "#,
            generate_column(kind),
            draft_column(kind)
        );
        Ok(sqlx::query_as::<_, ApplicationRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn abandon_recreation(
        &self,
        previous: &ApplicationRow,
        kind: DocumentKind,
    ) -> Result<(), AppError> {
        let sql = format!(
            r#"
            UPDATE applications
            SET is_recreation = FALSE, {} = $2, {} = $3, render_dispatched = $4, updated_at = NOW()
            WHERE id = $1
            "#,
            generate_column(kind),
            draft_column(kind)
        );
        let query = sqlx::query(&sql)
            .bind(previous.id)
            .bind(previous.requires(kind));
        let query = match kind {
            DocumentKind::Resume => query.bind(&previous.resume_raw),
            DocumentKind::CoverLetter => query.bind(&previous.cover_letter_raw),
        };
        query
            .bind(previous.render_dispatched)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn claim_render(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE applications SET render_dispatched = TRUE WHERE id = $1 AND render_dispatched = FALSE",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_render(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE applications SET render_dispatched = FALSE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn store_artifacts(
        &self,
        id: Uuid,
        documents: &RenderedDocuments,
    ) -> Result<Option<ApplicationRow>, AppError> {
        Ok(sqlx::query_as::<_, ApplicationRow>(
            r#"
            UPDATE applications
            SET resume_key = $2, cover_letter_key = $3, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&documents.resume_pdf)
        .bind(&documents.cover_letter_pdf)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn update(
        &self,
        id: Uuid,
        user_id: Uuid,
        patch: &ApplicationPatch,
    ) -> Result<Option<ApplicationRow>, AppError> {
        Ok(sqlx::query_as::<_, ApplicationRow>(
            r#"
            UPDATE applications
            SET application_status = COALESCE($3, application_status),
                notes = COALESCE($4, notes),
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(patch.application_status.map(|s| s.as_str()))
        .bind(&patch.notes)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn soft_delete(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ApplicationRow>, AppError> {
        Ok(sqlx::query_as::<_, ApplicationRow>(
            r#"
            UPDATE applications
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRow>, AppError> {
        Ok(
            sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn store_linkedin_data(&self, id: Uuid, data: &Value) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE users SET linkedin_scraped_data = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SubscriptionStore for PgStore {
    async fn find_active(&self, email: &str) -> Result<Option<SubscriptionRow>, AppError> {
        Ok(sqlx::query_as::<_, SubscriptionRow>(
            r#"
            SELECT * FROM subscriptions
            WHERE email = $1 AND status = 'active'
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn create(&self, new: &NewSubscription) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO subscriptions
                (event_id, email, customer_id, subscription_id, item_price_id, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(&new.event_id)
        .bind(&new.email)
        .bind(&new.customer_id)
        .bind(&new.subscription_id)
        .bind(&new.item_price_id)
        .bind(&new.status)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn set_status(
        &self,
        subscription_id: &str,
        status: SubscriptionStatus,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE subscriptions SET status = $2, updated_at = NOW() WHERE subscription_id = $1",
        )
        .bind(subscription_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
