use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::job::{JobDetails, JobRow, ScrapedJob};
use crate::queue::messages::ScrapeRequest;
use crate::queue::{self, MessageDispatcher, QueueName};
use crate::store::JobStore;
use crate::webhooks::callbacks::CallbackUrls;

/// Puts the job for `url` into `pending` (creating it if needed) and requests a scrape.
///
/// The scrape request is keyed by the URL for both deduplication and ordering,
/// so repeated initialisations inside the transport window collapse into one.
/// The row is written before the dispatch so the scraper's callback always finds it.
pub async fn init_job(
    jobs: &dyn JobStore,
    dispatcher: &dyn MessageDispatcher,
    callbacks: &CallbackUrls,
    url: &str,
) -> Result<JobRow, AppError> {
    let job = jobs.upsert_pending(url).await?;

    let request = ScrapeRequest {
        job_url: url,
        callback_url: callbacks.job_scraper(url),
    };
    queue::dispatch(dispatcher, QueueName::JobScraper, &request, url, url).await;

    info!("Job {} pending scrape for {url}", job.id);
    Ok(job)
}

/// Applies a scrape result. Returns `None` (and writes nothing) when no job has this URL.
pub async fn update_from_webhook(
    jobs: &dyn JobStore,
    url: &str,
    scraped: ScrapedJob,
) -> Result<Option<JobRow>, AppError> {
    let details = JobDetails::from(scraped);
    let job = jobs.mark_scraped(url, &details).await?;

    match &job {
        Some(job) => info!("Job {} scraped: {} at {}", job.id, job.title, job.company_name),
        None => warn!("Scrape result for unknown job URL {url}; ignoring"),
    }
    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::{JobStatus, PLACEHOLDER};
    use crate::testing::{MemoryStore, RecordingDispatcher};

    fn callbacks() -> CallbackUrls {
        CallbackUrls::new("http://localhost:3000").unwrap()
    }

    #[tokio::test]
    async fn test_init_job_creates_pending_row_and_dispatches_scrape() {
        let store = MemoryStore::default();
        let dispatcher = RecordingDispatcher::default();

        let job = init_job(&store, &dispatcher, &callbacks(), "https://jobs.example.com/42")
            .await
            .unwrap();

        assert_eq!(job.status(), JobStatus::Pending);
        let sent = dispatcher.sent_to(QueueName::JobScraper);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].deduplication_id, "https://jobs.example.com/42");
        assert_eq!(sent[0].group_id, "https://jobs.example.com/42");
        assert_eq!(sent[0].body["jobUrl"], "https://jobs.example.com/42");
        assert!(sent[0].body["callbackUrl"]
            .as_str()
            .unwrap()
            .contains("/api/_internal/job-scraper?job-url="));
    }

    #[tokio::test]
    async fn test_reinit_after_error_reuses_row() {
        let store = MemoryStore::default();
        let dispatcher = RecordingDispatcher::default();
        let url = "https://jobs.example.com/7";

        let first = init_job(&store, &dispatcher, &callbacks(), url).await.unwrap();
        store.set_job_status(url, JobStatus::Error);
        let second = init_job(&store, &dispatcher, &callbacks(), url).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.status(), JobStatus::Pending);
        assert_eq!(store.job_count(), 1);
        assert_eq!(dispatcher.sent_to(QueueName::JobScraper).len(), 2);
    }

    #[tokio::test]
    async fn test_update_from_webhook_fills_placeholders() {
        let store = MemoryStore::default();
        let dispatcher = RecordingDispatcher::default();
        let url = "https://jobs.example.com/42";
        init_job(&store, &dispatcher, &callbacks(), url).await.unwrap();

        let job = update_from_webhook(
            &store,
            url,
            ScrapedJob {
                title: Some("Engineer".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(job.status(), JobStatus::Done);
        assert_eq!(job.title, "Engineer");
        assert_eq!(job.company_name, PLACEHOLDER);
    }

    #[tokio::test]
    async fn test_update_for_unknown_url_is_a_no_op() {
        let store = MemoryStore::default();
        let job = update_from_webhook(&store, "https://nowhere.example.com", ScrapedJob::default())
            .await
            .unwrap();
        assert!(job.is_none());
        assert_eq!(store.job_count(), 0);
    }
}
