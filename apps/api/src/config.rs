use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Public base URL of this service; webhook callback URLs are built from it.
    pub base_url: String,
    pub port: u16,
    pub rust_log: String,
    pub aws: AwsConfig,
    pub queues: QueueUrls,
    pub signed_url_ttl: Duration,
    /// Generations a user without an active subscription may run.
    pub free_generation_allowance: i64,
    /// SES template sent when an application's documents are rendered. Disabled when unset.
    pub documents_ready_template: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AwsConfig {
    pub region: String,
    /// LocalStack / MinIO endpoint override.
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub resource_bucket: String,
}

/// Physical SQS queue URLs, one per logical queue.
#[derive(Debug, Clone)]
pub struct QueueUrls {
    pub job_scraper: String,
    pub resume_creator: String,
    pub cover_letter_creator: String,
    pub pdf_processor: String,
    pub meter: String,
    pub send_email: String,
    pub linkedin_scraper: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let port = optional_env("PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse::<u16>()
            .context("PORT must be a valid port number")?;

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            base_url: optional_env("BASE_URL").unwrap_or_else(|| local_base_url(port)),
            port,
            rust_log: optional_env("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            aws: AwsConfig {
                region: optional_env("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                endpoint: optional_env("AWS_ENDPOINT"),
                access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
                secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
                resource_bucket: require_env("AWS_RES_BUCKET")?,
            },
            queues: QueueUrls {
                job_scraper: require_env("JOB_SCRAPER_QUEUE_URL")?,
                resume_creator: require_env("RESUME_CREATOR_QUEUE_URL")?,
                cover_letter_creator: require_env("COVER_LETTER_CREATOR_QUEUE_URL")?,
                pdf_processor: require_env("PDF_PROCESSOR_QUEUE_URL")?,
                meter: require_env("METER_QUEUE_URL")?,
                send_email: require_env("EMAIL_QUEUE_URL")?,
                linkedin_scraper: require_env("LINKEDIN_SCRAPER_QUEUE_URL")?,
            },
            signed_url_ttl: Duration::from_secs(
                optional_env("SIGNED_URL_TTL_SECS")
                    .unwrap_or_else(|| "3600".to_string())
                    .parse::<u64>()
                    .context("SIGNED_URL_TTL_SECS must be a number of seconds")?,
            ),
            free_generation_allowance: optional_env("FREE_GENERATION_ALLOWANCE")
                .unwrap_or_else(|| "0".to_string())
                .parse::<i64>()
                .context("FREE_GENERATION_ALLOWANCE must be an integer")?,
            documents_ready_template: optional_env("DOCUMENTS_READY_TEMPLATE"),
        })
    }
}

/// Callback base when `BASE_URL` is unset: this process on its own listening port.
fn local_base_url(port: u16) -> String {
    format!("http://localhost:{port}")
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
