//! Parses raw webhook requests (query parameters + body) into typed commands.
//!
//! The external workers are plain HTTP callers, so anything malformed is
//! reported as `None` and dropped by the handler rather than rejected.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::models::document::{DocumentKind, Draft, RenderedDocuments};
use crate::models::job::ScrapedJob;
use crate::models::subscription::NewSubscription;

#[derive(Debug, Default, Deserialize)]
pub struct JobScraperQuery {
    #[serde(rename = "job-url")]
    pub job_url: Option<String>,
    #[serde(rename = "just-started")]
    pub just_started: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApplicationQuery {
    #[serde(rename = "application-id")]
    pub application_id: Option<String>,
    #[serde(rename = "just-started")]
    pub just_started: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LinkedinQuery {
    #[serde(rename = "check-value")]
    pub check_value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CoverLetterBody {
    content: Option<String>,
}

/// Any non-empty `just-started` value selects the progress variant.
fn flag_set(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// An empty body reads as `T::default()`; a malformed one as `None`.
fn parse_body<T: DeserializeOwned + Default>(body: &[u8]) -> Option<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Some(T::default());
    }
    serde_json::from_slice(body).ok()
}

#[derive(Debug, PartialEq)]
pub enum JobScraperCommand {
    Started { job_url: String },
    Scraped { job_url: String, job: ScrapedJob },
}

impl JobScraperCommand {
    pub fn parse(query: JobScraperQuery, body: &[u8]) -> Option<Self> {
        let job_url = non_empty(query.job_url)?;
        if flag_set(&query.just_started) {
            return Some(JobScraperCommand::Started { job_url });
        }
        let job = parse_body::<ScrapedJob>(body)?;
        Some(JobScraperCommand::Scraped { job_url, job })
    }
}

#[derive(Debug, PartialEq)]
pub enum DocumentCommand {
    Started {
        application_id: Uuid,
        kind: DocumentKind,
    },
    Delivered {
        application_id: Uuid,
        draft: Draft,
    },
}

impl DocumentCommand {
    pub fn parse(kind: DocumentKind, query: ApplicationQuery, body: &[u8]) -> Option<Self> {
        let application_id = parse_application_id(query.application_id)?;
        if flag_set(&query.just_started) {
            return Some(DocumentCommand::Started {
                application_id,
                kind,
            });
        }
        let draft = match kind {
            DocumentKind::Resume => {
                let segments: Value = serde_json::from_slice(body).ok()?;
                if segments.is_null() {
                    return None;
                }
                Draft::Resume(segments)
            }
            DocumentKind::CoverLetter => {
                let parsed: CoverLetterBody = serde_json::from_slice(body).ok()?;
                Draft::CoverLetter(parsed.content?)
            }
        };
        Some(DocumentCommand::Delivered {
            application_id,
            draft,
        })
    }
}

#[derive(Debug, PartialEq)]
pub struct RenderCommand {
    pub application_id: Uuid,
    pub documents: RenderedDocuments,
}

impl RenderCommand {
    pub fn parse(query: ApplicationQuery, body: &[u8]) -> Option<Self> {
        let application_id = parse_application_id(query.application_id)?;
        let documents = parse_body::<RenderedDocuments>(body)?;
        Some(RenderCommand {
            application_id,
            documents,
        })
    }
}

#[derive(Debug, PartialEq)]
pub struct LinkedinCommand {
    pub user_id: Uuid,
    pub check_value: String,
    pub payload: Value,
}

impl LinkedinCommand {
    pub fn parse(user_id: &str, query: LinkedinQuery, body: &[u8]) -> Option<Self> {
        let user_id = Uuid::parse_str(user_id.trim()).ok()?;
        let check_value = non_empty(query.check_value)?;
        let payload: Value = serde_json::from_slice(body).ok()?;
        Some(LinkedinCommand {
            user_id,
            check_value,
            payload,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SubscriptionEvent {
    id: Option<String>,
    event_type: Option<String>,
    #[serde(default)]
    content: SubscriptionEventContent,
}

#[derive(Debug, Default, Deserialize)]
struct SubscriptionEventContent {
    subscription: Option<ProviderSubscription>,
    customer: Option<ProviderCustomer>,
}

#[derive(Debug, Deserialize)]
struct ProviderSubscription {
    id: Option<String>,
    status: Option<String>,
    #[serde(default)]
    subscription_items: Vec<ProviderSubscriptionItem>,
}

#[derive(Debug, Deserialize)]
struct ProviderSubscriptionItem {
    item_price_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderCustomer {
    id: Option<String>,
    email: Option<String>,
}

/// A billing-provider subscription event. Event types this service does not
/// track parse as `Ignored` so the provider still gets its acknowledgement.
#[derive(Debug, PartialEq)]
pub enum SubscriptionCommand {
    Created(NewSubscription),
    Cancelled { subscription_id: String },
    Reactivated { subscription_id: String },
    Ignored { event_type: String },
}

impl SubscriptionCommand {
    pub fn parse(body: &[u8]) -> Option<Self> {
        let event: SubscriptionEvent = serde_json::from_slice(body).ok()?;
        let event_type = non_empty(event.event_type)?;
        let subscription = event.content.subscription;

        match event_type.as_str() {
            "subscription_created" => {
                let subscription = subscription?;
                let customer = event.content.customer?;
                // Metering bills against the first priced item.
                let item_price_id = subscription
                    .subscription_items
                    .into_iter()
                    .find_map(|item| non_empty(item.item_price_id))?;
                Some(SubscriptionCommand::Created(NewSubscription {
                    event_id: non_empty(event.id)?,
                    email: non_empty(customer.email)?.trim().to_lowercase(),
                    customer_id: non_empty(customer.id)?,
                    subscription_id: non_empty(subscription.id)?,
                    item_price_id,
                    status: non_empty(subscription.status).unwrap_or_else(|| "active".to_string()),
                }))
            }
            "subscription_cancelled" | "subscription_deleted" => {
                Some(SubscriptionCommand::Cancelled {
                    subscription_id: non_empty(subscription?.id)?,
                })
            }
            "subscription_reactivated" | "subscription_reactivated_with_backdating" => {
                Some(SubscriptionCommand::Reactivated {
                    subscription_id: non_empty(subscription?.id)?,
                })
            }
            _ => Some(SubscriptionCommand::Ignored { event_type }),
        }
    }
}

fn parse_application_id(raw: Option<String>) -> Option<Uuid> {
    Uuid::parse_str(non_empty(raw)?.trim()).ok()
}
