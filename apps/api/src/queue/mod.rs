//! Outbound message queues.
//!
//! Every message is fire-and-forget: a JSON body plus a deduplication key and
//! an ordering group key. Ordering holds only within a group; deduplication is
//! best-effort within the transport's window. Consumers must be idempotent.

pub mod messages;
pub mod sqs;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

/// Hard limit the transport puts on deduplication and group keys.
pub const MAX_KEY_LEN: usize = 128;

/// Logical queue names. Mapped to physical queue URLs by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueName {
    JobScraper,
    ResumeCreator,
    CoverLetterCreator,
    PdfProcessor,
    Meter,
    SendEmail,
    LinkedinScraper,
}

impl QueueName {
    pub fn as_str(self) -> &'static str {
        match self {
            QueueName::JobScraper => "jobScraper",
            QueueName::ResumeCreator => "resumeCreator",
            QueueName::CoverLetterCreator => "coverLetterCreator",
            QueueName::PdfProcessor => "pdfProcessor",
            QueueName::Meter => "meter",
            QueueName::SendEmail => "sendEmail",
            QueueName::LinkedinScraper => "linkedinScraper",
        }
    }
}

impl std::fmt::Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to serialize message body: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("no queue URL configured for {0}")]
    UnknownQueue(QueueName),

    #[error("transport error on {queue}: {message}")]
    Transport { queue: QueueName, message: String },
}

/// A message ready to publish. Keys are already truncated to `MAX_KEY_LEN`.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub queue: QueueName,
    pub body: Value,
    pub deduplication_id: String,
    pub group_id: String,
}

impl OutboundMessage {
    pub fn new<T: Serialize>(
        queue: QueueName,
        body: &T,
        deduplication_id: &str,
        group_id: &str,
    ) -> Result<Self, DispatchError> {
        Ok(Self {
            queue,
            body: serde_json::to_value(body)?,
            deduplication_id: truncate_key(deduplication_id),
            group_id: truncate_key(group_id),
        })
    }
}

/// Truncates a key to at most `MAX_KEY_LEN` bytes, never splitting a character.
pub fn truncate_key(key: &str) -> String {
    if key.len() <= MAX_KEY_LEN {
        return key.to_string();
    }
    let mut end = MAX_KEY_LEN;
    while !key.is_char_boundary(end) {
        end -= 1;
    }
    key[..end].to_string()
}

/// Publishes messages to named queues.
///
/// Carried in `AppState` as `Arc<dyn MessageDispatcher>`.
#[async_trait]
pub trait MessageDispatcher: Send + Sync {
    async fn send(&self, message: OutboundMessage) -> Result<(), DispatchError>;
}

/// Builds and publishes a message, logging and swallowing any failure.
///
/// Returns whether the message was handed to the transport. Nothing retries a
/// failed dispatch; redelivery of the triggering webhook is the only recovery.
pub async fn dispatch<T: Serialize>(
    dispatcher: &dyn MessageDispatcher,
    queue: QueueName,
    body: &T,
    deduplication_id: &str,
    group_id: &str,
) -> bool {
    let message = match OutboundMessage::new(queue, body, deduplication_id, group_id) {
        Ok(message) => message,
        Err(e) => {
            error!("Error building message for {queue}: {e}");
            return false;
        }
    };

    match dispatcher.send(message).await {
        Ok(()) => {
            debug!("Dispatched message to {queue} (group {group_id})");
            true
        }
        Err(e) => {
            error!("Error producing message to {queue}: {e}");
            false
        }
    }
}
