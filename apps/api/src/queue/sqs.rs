use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_sqs::Client as SqsClient;
use tracing::debug;

use crate::config::QueueUrls;
use crate::queue::{DispatchError, MessageDispatcher, OutboundMessage, QueueName};

/// Publishes to SQS FIFO queues.
#[derive(Clone)]
pub struct SqsDispatcher {
    client: SqsClient,
    queue_urls: HashMap<QueueName, String>,
}

impl SqsDispatcher {
    pub fn new(client: SqsClient, urls: &QueueUrls) -> Self {
        let queue_urls = HashMap::from([
            (QueueName::JobScraper, urls.job_scraper.clone()),
            (QueueName::ResumeCreator, urls.resume_creator.clone()),
            (QueueName::CoverLetterCreator, urls.cover_letter_creator.clone()),
            (QueueName::PdfProcessor, urls.pdf_processor.clone()),
            (QueueName::Meter, urls.meter.clone()),
            (QueueName::SendEmail, urls.send_email.clone()),
            (QueueName::LinkedinScraper, urls.linkedin_scraper.clone()),
        ]);
        Self { client, queue_urls }
    }
}

#[async_trait]
impl MessageDispatcher for SqsDispatcher {
    async fn send(&self, message: OutboundMessage) -> Result<(), DispatchError> {
        let queue = message.queue;
        let queue_url = self
            .queue_urls
            .get(&queue)
            .ok_or(DispatchError::UnknownQueue(queue))?;

        let output = self
            .client
            .send_message()
            .queue_url(queue_url)
            .message_body(message.body.to_string())
            .message_deduplication_id(message.deduplication_id)
            .message_group_id(message.group_id)
            .send()
            .await
            .map_err(|e| DispatchError::Transport {
                queue,
                message: e.to_string(),
            })?;

        debug!(
            "SQS accepted message {} on {queue}",
            output.message_id().unwrap_or("<none>")
        );
        Ok(())
    }
}
