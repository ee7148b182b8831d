use url::Url;
use uuid::Uuid;

use crate::models::document::DocumentKind;

/// Path prefix of the internal webhook endpoints.
pub const INTERNAL_PREFIX: &str = "/api/_internal";

/// Builds the callback URLs handed to external workers.
///
/// Query parameter names are part of the worker contract and must not change.
#[derive(Debug, Clone)]
pub struct CallbackUrls {
    base: Url,
}

impl CallbackUrls {
    pub fn new(base_url: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            base: Url::parse(base_url)?,
        })
    }

    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        let prefix = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{prefix}{INTERNAL_PREFIX}/{path}"));
        url.set_query(None);
        url
    }

    pub fn job_scraper(&self, job_url: &str) -> String {
        let mut url = self.endpoint("job-scraper");
        url.query_pairs_mut().append_pair("job-url", job_url);
        url.to_string()
    }

    pub fn document(&self, kind: DocumentKind, application_id: Uuid) -> String {
        self.application_endpoint(kind.callback_endpoint(), application_id)
    }

    pub fn pdf_processed(&self, application_id: Uuid) -> String {
        self.application_endpoint("pdf-processed", application_id)
    }

    pub fn linkedin(&self, user_id: Uuid, check_value: &str) -> String {
        let mut url = self.endpoint(&format!("users/{user_id}/linkedin"));
        url.query_pairs_mut().append_pair("check-value", check_value);
        url.to_string()
    }

    fn application_endpoint(&self, path: &str, application_id: Uuid) -> String {
        let mut url = self.endpoint(path);
        url.query_pairs_mut()
            .append_pair("application-id", &application_id.to_string());
        url.to_string()
    }
}
