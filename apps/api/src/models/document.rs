use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::queue::QueueName;

/// The two documents an application can generate.
///
/// Everything that differs between them (draft column, started flag, worker
/// queue, callback endpoint, wire name) hangs off this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DocumentKind {
    Resume,
    CoverLetter,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 2] = [DocumentKind::Resume, DocumentKind::CoverLetter];

    /// Queue consumed by the generation worker for this document.
    pub fn generator_queue(self) -> QueueName {
        match self {
            DocumentKind::Resume => QueueName::ResumeCreator,
            DocumentKind::CoverLetter => QueueName::CoverLetterCreator,
        }
    }

    /// Webhook path (under `/api/_internal/`) the generation worker calls back on.
    pub fn callback_endpoint(self) -> &'static str {
        match self {
            DocumentKind::Resume => "resume-segments",
            DocumentKind::CoverLetter => "cover-letter-segments",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Resume => "resume",
            DocumentKind::CoverLetter => "coverLetter",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Draft content delivered by a generation worker.
#[derive(Debug, Clone, PartialEq)]
pub enum Draft {
    /// Structured resume segments; opaque to this service.
    Resume(Value),
    /// Plain-text cover letter.
    CoverLetter(String),
}

impl Draft {
    pub fn kind(&self) -> DocumentKind {
        match self {
            Draft::Resume(_) => DocumentKind::Resume,
            Draft::CoverLetter(_) => DocumentKind::CoverLetter,
        }
    }
}

/// Storage keys of the rendered PDFs, as reported by the renderer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedDocuments {
    pub resume_pdf: Option<String>,
    pub cover_letter_pdf: Option<String>,
}
