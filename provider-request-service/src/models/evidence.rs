//! Evidence that a requesting provider runs on green energy.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Kind of document backing a green energy claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceType {
    AnnualReport,
    WebPage,
    Certificate,
    Other,
}

impl EvidenceType {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnnualReport => "annual_report",
            Self::WebPage => "web_page",
            Self::Certificate => "certificate",
            Self::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "annual_report" => Some(Self::AnnualReport),
            "web_page" => Some(Self::WebPage),
            "certificate" => Some(Self::Certificate),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for EvidenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single piece of evidence: either a web link or an uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEvidence {
    pub evidence_id: Uuid,
    pub request_id: Uuid,
    pub title: String,
    pub description: String,
    pub link: Option<String>,
    /// Reference into the file store; the upload itself lives elsewhere.
    pub file: Option<String>,
    pub evidence_type: EvidenceType,
    pub public: bool,
}

impl std::fmt::Display for RequestEvidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = self
            .link
            .as_deref()
            .or(self.file.as_deref())
            .unwrap_or_default();
        let visibility = if self.public { "public" } else { "private" };
        write!(f, "{}: {} ({})", source, self.title, visibility)
    }
}

fn default_public() -> bool {
    true
}

/// Input for attaching evidence.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewEvidence {
    #[validate(length(min = 1, max = 255, message = "Evidence title is required"))]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[validate(url(message = "Evidence link must be a valid URL"))]
    pub link: Option<String>,

    pub file: Option<String>,

    pub evidence_type: EvidenceType,

    #[serde(default = "default_public")]
    pub public: bool,
}

impl NewEvidence {
    pub fn link(title: impl Into<String>, link: impl Into<String>, evidence_type: EvidenceType) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            link: Some(link.into()),
            file: None,
            evidence_type,
            public: true,
        }
    }

    pub fn file(title: impl Into<String>, file: impl Into<String>, evidence_type: EvidenceType) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            link: None,
            file: Some(file.into()),
            evidence_type,
            public: true,
        }
    }

    /// Treat blank link or file values as not submitted.
    pub fn normalized(mut self) -> Self {
        self.link = self.link.filter(|l| !l.trim().is_empty());
        self.file = self.file.filter(|f| !f.trim().is_empty());
        self
    }
}
