use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::classify::ErrorKind;

/// Page type a task was enqueued under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Listing,
    Detail,
    Unknown,
}

impl Label {
    pub fn as_str(self) -> &'static str {
        match self {
            Label::Listing => "listing",
            Label::Detail => "detail",
            Label::Unknown => "unknown",
        }
    }
}

/// Partial field values carried from a listing card to the detail page it links to.
///
/// Keys are the short hint keys of `parser::extract::Field` ("location", "ref", ...).
pub type FieldHints = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageTask {
    pub url: String,
    pub label: Label,
    #[serde(default)]
    pub hints: FieldHints,
}

impl PageTask {
    pub fn new(url: impl Into<String>, label: Label) -> Self {
        Self {
            url: url.into(),
            label,
            hints: FieldHints::new(),
        }
    }

    pub fn with_hints(mut self, hints: FieldHints) -> Self {
        self.hints = hints;
        self
    }
}

/// One normalized job posting, emitted once per detail page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedJob {
    pub url: String,
    pub job_id: String,
    pub ref_number: Option<String>,
    pub subdomain: String,
    pub title: Option<String>,
    pub location: Option<String>,
    pub work_type: Option<String>,
    pub schedule: Option<String>,
    pub salary_min: Option<String>,
    pub salary_max: Option<String>,
    pub salary_period: Option<String>,
    pub salary_raw: Option<String>,
    pub employment_type: Option<String>,
    pub employment_classification: Option<String>,
    pub duration: Option<String>,
    pub department: Option<String>,
    pub category: Option<String>,
    pub entity: Option<String>,
    pub posted_date: Option<String>,
    pub description: Option<String>,
    pub qualifications: Option<String>,
    pub duties: Option<String>,
    pub full_content: Option<String>,
    pub apply_url: Option<String>,
    pub additional_fields: Option<BTreeMap<String, String>>,
    pub scraped_at: String,
}

/// Snapshot of a page that could not be processed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEvidence {
    pub url: String,
    pub error_kind: ErrorKind,
    pub message: String,
    pub http_status: Option<u16>,
    pub raw_content: String,
    pub captured_at: String,
}

/// What processing one page produced. Exactly one of the three per task.
#[derive(Debug)]
pub enum PageOutcome {
    Enqueue(Vec<PageTask>),
    Emit(Box<ExtractedJob>),
    Failed(ErrorEvidence),
}
