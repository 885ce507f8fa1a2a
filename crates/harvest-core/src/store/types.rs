//! Types used by the page database.

use serde::{Deserialize, Serialize};

/// Page identifier.
pub type PageId = i64;

/// Acquisition state stored as a string in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageState {
    Pending,
    Done,
    Failed,
}

impl PageState {
    pub fn as_str(self) -> &'static str {
        match self {
            PageState::Pending => "pending",
            PageState::Done => "done",
            PageState::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "done" => PageState::Done,
            "failed" => PageState::Failed,
            _ => PageState::Pending,
        }
    }
}

impl std::fmt::Display for PageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The unit of work handed to a batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    pub id: PageId,
    pub url: String,
}

/// Summary view used by the CLI `status` command.
#[derive(Debug, Clone)]
pub struct PageSummary {
    pub id: PageId,
    pub url: String,
    pub state: PageState,
    pub attempts: i64,
    pub last_error: Option<String>,
}

/// Full page row.
#[derive(Debug, Clone)]
pub struct PageDetails {
    pub id: PageId,
    pub url: String,
    pub state: PageState,
    pub attempts: i64,
    pub last_attempt_at: Option<i64>,
    pub last_error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl PageDetails {
    pub fn record(&self) -> PageRecord {
        PageRecord {
            id: self.id,
            url: self.url.clone(),
        }
    }
}

/// Fields returned by the extraction service for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Extraction {
    pub data: serde_json::Value,
}

/// An extraction as stored.
#[derive(Debug, Clone)]
pub struct StoredExtraction {
    pub id: i64,
    pub page_id: PageId,
    pub data: serde_json::Value,
    pub created_at: i64,
}
