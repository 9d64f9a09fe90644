//! Background enrichment job status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// State of a background enrichment job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Done,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

/// Poll-visible status of the latest background job for one item.
///
/// Keyed by item id; a newer request for the same item overwrites the
/// previous entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub item_id: String,
    pub request_id: String,
    pub state: JobState,
    pub started_at: DateTime<Utc>,
}

impl JobStatus {
    pub fn pending(item_id: &str, request_id: &str) -> Self {
        Self {
            item_id: item_id.to_string(),
            request_id: request_id.to_string(),
            state: JobState::Pending,
            started_at: Utc::now(),
        }
    }
}
