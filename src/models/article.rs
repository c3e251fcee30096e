use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A normalized feed item, candidate for draft generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedArticle {
    pub title: String,
    pub url: String,
    pub summary: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestStatus {
    Pending,
    Generated,
    Failed,
}

impl IngestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestStatus::Pending => "pending",
            IngestStatus::Generated => "generated",
            IngestStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for IngestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IngestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(IngestStatus::Pending),
            "generated" => Ok(IngestStatus::Generated),
            "failed" => Ok(IngestStatus::Failed),
            other => Err(format!("unknown ingest status '{}'", other)),
        }
    }
}

/// Audit entry: this URL has been considered for this topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestedArticle {
    pub id: i64,
    pub topic_id: i64,
    pub url: String,
    pub title: String,
    pub summary: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub status: IngestStatus,
    pub post_id: Option<i64>,
    pub ingested_at: DateTime<Utc>,
}
