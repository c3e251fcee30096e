use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How often the scheduler considers a topic due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// Only runs when explicitly forced.
    Manual,
    #[default]
    Daily,
    Weekly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Manual => "manual",
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manual" => Ok(Frequency::Manual),
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            other => Err(format!("unknown frequency '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicSubscription {
    pub id: i64,
    pub name: String,
    pub keywords: Vec<String>,
    pub rss_feeds: Vec<String>,
    pub is_active: bool,
    pub frequency: Frequency,
    pub max_per_period: u32,
    pub last_run_at: Option<DateTime<Utc>>,
    pub essay_focus: Option<String>,
    pub use_keyword_filter: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTopic {
    pub name: String,
    pub keywords: Vec<String>,
    pub rss_feeds: Vec<String>,
    pub frequency: Frequency,
    pub max_per_period: u32,
    pub essay_focus: Option<String>,
    pub use_keyword_filter: bool,
}
