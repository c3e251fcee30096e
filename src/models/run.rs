use serde::{Deserialize, Serialize};

/// Outcome of one topic within one pipeline invocation.
///
/// `skipped` counts every candidate that survived filtering and dedup but
/// did not become a draft, whether it was cut by the per-period cap or its
/// generation failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub topic_id: i64,
    pub topic_name: String,
    pub generated: usize,
    pub skipped: usize,
}

impl RunResult {
    pub fn empty(topic_id: i64, topic_name: impl Into<String>) -> Self {
        Self {
            topic_id,
            topic_name: topic_name.into(),
            generated: 0,
            skipped: 0,
        }
    }
}
