use chrono::{DateTime, Duration, Utc};

use crate::models::{Frequency, TopicSubscription};

// An hour of slack so a cron job that fires a little early still runs.
const DAILY_MIN_ELAPSED_HOURS: i64 = 23;
const WEEKLY_MIN_ELAPSED_HOURS: i64 = 167;

/// Whether a topic should run now. Manual topics are never due; forcing is
/// the caller's business.
pub fn is_due(topic: &TopicSubscription, now: DateTime<Utc>) -> bool {
    let min_elapsed = match topic.frequency {
        Frequency::Manual => return false,
        Frequency::Daily => Duration::hours(DAILY_MIN_ELAPSED_HOURS),
        Frequency::Weekly => Duration::hours(WEEKLY_MIN_ELAPSED_HOURS),
    };

    match topic.last_run_at {
        None => true,
        // A last run in the future yields a negative elapsed time: not due.
        Some(last_run) => now.signed_duration_since(last_run) >= min_elapsed,
    }
}
