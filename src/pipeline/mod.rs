mod dedup;
mod filter;
mod orchestrator;
mod schedule;
mod slug;

pub use orchestrator::{Pipeline, PipelineOptions, RunRequest};
pub use schedule::is_due;
