mod article;
mod post;
mod run;
mod settings;
mod topic;

pub use article::{FeedArticle, IngestStatus, IngestedArticle};
pub use post::{DraftPost, NewDraftPost, PostStatus};
pub use run::RunResult;
pub use settings::WritingSettings;
pub use topic::{Frequency, NewTopic, TopicSubscription};
