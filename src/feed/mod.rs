mod fetcher;
mod ingester;

pub use fetcher::{FeedItem, FeedSource, HttpFeedSource, ParsedFeed};
pub use ingester::FeedIngester;
