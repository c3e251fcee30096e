use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use url::Url;

use crate::models::FeedArticle;

use super::{FeedItem, FeedSource};

/// Fetches a topic's feeds and normalizes their items into candidates.
///
/// Every feed is bounded by its own timeout and a failing feed only loses its
/// own items. Output keeps feed order, then item order within each feed.
pub struct FeedIngester {
    source: Arc<dyn FeedSource>,
    timeout: Duration,
    concurrency: usize,
}

impl FeedIngester {
    pub fn new(source: Arc<dyn FeedSource>, timeout: Duration) -> Self {
        Self {
            source,
            timeout,
            concurrency: 1,
        }
    }

    /// Fetch up to `concurrency` feeds at once. Ordering is unaffected.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn fetch_all(&self, urls: &[String]) -> Vec<FeedArticle> {
        let batches: Vec<Vec<FeedArticle>> = stream::iter(urls)
            .map(|url| self.fetch_one(url))
            .buffered(self.concurrency)
            .collect()
            .await;

        batches.into_iter().flatten().collect()
    }

    async fn fetch_one(&self, url: &str) -> Vec<FeedArticle> {
        match tokio::time::timeout(self.timeout, self.source.parse(url)).await {
            Ok(Ok(feed)) => {
                let total = feed.items.len();
                let name = feed.title.clone().unwrap_or_else(|| url.to_string());
                let articles: Vec<FeedArticle> = feed
                    .items
                    .into_iter()
                    .filter_map(|item| normalize(item, url))
                    .collect();
                tracing::debug!(
                    "Fetched {} articles from {} ({} discarded)",
                    articles.len(),
                    name,
                    total - articles.len()
                );
                articles
            }
            Ok(Err(e)) => {
                tracing::warn!("Failed to fetch RSS feed {}: {}", url, e);
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(
                    "Timed out fetching RSS feed {} after {}s",
                    url,
                    self.timeout.as_secs_f32()
                );
                Vec::new()
            }
        }
    }
}

/// Items need both a title and a link that resolves to an absolute URL.
fn normalize(item: FeedItem, feed_url: &str) -> Option<FeedArticle> {
    let title = item.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())?;
    let link = item.link.map(|l| l.trim().to_string()).filter(|l| !l.is_empty())?;
    let url = resolve_url(&link, feed_url)?;

    Some(FeedArticle {
        title,
        url,
        summary: item.summary.filter(|s| !s.trim().is_empty()),
        published_at: item.published_at,
    })
}

/// Resolve a potentially relative URL against the feed URL
fn resolve_url(href: &str, base_url: &str) -> Option<String> {
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }

    Url::parse(base_url)
        .ok()?
        .join(href)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .map(|u| u.to_string())
}
