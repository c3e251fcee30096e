use std::collections::HashSet;

use crate::models::FeedArticle;

/// Drops articles whose URL is already in this topic's ingestion history,
/// plus repeats of a URL within the batch. URLs compare as raw strings.
pub fn dedupe(articles: Vec<FeedArticle>, seen_urls: &HashSet<String>) -> Vec<FeedArticle> {
    let mut batch = HashSet::new();
    articles
        .into_iter()
        .filter(|a| !seen_urls.contains(&a.url) && batch.insert(a.url.clone()))
        .collect()
}
