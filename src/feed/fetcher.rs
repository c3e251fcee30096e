use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feed_rs::parser;
use reqwest::Client;

use crate::error::{AppError, Result};

/// A raw feed as returned by a feed provider, before normalization.
#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub items: Vec<FeedItem>,
}

#[derive(Debug, Clone, Default)]
pub struct FeedItem {
    pub title: Option<String>,
    pub link: Option<String>,
    pub summary: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Fetches and parses one feed. No retry contract: callers decide what a
/// failure means.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn parse(&self, url: &str) -> Result<ParsedFeed>;
}

pub struct HttpFeedSource {
    client: Client,
}

impl HttpFeedSource {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn parse(&self, url: &str) -> Result<ParsedFeed> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(AppError::Feed(format!("HTTP {} from {}", response.status(), url)));
        }

        let bytes = response.bytes().await?;
        let feed = parser::parse(&bytes[..])?;

        let items = feed
            .entries
            .into_iter()
            .map(|entry| {
                // Prefer the short summary, fall back to full content
                let html = entry
                    .summary
                    .as_ref()
                    .map(|s| s.content.as_str())
                    .or_else(|| entry.content.as_ref().and_then(|c| c.body.as_deref()));

                FeedItem {
                    title: entry.title.map(|t| t.content),
                    link: entry.links.first().map(|l| l.href.clone()),
                    summary: html.and_then(html_to_text),
                    published_at: entry.published.or(entry.updated),
                }
            })
            .collect();

        Ok(ParsedFeed {
            title: feed.title.map(|t| t.content),
            items,
        })
    }
}

/// Flattens feed HTML to a single line of plain text.
fn html_to_text(html: &str) -> Option<String> {
    let text = html2text::from_read(html.as_bytes(), 80).ok()?;
    let cleaned = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    (!cleaned.is_empty()).then_some(cleaned)
}
