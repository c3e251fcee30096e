use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::ai::DraftGenerator;
use crate::db::Repository;
use crate::error::Result;
use crate::feed::FeedIngester;
use crate::models::{FeedArticle, NewDraftPost, PostStatus, RunResult, TopicSubscription};

use super::dedup::dedupe;
use super::filter::filter_by_keywords;
use super::schedule::is_due;
use super::slug::{allocate_slug, base_slug, probe_prefix};

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Set `failed` on ingestion records whose generation failed. Off keeps
    /// them `pending`.
    pub mark_failed_ingestions: bool,
    /// How long a topic lease is honored before another run may take it.
    pub lease_ttl: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            mark_failed_ingestions: false,
            lease_ttl: Duration::minutes(30),
        }
    }
}

/// One invocation of the pipeline.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// The global auto-draft toggle, read by the caller.
    pub enabled: bool,
    /// Restrict the run to one active topic.
    pub topic_id: Option<i64>,
    /// Ignore each topic's schedule.
    pub force: bool,
}

/// Drives ingestion and draft generation for topic subscriptions.
///
/// Topics run one after another. Failures are contained at the smallest
/// unit possible: one feed, one candidate, or one topic.
pub struct Pipeline {
    repository: Arc<Repository>,
    ingester: FeedIngester,
    generator: DraftGenerator,
    options: PipelineOptions,
    lease_holder: String,
}

impl Pipeline {
    pub fn new(
        repository: Arc<Repository>,
        ingester: FeedIngester,
        generator: DraftGenerator,
        options: PipelineOptions,
    ) -> Self {
        let lease_holder = format!("{}-{}", std::process::id(), Utc::now().timestamp_millis());
        Self {
            repository,
            ingester,
            generator,
            options,
            lease_holder,
        }
    }

    /// Runs every due topic (or just `topic_id`) and reports one result per
    /// topic that was attempted. Topics that were not due, or whose lease is
    /// held by another run, are absent from the output. Only a store failure
    /// while resolving topics is returned as an error.
    pub async fn run(&self, request: RunRequest) -> Result<Vec<RunResult>> {
        if !request.enabled {
            tracing::info!("Auto-draft is disabled, nothing to do");
            return Ok(Vec::new());
        }

        let topics = self.resolve_topics(request.topic_id).await?;
        let mut results = Vec::with_capacity(topics.len());

        for topic in topics {
            if !request.force && !is_due(&topic, Utc::now()) {
                tracing::debug!("Topic {} ({}) is not due", topic.id, topic.name);
                continue;
            }

            match self.run_topic_exclusive(&topic, request.force).await {
                Ok(Some(result)) => {
                    tracing::info!(
                        "{}: generated {}, skipped {}",
                        result.topic_name,
                        result.generated,
                        result.skipped
                    );
                    results.push(result);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!("Auto-draft failed for topic {} ({}): {}", topic.id, topic.name, e);
                    results.push(RunResult::empty(topic.id, &topic.name));
                }
            }
        }

        Ok(results)
    }

    async fn resolve_topics(&self, topic_id: Option<i64>) -> Result<Vec<TopicSubscription>> {
        match topic_id {
            Some(id) => {
                let topic = self.repository.get_topic(id).await?;
                match topic {
                    Some(topic) if topic.is_active => Ok(vec![topic]),
                    Some(_) => {
                        tracing::info!("Topic {} is inactive", id);
                        Ok(Vec::new())
                    }
                    None => {
                        tracing::info!("Topic {} not found", id);
                        Ok(Vec::new())
                    }
                }
            }
            None => self.repository.get_active_topics().await,
        }
    }

    /// `None` when another run holds this topic's lease, or finished the
    /// topic after the topic list was read.
    async fn run_topic_exclusive(
        &self,
        topic: &TopicSubscription,
        force: bool,
    ) -> Result<Option<RunResult>> {
        let now = Utc::now();
        let acquired = self
            .repository
            .try_acquire_topic_lease(topic.id, &self.lease_holder, now, now - self.options.lease_ttl)
            .await?;
        if !acquired {
            tracing::warn!(
                "Topic {} ({}) is already being processed, skipping",
                topic.id,
                topic.name
            );
            return Ok(None);
        }

        let result = self.run_topic_if_still_due(topic.id, force).await;

        if let Err(e) = self
            .repository
            .release_topic_lease(topic.id, &self.lease_holder)
            .await
        {
            tracing::warn!("Failed to release lease for topic {}: {}", topic.id, e);
        }

        result
    }

    // The schedule check is repeated under the lease against fresh state.
    async fn run_topic_if_still_due(&self, topic_id: i64, force: bool) -> Result<Option<RunResult>> {
        let topic = match self.repository.get_topic(topic_id).await? {
            Some(topic) if topic.is_active => topic,
            _ => {
                tracing::info!("Topic {} was removed or paused, skipping", topic_id);
                return Ok(None);
            }
        };
        if !force && !is_due(&topic, Utc::now()) {
            tracing::info!(
                "Topic {} ({}) was already run by another invocation, skipping",
                topic.id,
                topic.name
            );
            return Ok(None);
        }

        self.run_topic(&topic).await.map(Some)
    }

    async fn run_topic(&self, topic: &TopicSubscription) -> Result<RunResult> {
        let articles = self.ingester.fetch_all(&topic.rss_feeds).await;
        let fetched = articles.len();

        let relevant = filter_by_keywords(articles, &topic.keywords, topic.use_keyword_filter);
        let seen = self.repository.get_ingested_urls(topic.id).await?;
        let candidates = dedupe(relevant, &seen);
        let eligible = candidates.len();

        tracing::debug!(
            "Topic {}: {} fetched, {} new candidates, cap {}",
            topic.name,
            fetched,
            eligible,
            topic.max_per_period
        );

        let mut generated = 0;
        for article in candidates.into_iter().take(topic.max_per_period as usize) {
            let url = article.url.clone();
            match self.process_candidate(topic, article).await {
                Ok(post_id) => {
                    tracing::debug!("Created draft {} from {}", post_id, url);
                    generated += 1;
                }
                Err(e) => {
                    tracing::warn!("Failed to generate draft for {} ({}): {}", url, topic.name, e);
                }
            }
        }

        // Advance the schedule even when nothing succeeded, so a broken feed
        // is not retried on every invocation.
        self.repository
            .update_topic_last_run(topic.id, Utc::now())
            .await?;

        Ok(RunResult {
            topic_id: topic.id,
            topic_name: topic.name.clone(),
            generated,
            skipped: eligible - generated,
        })
    }

    /// Records the candidate, then generates and stores its draft. A failure
    /// after the record exists leaves the record in place.
    async fn process_candidate(&self, topic: &TopicSubscription, article: FeedArticle) -> Result<i64> {
        let ingestion_id = self
            .repository
            .insert_ingestion(topic.id, article.clone())
            .await?;

        match self.generate_draft(topic, &article, ingestion_id).await {
            Ok(post_id) => Ok(post_id),
            Err(e) => {
                if self.options.mark_failed_ingestions {
                    if let Err(mark_err) = self.repository.mark_ingestion_failed(ingestion_id).await {
                        tracing::warn!("Failed to mark ingestion {} failed: {}", ingestion_id, mark_err);
                    }
                }
                Err(e)
            }
        }
    }

    async fn generate_draft(
        &self,
        topic: &TopicSubscription,
        article: &FeedArticle,
        ingestion_id: i64,
    ) -> Result<i64> {
        let draft = self
            .generator
            .generate(article, &topic.name, topic.essay_focus.as_deref())
            .await?;

        let base = base_slug(&draft.title);
        let taken = self.repository.get_slugs_with_prefix(probe_prefix(&base)).await?;
        let slug = allocate_slug(&draft.title, |s| taken.contains(s), Utc::now());

        let post = NewDraftPost {
            title: draft.title,
            subtitle: draft.subtitle,
            slug,
            markdown: draft.body,
            status: PostStatus::Suggested,
            source_url: Some(article.url.clone()),
            topic_id: Some(topic.id),
        };

        self.repository
            .insert_draft_for_ingestion(post, ingestion_id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration as StdDuration;

    use async_trait::async_trait;

    use super::*;
    use crate::ai::test_support::FakeGenerator;
    use crate::db::test_support::{new_topic, test_repository};
    use crate::error::AppError;
    use crate::feed::{FeedItem, FeedSource, ParsedFeed};
    use crate::models::{Frequency, IngestStatus};

    type SideEffects = Arc<Mutex<HashMap<String, String>>>;

    /// Serves canned items per feed URL. A side effect registered for a URL
    /// is run as SQL against the store while that feed is being fetched.
    struct FakeFeeds {
        feeds: HashMap<String, Option<Vec<(String, String)>>>,
        store: Arc<Repository>,
        side_effects: SideEffects,
    }

    #[async_trait]
    impl FeedSource for FakeFeeds {
        async fn parse(&self, url: &str) -> Result<ParsedFeed> {
            let side_effect = self.side_effects.lock().unwrap().get(url).cloned();
            if let Some(sql) = side_effect {
                self.store.execute_raw(sql).await.unwrap();
            }

            match self.feeds.get(url) {
                Some(Some(items)) => Ok(ParsedFeed {
                    title: None,
                    items: items
                        .iter()
                        .map(|(title, link)| FeedItem {
                            title: Some(title.clone()),
                            link: Some(link.clone()),
                            summary: Some(format!("About {}", title)),
                            published_at: None,
                        })
                        .collect(),
                }),
                _ => Err(AppError::Other(anyhow::anyhow!("feed unavailable: {}", url))),
            }
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        repo: Arc<Repository>,
        llm: Arc<FakeGenerator>,
        side_effects: SideEffects,
        pipeline: Pipeline,
    }

    async fn harness(
        feeds: Vec<(&str, Option<Vec<(&str, &str)>>)>,
        llm: FakeGenerator,
        options: PipelineOptions,
    ) -> Harness {
        let (dir, repo) = test_repository().await;
        let repo = Arc::new(repo);
        repo.set_default_model(Some("claude-sonnet".into())).await.unwrap();

        let side_effects = SideEffects::default();
        let feeds = FakeFeeds {
            feeds: feeds
                .into_iter()
                .map(|(url, items)| {
                    let items: Option<Vec<(String, String)>> = items.map(|items| {
                        items
                            .into_iter()
                            .map(|(t, l)| (t.to_string(), l.to_string()))
                            .collect()
                    });
                    (url.to_string(), items)
                })
                .collect(),
            store: repo.clone(),
            side_effects: side_effects.clone(),
        };
        let llm = Arc::new(llm);
        let ingester = FeedIngester::new(Arc::new(feeds), StdDuration::from_secs(5));
        let generator =
            DraftGenerator::new(llm.clone(), repo.clone(), 4096, StdDuration::from_secs(5));
        let pipeline = Pipeline::new(repo.clone(), ingester, generator, options);

        Harness {
            _dir: dir,
            repo,
            llm,
            side_effects,
            pipeline,
        }
    }

    fn two_feeds() -> Vec<(&'static str, Option<Vec<(&'static str, &'static str)>>)> {
        vec![
            ("https://a/rss", Some(vec![("X", "https://a/u1")])),
            ("https://b/rss", Some(vec![("Y", "https://b/u2")])),
        ]
    }

    fn replies(n: usize) -> FakeGenerator {
        FakeGenerator::replying(
            (0..n)
                .map(|i| Ok(format!("# Essay {}\n*Sub {}*\n\nBody {}", i, i, i)))
                .collect(),
        )
    }

    fn enabled(topic_id: Option<i64>, force: bool) -> RunRequest {
        RunRequest {
            enabled: true,
            topic_id,
            force,
        }
    }

    #[tokio::test]
    async fn end_to_end_generates_linked_drafts() {
        let h = harness(two_feeds(), replies(2), PipelineOptions::default()).await;
        let topic_id = h
            .repo
            .insert_topic(new_topic("News", &["https://a/rss", "https://b/rss"]))
            .await
            .unwrap();
        let before = Utc::now();

        let results = h.pipeline.run(enabled(Some(topic_id), false)).await.unwrap();

        assert_eq!(
            results,
            vec![RunResult {
                topic_id,
                topic_name: "News".into(),
                generated: 2,
                skipped: 0
            }]
        );

        let posts = h.repo.get_posts_for_topic(topic_id).await.unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].source_url.as_deref(), Some("https://a/u1"));
        assert_eq!(posts[1].source_url.as_deref(), Some("https://b/u2"));
        assert!(posts.iter().all(|p| p.status == PostStatus::Suggested));
        assert_eq!(posts[0].title, "Essay 0");
        assert_eq!(posts[0].subtitle.as_deref(), Some("Sub 0"));
        assert_eq!(posts[0].slug, "essay-0");

        let records = h.repo.get_ingestions(topic_id).await.unwrap();
        assert_eq!(records.len(), 2);
        for (record, post) in records.iter().zip(&posts) {
            assert_eq!(record.status, IngestStatus::Generated);
            assert_eq!(record.post_id, Some(post.id));
        }

        let topic = h.repo.get_topic(topic_id).await.unwrap().unwrap();
        let last_run = topic.last_run_at.unwrap();
        assert!(last_run.timestamp() >= before.timestamp());
        assert!(last_run <= Utc::now());
    }

    #[tokio::test]
    async fn previously_ingested_url_is_not_regenerated() {
        let h = harness(two_feeds(), replies(1), PipelineOptions::default()).await;
        let topic_id = h
            .repo
            .insert_topic(new_topic("News", &["https://a/rss", "https://b/rss"]))
            .await
            .unwrap();
        h.repo
            .insert_ingestion(
                topic_id,
                FeedArticle {
                    title: "X".into(),
                    url: "https://a/u1".into(),
                    summary: None,
                    published_at: None,
                },
            )
            .await
            .unwrap();

        let results = h.pipeline.run(enabled(Some(topic_id), false)).await.unwrap();

        assert_eq!(results[0].generated, 1);
        assert_eq!(results[0].skipped, 0);
        assert_eq!(h.llm.call_count(), 1);
        let posts = h.repo.get_posts_for_topic(topic_id).await.unwrap();
        assert_eq!(posts[0].source_url.as_deref(), Some("https://b/u2"));
    }

    #[tokio::test]
    async fn disabled_toggle_returns_nothing_and_writes_nothing() {
        let h = harness(two_feeds(), replies(2), PipelineOptions::default()).await;
        let topic_id = h
            .repo
            .insert_topic(new_topic("News", &["https://a/rss", "https://b/rss"]))
            .await
            .unwrap();

        let results = h
            .pipeline
            .run(RunRequest {
                enabled: false,
                topic_id: None,
                force: true,
            })
            .await
            .unwrap();

        assert!(results.is_empty());
        assert_eq!(h.llm.call_count(), 0);
        assert!(h.repo.get_ingestions(topic_id).await.unwrap().is_empty());
        let topic = h.repo.get_topic(topic_id).await.unwrap().unwrap();
        assert!(topic.last_run_at.is_none());
    }

    #[tokio::test]
    async fn cap_limits_generation_attempts() {
        let items: Vec<(String, String)> = (0..10)
            .map(|i| (format!("Story {}", i), format!("https://a/{}", i)))
            .collect();
        let items: Vec<(&str, &str)> = items.iter().map(|(t, l)| (t.as_str(), l.as_str())).collect();
        let h = harness(
            vec![("https://a/rss", Some(items))],
            replies(10),
            PipelineOptions::default(),
        )
        .await;
        let topic_id = h
            .repo
            .insert_topic(new_topic("News", &["https://a/rss"]))
            .await
            .unwrap();

        let results = h.pipeline.run(enabled(None, false)).await.unwrap();

        assert_eq!(h.llm.call_count(), 2);
        assert_eq!(results[0].generated, 2);
        assert_eq!(results[0].skipped, 8);
        // Candidates beyond the cap are not recorded, so they stay eligible.
        let urls: Vec<String> = h
            .repo
            .get_ingestions(topic_id)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.url)
            .collect();
        assert_eq!(urls, vec!["https://a/0", "https://a/1"]);
    }

    #[tokio::test]
    async fn keyword_filter_applies_when_enabled() {
        let h = harness(
            vec![(
                "https://a/rss",
                Some(vec![("Rust news", "https://a/1"), ("Cooking", "https://a/2")]),
            )],
            replies(2),
            PipelineOptions::default(),
        )
        .await;
        let mut topic = new_topic("Rust", &["https://a/rss"]);
        topic.keywords = vec!["rust".into()];
        topic.use_keyword_filter = true;
        let topic_id = h.repo.insert_topic(topic).await.unwrap();

        let results = h.pipeline.run(enabled(Some(topic_id), false)).await.unwrap();

        assert_eq!(results[0].generated, 1);
        assert_eq!(results[0].skipped, 0);
        assert!(h.llm.calls.lock().unwrap()[0].1.contains("ARTICLE TITLE: Rust news"));
    }

    #[tokio::test]
    async fn failed_generation_is_isolated_and_left_pending() {
        let llm = FakeGenerator::replying(vec![
            Ok("# First\n\nBody".into()),
            Err(AppError::Generation("rate limited".into())),
            Ok("# Third\n\nBody".into()),
        ]);
        let h = harness(
            vec![(
                "https://a/rss",
                Some(vec![("A", "https://a/1"), ("B", "https://a/2"), ("C", "https://a/3")]),
            )],
            llm,
            PipelineOptions::default(),
        )
        .await;
        let mut topic = new_topic("News", &["https://a/rss"]);
        topic.max_per_period = 5;
        let topic_id = h.repo.insert_topic(topic).await.unwrap();

        let results = h.pipeline.run(enabled(Some(topic_id), false)).await.unwrap();

        assert_eq!(results[0].generated, 2);
        assert_eq!(results[0].skipped, 1);
        let records = h.repo.get_ingestions(topic_id).await.unwrap();
        assert_eq!(records[1].url, "https://a/2");
        assert_eq!(records[1].status, IngestStatus::Pending);
        assert_eq!(records[1].post_id, None);
        let topic = h.repo.get_topic(topic_id).await.unwrap().unwrap();
        assert!(topic.last_run_at.is_some());
    }

    #[tokio::test]
    async fn failed_generation_can_be_marked_failed() {
        let llm = FakeGenerator::replying(vec![Err(AppError::Generation("boom".into()))]);
        let options = PipelineOptions {
            mark_failed_ingestions: true,
            ..Default::default()
        };
        let h = harness(vec![("https://a/rss", Some(vec![("A", "https://a/1")]))], llm, options).await;
        let topic_id = h
            .repo
            .insert_topic(new_topic("News", &["https://a/rss"]))
            .await
            .unwrap();

        h.pipeline.run(enabled(Some(topic_id), false)).await.unwrap();

        let records = h.repo.get_ingestions(topic_id).await.unwrap();
        assert_eq!(records[0].status, IngestStatus::Failed);
    }

    #[tokio::test]
    async fn broken_feed_still_advances_schedule() {
        let h = harness(
            vec![
                ("https://a/rss", Some(vec![("A", "https://a/1")])),
                ("https://broken/rss", None),
                ("https://c/rss", Some(vec![("C", "https://c/1")])),
            ],
            replies(2),
            PipelineOptions::default(),
        )
        .await;
        let mut all_broken = new_topic("Broken", &["https://broken/rss"]);
        all_broken.frequency = Frequency::Weekly;
        let broken_id = h.repo.insert_topic(all_broken).await.unwrap();
        let mixed = new_topic("Mixed", &["https://a/rss", "https://broken/rss", "https://c/rss"]);
        let mixed_id = h.repo.insert_topic(mixed).await.unwrap();

        let results = h.pipeline.run(enabled(None, false)).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0], RunResult::empty(broken_id, "Broken"));
        assert_eq!(results[1].generated, 2);
        let posts = h.repo.get_posts_for_topic(mixed_id).await.unwrap();
        let sources: Vec<_> = posts.iter().filter_map(|p| p.source_url.as_deref()).collect();
        assert_eq!(sources, vec!["https://a/1", "https://c/1"]);

        let broken = h.repo.get_topic(broken_id).await.unwrap().unwrap();
        assert!(broken.last_run_at.is_some());
    }

    #[tokio::test]
    async fn schedule_gates_unforced_runs() {
        let h = harness(two_feeds(), replies(4), PipelineOptions::default()).await;
        let mut manual = new_topic("Manual", &["https://a/rss"]);
        manual.frequency = Frequency::Manual;
        let manual_id = h.repo.insert_topic(manual).await.unwrap();
        let recent_id = h
            .repo
            .insert_topic(new_topic("Recent", &["https://b/rss"]))
            .await
            .unwrap();
        h.repo
            .update_topic_last_run(recent_id, Utc::now() - Duration::hours(1))
            .await
            .unwrap();

        let results = h.pipeline.run(enabled(None, false)).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(h.llm.call_count(), 0);
        let manual = h.repo.get_topic(manual_id).await.unwrap().unwrap();
        assert!(manual.last_run_at.is_none());

        let results = h.pipeline.run(enabled(None, true)).await.unwrap();
        let ids: Vec<i64> = results.iter().map(|r| r.topic_id).collect();
        assert_eq!(ids, vec![manual_id, recent_id]);
        assert_eq!(h.llm.call_count(), 2);
    }

    #[tokio::test]
    async fn unknown_or_inactive_topic_yields_empty_result() {
        let h = harness(two_feeds(), replies(2), PipelineOptions::default()).await;
        let topic_id = h
            .repo
            .insert_topic(new_topic("News", &["https://a/rss"]))
            .await
            .unwrap();
        h.repo.set_topic_active(topic_id, false).await.unwrap();

        assert!(h.pipeline.run(enabled(Some(topic_id), true)).await.unwrap().is_empty());
        assert!(h.pipeline.run(enabled(Some(9999), true)).await.unwrap().is_empty());
        assert!(h.pipeline.run(enabled(None, true)).await.unwrap().is_empty());
        assert_eq!(h.llm.call_count(), 0);
    }

    #[tokio::test]
    async fn same_generated_title_gets_distinct_slugs() {
        let llm = FakeGenerator::replying(vec![
            Ok("# My Post\n\nOne".into()),
            Ok("# My Post\n\nTwo".into()),
        ]);
        let h = harness(two_feeds(), llm, PipelineOptions::default()).await;
        let topic_id = h
            .repo
            .insert_topic(new_topic("News", &["https://a/rss", "https://b/rss"]))
            .await
            .unwrap();

        h.pipeline.run(enabled(Some(topic_id), false)).await.unwrap();

        let slugs: Vec<String> = h
            .repo
            .get_posts_for_topic(topic_id)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.slug)
            .collect();
        assert_eq!(slugs, vec!["my-post", "my-post-2"]);
    }

    #[tokio::test]
    async fn held_lease_skips_topic() {
        let h = harness(two_feeds(), replies(2), PipelineOptions::default()).await;
        let topic_id = h
            .repo
            .insert_topic(new_topic("News", &["https://a/rss"]))
            .await
            .unwrap();
        let now = Utc::now();
        h.repo
            .try_acquire_topic_lease(topic_id, "other-run", now, now - Duration::minutes(30))
            .await
            .unwrap();

        let results = h.pipeline.run(enabled(Some(topic_id), true)).await.unwrap();

        assert!(results.is_empty());
        assert_eq!(h.llm.call_count(), 0);
        let topic = h.repo.get_topic(topic_id).await.unwrap().unwrap();
        assert!(topic.last_run_at.is_none());

        // The lease is released after a completed run.
        h.repo.release_topic_lease(topic_id, "other-run").await.unwrap();
        assert_eq!(h.pipeline.run(enabled(Some(topic_id), true)).await.unwrap().len(), 1);
        assert!(h
            .repo
            .try_acquire_topic_lease(topic_id, "third", Utc::now(), Utc::now() - Duration::minutes(30))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn missing_model_fails_each_article_but_not_the_topic() {
        let h = harness(two_feeds(), replies(2), PipelineOptions::default()).await;
        h.repo.set_default_model(None).await.unwrap();
        let topic_id = h
            .repo
            .insert_topic(new_topic("News", &["https://a/rss", "https://b/rss"]))
            .await
            .unwrap();

        let results = h.pipeline.run(enabled(Some(topic_id), false)).await.unwrap();

        assert_eq!(results[0].generated, 0);
        assert_eq!(results[0].skipped, 2);
        assert_eq!(h.llm.call_count(), 0);
        assert_eq!(h.repo.get_ingestions(topic_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failing_topic_reports_empty_result_and_later_topics_still_run() {
        let h = harness(two_feeds(), replies(1), PipelineOptions::default()).await;
        let broken_id = h
            .repo
            .insert_topic(new_topic("Broken", &["https://a/rss"]))
            .await
            .unwrap();
        let healthy_id = h
            .repo
            .insert_topic(new_topic("Healthy", &["https://b/rss"]))
            .await
            .unwrap();
        // The ingestion table vanishes while the first topic fetches and
        // comes back while the second one does.
        {
            let mut effects = h.side_effects.lock().unwrap();
            effects.insert(
                "https://a/rss".into(),
                "ALTER TABLE ingested_articles RENAME TO ingested_articles_hidden".into(),
            );
            effects.insert(
                "https://b/rss".into(),
                "ALTER TABLE ingested_articles_hidden RENAME TO ingested_articles".into(),
            );
        }

        let results = h.pipeline.run(enabled(None, false)).await.unwrap();

        assert_eq!(
            results,
            vec![
                RunResult::empty(broken_id, "Broken"),
                RunResult {
                    topic_id: healthy_id,
                    topic_name: "Healthy".into(),
                    generated: 1,
                    skipped: 0
                }
            ]
        );
        let broken = h.repo.get_topic(broken_id).await.unwrap().unwrap();
        assert!(broken.last_run_at.is_none());
        let now = Utc::now();
        assert!(h
            .repo
            .try_acquire_topic_lease(broken_id, "next-run", now, now - Duration::minutes(30))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn topic_finished_by_another_run_after_listing_is_skipped() {
        let h = harness(two_feeds(), replies(2), PipelineOptions::default()).await;
        let first_id = h
            .repo
            .insert_topic(new_topic("First", &["https://a/rss"]))
            .await
            .unwrap();
        let second_id = h
            .repo
            .insert_topic(new_topic("Second", &["https://b/rss"]))
            .await
            .unwrap();
        // Another invocation completes the second topic while this run is
        // still busy with the first.
        h.side_effects.lock().unwrap().insert(
            "https://a/rss".into(),
            format!(
                "UPDATE topics SET last_run_at = '{}' WHERE id = {}",
                Utc::now().to_rfc3339(),
                second_id
            ),
        );

        let results = h.pipeline.run(enabled(None, false)).await.unwrap();

        let ids: Vec<i64> = results.iter().map(|r| r.topic_id).collect();
        assert_eq!(ids, vec![first_id]);
        assert_eq!(h.llm.call_count(), 1);
        assert!(h.repo.get_posts_for_topic(second_id).await.unwrap().is_empty());
    }
}
