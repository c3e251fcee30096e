use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{
    DraftPost, FeedArticle, IngestStatus, IngestedArticle, NewDraftPost, NewTopic, PostStatus,
    TopicSubscription, WritingSettings,
};

use super::schema::SCHEMA;

const TOPIC_COLUMNS: &str = "id, name, keywords, rss_feeds, is_active, frequency, max_per_period, \
     last_run_at, essay_focus, use_keyword_filter, created_at";

// Concurrent runs share the database file; writers wait this long for a lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const POST_COLUMNS: &str =
    "id, title, subtitle, slug, markdown, status, source_url, topic_id, created_at, published_at";

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Topic operations

    pub async fn insert_topic(&self, topic: NewTopic) -> Result<i64> {
        let keywords = serde_json::to_string(&topic.keywords)?;
        let feeds = serde_json::to_string(&topic.rss_feeds)?;
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO topics (name, keywords, rss_feeds, frequency, max_per_period, essay_focus, use_keyword_filter)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
                    params![
                        topic.name,
                        keywords,
                        feeds,
                        topic.frequency.as_str(),
                        topic.max_per_period,
                        topic.essay_focus,
                        topic.use_keyword_filter,
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn get_topic(&self, id: i64) -> Result<Option<TopicSubscription>> {
        let topic = self
            .conn
            .call(move |conn| {
                let sql = format!("SELECT {} FROM topics WHERE id = ?1", TOPIC_COLUMNS);
                let topic = conn
                    .query_row(&sql, params![id], topic_from_row)
                    .optional()?;
                Ok(topic)
            })
            .await?;
        Ok(topic)
    }

    pub async fn get_all_topics(&self) -> Result<Vec<TopicSubscription>> {
        self.query_topics("SELECT {} FROM topics ORDER BY id").await
    }

    pub async fn get_active_topics(&self) -> Result<Vec<TopicSubscription>> {
        self.query_topics("SELECT {} FROM topics WHERE is_active = 1 ORDER BY id")
            .await
    }

    async fn query_topics(&self, template: &'static str) -> Result<Vec<TopicSubscription>> {
        let topics = self
            .conn
            .call(move |conn| {
                let sql = template.replace("{}", TOPIC_COLUMNS);
                let mut stmt = conn.prepare(&sql)?;
                let topics = stmt
                    .query_map([], topic_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(topics)
            })
            .await?;
        Ok(topics)
    }

    /// Returns false when no topic has this id.
    pub async fn set_topic_active(&self, id: i64, is_active: bool) -> Result<bool> {
        let changed = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    "UPDATE topics SET is_active = ?1 WHERE id = ?2",
                    params![is_active, id],
                )?;
                Ok(n > 0)
            })
            .await?;
        Ok(changed)
    }

    pub async fn delete_topic(&self, id: i64) -> Result<bool> {
        let changed = self
            .conn
            .call(move |conn| {
                let n = conn.execute("DELETE FROM topics WHERE id = ?1", params![id])?;
                Ok(n > 0)
            })
            .await?;
        Ok(changed)
    }

    pub async fn update_topic_last_run(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE topics SET last_run_at = ?1 WHERE id = ?2",
                    params![at.to_rfc3339(), id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Ingestion records

    pub async fn get_ingested_urls(&self, topic_id: i64) -> Result<HashSet<String>> {
        let urls = self
            .conn
            .call(move |conn| {
                let mut stmt =
                    conn.prepare("SELECT url FROM ingested_articles WHERE topic_id = ?1")?;
                let urls = stmt
                    .query_map(params![topic_id], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<HashSet<_>, _>>()?;
                Ok(urls)
            })
            .await?;
        Ok(urls)
    }

    /// Records a candidate as pending before generation is attempted.
    pub async fn insert_ingestion(&self, topic_id: i64, article: FeedArticle) -> Result<i64> {
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO ingested_articles (topic_id, url, title, summary, published_at, status)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
                    params![
                        topic_id,
                        article.url,
                        article.title,
                        article.summary,
                        article.published_at.map(|dt| dt.to_rfc3339()),
                        IngestStatus::Pending.as_str(),
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn mark_ingestion_failed(&self, id: i64) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE ingested_articles SET status = ?1 WHERE id = ?2",
                    params![IngestStatus::Failed.as_str(), id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn get_ingestions(&self, topic_id: i64) -> Result<Vec<IngestedArticle>> {
        let records = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT id, topic_id, url, title, summary, published_at, status, post_id, ingested_at
                       FROM ingested_articles WHERE topic_id = ?1 ORDER BY id"#,
                )?;
                let records = stmt
                    .query_map(params![topic_id], ingestion_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(records)
            })
            .await?;
        Ok(records)
    }

    // Post operations

    /// Slugs starting with `prefix`. Slugs never contain LIKE wildcards.
    pub async fn get_slugs_with_prefix(&self, prefix: &str) -> Result<HashSet<String>> {
        let prefix = prefix.to_string();
        let slugs = self
            .conn
            .call(move |conn| {
                let mut stmt =
                    conn.prepare("SELECT slug FROM posts WHERE slug LIKE ?1 || '%'")?;
                let slugs = stmt
                    .query_map(params![prefix], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<HashSet<_>, _>>()?;
                Ok(slugs)
            })
            .await?;
        Ok(slugs)
    }

    #[cfg(test)]
    pub async fn insert_post(&self, post: NewDraftPost) -> Result<i64> {
        let id = self
            .conn
            .call(move |conn| Ok(insert_post_row(conn, &post)?))
            .await?;
        Ok(id)
    }

    /// Persists a generated draft and links the ingestion record to it in one
    /// transaction, so a record is never `generated` without its post.
    pub async fn insert_draft_for_ingestion(
        &self,
        post: NewDraftPost,
        ingestion_id: i64,
    ) -> Result<i64> {
        let id = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let post_id = insert_post_row(&tx, &post)?;
                tx.execute(
                    "UPDATE ingested_articles SET status = ?1, post_id = ?2 WHERE id = ?3",
                    params![IngestStatus::Generated.as_str(), post_id, ingestion_id],
                )?;
                tx.commit()?;
                Ok(post_id)
            })
            .await?;
        Ok(id)
    }

    pub async fn get_posts_for_topic(&self, topic_id: i64) -> Result<Vec<DraftPost>> {
        let posts = self
            .conn
            .call(move |conn| {
                let sql = format!(
                    "SELECT {} FROM posts WHERE topic_id = ?1 ORDER BY id",
                    POST_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let posts = stmt
                    .query_map(params![topic_id], post_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(posts)
            })
            .await?;
        Ok(posts)
    }

    /// Published posts, newest first.
    pub async fn get_published_posts(&self) -> Result<Vec<DraftPost>> {
        let posts = self
            .conn
            .call(|conn| {
                let sql = format!(
                    "SELECT {} FROM posts WHERE status = 'published' ORDER BY published_at DESC NULLS LAST, id DESC",
                    POST_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let posts = stmt
                    .query_map([], post_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(posts)
            })
            .await?;
        Ok(posts)
    }

    // Settings

    pub async fn get_settings(&self) -> Result<WritingSettings> {
        let settings = self
            .conn
            .call(|conn| {
                let settings = conn.query_row(
                    r#"SELECT auto_draft_enabled, default_model, rules, auto_draft_rules,
                              auto_draft_template, auto_draft_word_count
                       FROM settings WHERE id = 1"#,
                    [],
                    |row| {
                        Ok(WritingSettings {
                            auto_draft_enabled: row.get::<_, i64>(0)? != 0,
                            default_model: row.get(1)?,
                            rules: row.get(2)?,
                            auto_draft_rules: row.get(3)?,
                            auto_draft_template: row.get(4)?,
                            auto_draft_word_count: row.get(5)?,
                        })
                    },
                )?;
                Ok(settings)
            })
            .await?;
        Ok(settings)
    }

    pub async fn set_auto_draft_enabled(&self, enabled: bool) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE settings SET auto_draft_enabled = ?1 WHERE id = 1",
                    params![enabled],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn set_default_model(&self, model: Option<String>) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE settings SET default_model = ?1 WHERE id = 1",
                    params![model],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Topic leases

    /// Takes the run lease for a topic. Leases acquired before `stale_before`
    /// are treated as abandoned and replaced.
    pub async fn try_acquire_topic_lease(
        &self,
        topic_id: i64,
        holder: &str,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<bool> {
        let holder = holder.to_string();
        let acquired = self
            .conn
            .call(move |conn| {
                // A deferred read-then-write fails with SQLITE_BUSY under
                // contention; an immediate transaction waits on the busy timeout.
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let current: Option<String> = tx
                    .query_row(
                        "SELECT acquired_at FROM topic_leases WHERE topic_id = ?1",
                        params![topic_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                let is_stale = current
                    .as_deref()
                    .and_then(parse_datetime)
                    .map_or(true, |at| at < stale_before);
                if current.is_some() && !is_stale {
                    return Ok(false);
                }
                tx.execute(
                    "INSERT OR REPLACE INTO topic_leases (topic_id, holder, acquired_at) VALUES (?1, ?2, ?3)",
                    params![topic_id, holder, now.to_rfc3339()],
                )?;
                tx.commit()?;
                Ok(true)
            })
            .await?;
        Ok(acquired)
    }

    #[cfg(test)]
    pub(crate) async fn execute_raw(&self, sql: String) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute_batch(&sql)?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn release_topic_lease(&self, topic_id: i64, holder: &str) -> Result<()> {
        let holder = holder.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "DELETE FROM topic_leases WHERE topic_id = ?1 AND holder = ?2",
                    params![topic_id, holder],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

fn insert_post_row(conn: &rusqlite::Connection, post: &NewDraftPost) -> rusqlite::Result<i64> {
    let published_at = (post.status == PostStatus::Published).then(|| Utc::now().to_rfc3339());
    conn.execute(
        r#"INSERT INTO posts (title, subtitle, slug, markdown, status, source_url, topic_id, published_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
        params![
            post.title,
            post.subtitle,
            post.slug,
            post.markdown,
            post.status.as_str(),
            post.source_url,
            post.topic_id,
            published_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn conversion_error(
    idx: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

fn json_list(row: &Row, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn parsed<T: std::str::FromStr<Err = String>>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e: String| conversion_error(idx, e))
}

fn optional_datetime(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    Ok(row
        .get::<_, Option<String>>(idx)?
        .and_then(|s| parse_datetime(&s)))
}

fn datetime_or_now(row: &Row, idx: usize) -> DateTime<Utc> {
    row.get::<_, String>(idx)
        .ok()
        .and_then(|s| parse_datetime(&s))
        .unwrap_or_else(Utc::now)
}

fn topic_from_row(row: &Row) -> rusqlite::Result<TopicSubscription> {
    Ok(TopicSubscription {
        id: row.get(0)?,
        name: row.get(1)?,
        keywords: json_list(row, 2)?,
        rss_feeds: json_list(row, 3)?,
        is_active: row.get::<_, i64>(4)? != 0,
        frequency: parsed(row, 5)?,
        max_per_period: row.get(6)?,
        last_run_at: optional_datetime(row, 7)?,
        essay_focus: row.get(8)?,
        use_keyword_filter: row.get::<_, i64>(9)? != 0,
        created_at: datetime_or_now(row, 10),
    })
}

fn ingestion_from_row(row: &Row) -> rusqlite::Result<IngestedArticle> {
    Ok(IngestedArticle {
        id: row.get(0)?,
        topic_id: row.get(1)?,
        url: row.get(2)?,
        title: row.get(3)?,
        summary: row.get(4)?,
        published_at: optional_datetime(row, 5)?,
        status: parsed(row, 6)?,
        post_id: row.get(7)?,
        ingested_at: datetime_or_now(row, 8),
    })
}

fn post_from_row(row: &Row) -> rusqlite::Result<DraftPost> {
    Ok(DraftPost {
        id: row.get(0)?,
        title: row.get(1)?,
        subtitle: row.get(2)?,
        slug: row.get(3)?,
        markdown: row.get(4)?,
        status: parsed(row, 5)?,
        source_url: row.get(6)?,
        topic_id: row.get(7)?,
        created_at: datetime_or_now(row, 8),
        published_at: optional_datetime(row, 9)?,
    })
}
