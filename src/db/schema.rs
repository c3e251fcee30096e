pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- topics table
CREATE TABLE IF NOT EXISTS topics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    keywords TEXT NOT NULL DEFAULT '[]',
    rss_feeds TEXT NOT NULL DEFAULT '[]',
    is_active INTEGER NOT NULL DEFAULT 1,
    frequency TEXT NOT NULL DEFAULT 'daily',
    max_per_period INTEGER NOT NULL DEFAULT 3,
    last_run_at TEXT,
    essay_focus TEXT,
    use_keyword_filter INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_topics_is_active ON topics(is_active);

-- posts table
CREATE TABLE IF NOT EXISTS posts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    subtitle TEXT,
    slug TEXT NOT NULL UNIQUE,
    markdown TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT 'draft',
    source_url TEXT,
    topic_id INTEGER REFERENCES topics(id) ON DELETE SET NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    published_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_posts_status ON posts(status);
CREATE INDEX IF NOT EXISTS idx_posts_published_at ON posts(published_at DESC);

-- ingested_articles table (one row per url considered for a topic)
CREATE TABLE IF NOT EXISTS ingested_articles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    topic_id INTEGER NOT NULL REFERENCES topics(id) ON DELETE CASCADE,
    url TEXT NOT NULL,
    title TEXT NOT NULL,
    summary TEXT,
    published_at TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    post_id INTEGER REFERENCES posts(id) ON DELETE SET NULL,
    ingested_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(topic_id, url)
);

CREATE INDEX IF NOT EXISTS idx_ingested_topic_url ON ingested_articles(topic_id, url);

-- settings table (singleton row)
CREATE TABLE IF NOT EXISTS settings (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    auto_draft_enabled INTEGER NOT NULL DEFAULT 0,
    default_model TEXT,
    rules TEXT NOT NULL DEFAULT '',
    auto_draft_rules TEXT NOT NULL DEFAULT '',
    auto_draft_template TEXT,
    auto_draft_word_count INTEGER NOT NULL DEFAULT 800
);

INSERT OR IGNORE INTO settings (id) VALUES (1);

-- topic_leases table (guards against concurrent runs of one topic)
CREATE TABLE IF NOT EXISTS topic_leases (
    topic_id INTEGER PRIMARY KEY REFERENCES topics(id) ON DELETE CASCADE,
    holder TEXT NOT NULL,
    acquired_at TEXT NOT NULL
);
"#;
