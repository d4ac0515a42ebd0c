//! SQL migration definitions for the Newsdesk database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: content_items",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Ingested articles. Rows are write-once.
CREATE TABLE IF NOT EXISTS content_items (
    id               TEXT PRIMARY KEY,
    source_name      TEXT NOT NULL,
    category         TEXT NOT NULL,
    headline         TEXT NOT NULL,
    body             TEXT NOT NULL,
    image_link       TEXT NOT NULL DEFAULT '',
    source_link      TEXT NOT NULL,
    meta_description TEXT NOT NULL DEFAULT '',
    summary          TEXT NOT NULL DEFAULT '',
    bullet_points    TEXT NOT NULL DEFAULT '[]',
    meta_keywords    TEXT NOT NULL DEFAULT '',
    published_at     TEXT NOT NULL,
    content_hash     TEXT NOT NULL DEFAULT '',
    ingested_at      TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_content_items_category ON content_items(category);
CREATE INDEX IF NOT EXISTS idx_content_items_published ON content_items(published_at);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Sync run history",
            sql: r#"
CREATE TABLE IF NOT EXISTS sync_runs (
    id          TEXT PRIMARY KEY,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    stats_json  TEXT
);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}
