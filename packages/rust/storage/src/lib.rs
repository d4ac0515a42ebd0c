//! libSQL storage layer for ingested content.
//!
//! The [`Storage`] struct wraps a local libSQL database holding content items
//! and sync run history. It implements [`ContentStore`], the seam the
//! ingestion pipeline writes through; [`MemoryStore`] is the in-memory
//! implementation used in tests.
//!
//! **Access rules:**
//! - `newsdesk sync`: read-write (sole writer) via [`Storage::open`]
//! - Reporting commands: read-only via [`Storage::open_readonly`]

mod memory;
mod migrations;
mod store;

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database, params};
use newsdesk_shared::{ContentItem, NewsdeskError, Result};
use uuid::Uuid;

pub use memory::MemoryStore;
pub use store::{ContentStore, DEFAULT_ITEM_LIMIT};

use store::effective_limit;

fn storage_err(e: libsql::Error) -> NewsdeskError {
    NewsdeskError::Storage(e.to_string())
}

/// Drain a row stream, surfacing a failed step instead of ending early.
async fn collect_rows<T>(
    rows: &mut libsql::Rows,
    mut map: impl FnMut(&libsql::Row) -> Result<T>,
) -> Result<Vec<T>> {
    let mut out = Vec::new();
    while let Some(row) = rows.next().await.map_err(storage_err)? {
        out.push(map(&row)?);
    }
    Ok(out)
}

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| NewsdeskError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(NewsdeskError::Storage(format!(
                "no database at {}; run `newsdesk sync` first",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        NewsdeskError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(NewsdeskError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Content item operations
// ---------------------------------------------------------------------------

#[async_trait]
impl ContentStore for Storage {
    async fn find_existing(&self, ids: &[String]) -> Result<HashSet<String>> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }

        // One statement regardless of batch size: ids travel as a JSON array.
        let ids_json = serde_json::to_string(ids)
            .map_err(|e| NewsdeskError::Storage(format!("encode id list: {e}")))?;
        let mut rows = self
            .conn
            .query(
                "SELECT id FROM content_items WHERE id IN (SELECT value FROM json_each(?1))",
                params![ids_json],
            )
            .await
            .map_err(storage_err)?;

        let found = collect_rows(&mut rows, |row| row.get::<String>(0).map_err(storage_err)).await?;
        Ok(found.into_iter().collect())
    }

    async fn add_batch(&self, items: &[ContentItem]) -> Result<usize> {
        self.check_writable()?;
        if items.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.transaction().await.map_err(storage_err)?;
        match insert_new_items(&tx, items).await {
            Ok(inserted) => {
                tx.commit().await.map_err(storage_err)?;
                tracing::debug!(inserted, batch = items.len(), "batch committed");
                Ok(inserted)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn get_items(&self, category: &str, limit: usize) -> Result<Vec<ContentItem>> {
        let limit = effective_limit(limit) as i64;
        let mut rows = self
            .conn
            .query(
                "SELECT id, source_name, category, headline, body, image_link, source_link,
                        meta_description, summary, bullet_points, meta_keywords, published_at,
                        content_hash
                 FROM content_items
                 WHERE ?1 = '' OR category = ?1
                 ORDER BY published_at DESC, id
                 LIMIT ?2",
                params![category, limit],
            )
            .await
            .map_err(storage_err)?;

        collect_rows(&mut rows, row_to_item).await
    }

    async fn get_categories(&self) -> Result<BTreeSet<String>> {
        let mut rows = self
            .conn
            .query("SELECT DISTINCT category FROM content_items", params![])
            .await
            .map_err(storage_err)?;

        let categories =
            collect_rows(&mut rows, |row| row.get::<String>(0).map_err(storage_err)).await?;
        Ok(categories.into_iter().collect())
    }

    // -----------------------------------------------------------------------
    // Sync run history
    // -----------------------------------------------------------------------

    async fn record_run_start(&self) -> Result<String> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO sync_runs (id, started_at) VALUES (?1, ?2)",
                params![id.as_str(), now.as_str()],
            )
            .await
            .map_err(storage_err)?;
        Ok(id)
    }

    async fn record_run_finish(&self, run_id: &str, stats_json: &str) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        let updated = self
            .conn
            .execute(
                "UPDATE sync_runs SET finished_at = ?1, stats_json = ?2 WHERE id = ?3",
                params![now.as_str(), stats_json, run_id],
            )
            .await
            .map_err(storage_err)?;
        if updated == 0 {
            return Err(NewsdeskError::Storage(format!("unknown run {run_id}")));
        }
        Ok(())
    }
}

/// Check-then-insert every item on `conn`. Ids already present, either
/// persisted earlier or earlier in this batch, are skipped.
async fn insert_new_items(conn: &Connection, items: &[ContentItem]) -> Result<usize> {
    let mut inserted = 0;
    for item in items {
        let mut rows = conn
            .query(
                "SELECT 1 FROM content_items WHERE id = ?1",
                params![item.id.as_str()],
            )
            .await
            .map_err(storage_err)?;
        if rows.next().await.map_err(storage_err)?.is_some() {
            tracing::debug!(id = %item.id, "skipping existing item");
            continue;
        }

        let bullet_points = serde_json::to_string(&item.key_points)
            .map_err(|e| NewsdeskError::Storage(format!("encode key points: {e}")))?;
        conn.execute(
            "INSERT INTO content_items (id, source_name, category, headline, body, image_link,
                                        source_link, meta_description, summary, bullet_points,
                                        meta_keywords, published_at, content_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                item.id.as_str(),
                item.source_name.as_str(),
                item.category.as_str(),
                item.headline.as_str(),
                item.body.as_str(),
                item.image_link.as_str(),
                item.source_link.as_str(),
                item.meta_description.as_str(),
                item.summary.as_str(),
                bullet_points,
                item.meta_keywords.as_str(),
                item.published_at.as_str(),
                item.content_hash.as_str(),
            ],
        )
        .await
        .map_err(storage_err)?;
        inserted += 1;
    }
    Ok(inserted)
}

/// Convert a database row to a [`ContentItem`].
fn row_to_item(row: &libsql::Row) -> Result<ContentItem> {
    let text = |idx: i32| row.get::<String>(idx).map_err(storage_err);
    let bullet_points = text(9)?;
    let key_points: Vec<String> = serde_json::from_str(&bullet_points)
        .map_err(|e| NewsdeskError::Storage(format!("invalid bullet_points: {e}")))?;

    Ok(ContentItem {
        id: text(0)?,
        source_name: text(1)?,
        category: text(2)?,
        headline: text(3)?,
        body: text(4)?,
        image_link: text(5)?,
        source_link: text(6)?,
        meta_description: text(7)?,
        summary: text(8)?,
        key_points,
        meta_keywords: text(10)?,
        published_at: text(11)?,
        content_hash: text(12)?,
    })
}
