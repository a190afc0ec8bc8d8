//! SQLite-based index cache.
//!
//! All indexes live in `<cache_dir>/indexes.db`. Each save replaces a video's
//! rows inside one transaction, so readers see the old or the new index only.

use super::{CachedIndex, IndexCache, IndexEntry, VectorIndex};
use crate::chunking::Chunk;
use crate::error::{Result, TubeQaError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS indexes (
        video_id TEXT PRIMARY KEY,
        model TEXT NOT NULL,
        dimensions INTEGER NOT NULL,
        chunk_count INTEGER NOT NULL,
        built_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS index_chunks (
        video_id TEXT NOT NULL,
        chunk_order INTEGER NOT NULL,
        text TEXT NOT NULL,
        start_seconds REAL,
        embedding BLOB NOT NULL,
        PRIMARY KEY (video_id, chunk_order)
    );
"#;

/// SQLite-backed index cache.
pub struct SqliteIndexCache {
    conn: Mutex<Connection>,
}

impl SqliteIndexCache {
    /// Open (or create) `indexes.db` inside `dir`.
    #[instrument(skip_all)]
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join("indexes.db");

        let conn = Connection::open(&path)?;

        // WAL lets readers proceed while another process writes
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite index cache at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    #[cfg(test)]
    fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| TubeQaError::IndexUnavailable(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn parse_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }
}

#[async_trait]
impl IndexCache for SqliteIndexCache {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    #[instrument(skip(self))]
    async fn load(&self, video_id: &str) -> Result<Option<VectorIndex>> {
        let conn = self.lock()?;

        // Both reads see the same snapshot, even while another process saves
        let tx = conn.unchecked_transaction()?;

        let header = tx
            .query_row(
                "SELECT model, dimensions, chunk_count, built_at FROM indexes WHERE video_id = ?1",
                params![video_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((model, dimensions, chunk_count, built_at)) = header else {
            return Ok(None);
        };

        let entries = {
            let mut stmt = tx.prepare(
                r#"
                SELECT chunk_order, text, start_seconds, embedding
                FROM index_chunks
                WHERE video_id = ?1
                ORDER BY chunk_order
                "#,
            )?;

            let rows = stmt
                .query_map(params![video_id], |row| {
                    let order: i64 = row.get(0)?;
                    let bytes: Vec<u8> = row.get(3)?;
                    Ok(IndexEntry {
                        chunk: Chunk {
                            text: row.get(1)?,
                            start: row.get(2)?,
                            order: order.max(0) as usize,
                        },
                        embedding: Self::bytes_to_embedding(&bytes),
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        tx.commit()?;

        if entries.len() as i64 != chunk_count {
            warn!(
                "Index for {} lists {} chunks but {} are stored, ignoring it",
                video_id,
                chunk_count,
                entries.len()
            );
            return Ok(None);
        }

        debug!("Loaded {} entries for {}", entries.len(), video_id);

        Ok(Some(VectorIndex {
            video_id: video_id.to_string(),
            model,
            dimensions: dimensions.max(0) as usize,
            built_at: Self::parse_time(&built_at),
            entries,
        }))
    }

    #[instrument(skip(self, index), fields(video_id = %index.video_id))]
    async fn save(&self, index: &VectorIndex) -> Result<()> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            "DELETE FROM index_chunks WHERE video_id = ?1",
            params![index.video_id],
        )?;
        tx.execute(
            r#"
            INSERT OR REPLACE INTO indexes (video_id, model, dimensions, chunk_count, built_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                index.video_id,
                index.model,
                index.dimensions as i64,
                index.entries.len() as i64,
                index.built_at.to_rfc3339(),
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO index_chunks (video_id, chunk_order, text, start_seconds, embedding)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )?;
            for (position, entry) in index.entries.iter().enumerate() {
                stmt.execute(params![
                    index.video_id,
                    position as i64,
                    entry.chunk.text,
                    entry.chunk.start,
                    Self::embedding_to_bytes(&entry.embedding),
                ])?;
            }
        }

        tx.commit()?;
        debug!("Saved {} entries", index.entries.len());
        Ok(())
    }

    async fn remove(&self, video_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute("DELETE FROM index_chunks WHERE video_id = ?1", params![video_id])?;
        let removed = tx.execute("DELETE FROM indexes WHERE video_id = ?1", params![video_id])?;
        tx.commit()?;
        Ok(removed > 0)
    }

    async fn list(&self) -> Result<Vec<CachedIndex>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT video_id, model, chunk_count, built_at FROM indexes ORDER BY video_id",
        )?;

        let cached = stmt
            .query_map([], |row| {
                let count: i64 = row.get(2)?;
                let built_at: String = row.get(3)?;
                Ok(CachedIndex {
                    video_id: row.get(0)?,
                    model: row.get(1)?,
                    chunk_count: count.max(0) as usize,
                    built_at: Self::parse_time(&built_at),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(cached)
    }
}
