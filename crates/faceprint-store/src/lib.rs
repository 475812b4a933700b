//! faceprint-store: SQLite persistence for enrolled face profiles.
//!
//! All statements run on the single connection thread owned by
//! `tokio-rusqlite`, so identity assignment on insert is atomic with
//! respect to concurrent creates.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use faceprint_core::Profile;
use rusqlite::{params, OptionalExtension};
use thiserror::Error;
use tokio_rusqlite::Connection;

/// Default page size for [`ProfileStore::list`].
pub const DEFAULT_LIST_LIMIT: usize = 100;
/// Upper bound on a single page.
pub const MAX_LIST_LIMIT: usize = 1000;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS profiles (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    description TEXT    NOT NULL,
    embedding   BLOB    NOT NULL,
    model       TEXT,
    created_at  TEXT    NOT NULL
);
";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("profile {0} not found")]
    NotFound(i64),
    #[error("profile {id} is corrupt: {reason}")]
    Corrupt { id: i64, reason: String },
    #[error("database: {0}")]
    Database(#[from] tokio_rusqlite::Error),
}

/// Row as read from SQLite, before decoding.
type RawRow = (i64, String, Vec<u8>, Option<String>, String);

const COLUMNS: &str = "id, description, embedding, model, created_at";

fn raw_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?))
}

#[derive(Clone)]
pub struct ProfileStore {
    conn: Connection,
}

impl ProfileStore {
    /// Open (or create) the database at `path`.
    ///
    /// Existing profiles are kept. `reset` drops and recreates the table,
    /// destroying all stored profiles.
    pub async fn open(path: impl AsRef<Path>, reset: bool) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Database(tokio_rusqlite::Error::Other(Box::new(e)))
                })?;
            }
        }

        let conn = Connection::open(path).await?;
        tracing::info!(path = %path.display(), reset, "profile database opened");
        Self::init(conn, reset).await
    }

    /// Fresh private in-memory database.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn, false).await
    }

    async fn init(conn: Connection, reset: bool) -> Result<Self, StoreError> {
        conn.call(move |conn| {
            if reset {
                tracing::warn!("dropping all stored profiles (reset requested)");
                conn.execute_batch("DROP TABLE IF EXISTS profiles;")?;
            }
            conn.execute_batch(SCHEMA)?;
            let has_model = conn
                .prepare("SELECT 1 FROM pragma_table_info('profiles') WHERE name = 'model'")?
                .exists([])?;
            if !has_model {
                tracing::info!("adding model column to profiles table");
                conn.execute_batch("ALTER TABLE profiles ADD COLUMN model TEXT;")?;
            }
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }

    /// Insert a profile; the store assigns its id and creation time.
    /// `model` names the model that produced `embedding`.
    pub async fn create(
        &self,
        description: &str,
        embedding: &[f32],
        model: Option<&str>,
    ) -> Result<Profile, StoreError> {
        let created_at = format_timestamp(Utc::now());
        let blob = encode_embedding(embedding);
        let row_description = description.to_string();
        let row_model = model.map(str::to_string);
        let row_created_at = created_at.clone();

        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO profiles (description, embedding, model, created_at) \
                     VALUES (?1, ?2, ?3, ?4)",
                    params![row_description, blob, row_model, row_created_at],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;

        tracing::debug!(id, dim = embedding.len(), model = ?model, "profile created");
        Ok(Profile {
            id,
            description: description.to_string(),
            embedding: embedding.to_vec(),
            model: model.map(str::to_string),
            created_at: parse_timestamp(id, &created_at)?,
        })
    }

    pub async fn get(&self, id: i64) -> Result<Profile, StoreError> {
        let row: Option<RawRow> = self
            .conn
            .call(move |conn| {
                let row = conn
                    .query_row(
                        &format!("SELECT {COLUMNS} FROM profiles WHERE id = ?1"),
                        params![id],
                        raw_row,
                    )
                    .optional()?;
                Ok(row)
            })
            .await?;

        row.ok_or(StoreError::NotFound(id)).and_then(decode_row)
    }

    /// Profiles in creation order, skipping `offset` and returning at most
    /// `limit` (capped at [`MAX_LIST_LIMIT`]).
    pub async fn list(&self, offset: usize, limit: usize) -> Result<Vec<Profile>, StoreError> {
        let limit = limit.min(MAX_LIST_LIMIT) as i64;
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);

        let rows: Vec<RawRow> = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM profiles ORDER BY id LIMIT ?1 OFFSET ?2"
                ))?;
                let rows = stmt
                    .query_map(params![limit, offset], raw_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter().map(decode_row).collect()
    }

    pub async fn count(&self) -> Result<u64, StoreError> {
        let n: i64 = self
            .conn
            .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM profiles", [], |r| r.get(0))?))
            .await?;
        Ok(n.max(0) as u64)
    }

    /// Close the connection thread. Other clones fail afterwards.
    pub async fn close(self) -> Result<(), StoreError> {
        self.conn.close().await?;
        Ok(())
    }
}

fn encode_embedding(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_embedding(id: i64, blob: &[u8]) -> Result<Vec<f32>, StoreError> {
    if blob.len() % 4 != 0 {
        return Err(StoreError::Corrupt {
            id,
            reason: format!("embedding blob of {} bytes is not a whole number of f32", blob.len()),
        });
    }
    Ok(blob
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(id: i64, text: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            id,
            reason: format!("bad created_at {text:?}: {e}"),
        })
}

fn decode_row((id, description, blob, model, created_at): RawRow) -> Result<Profile, StoreError> {
    Ok(Profile {
        id,
        description,
        embedding: decode_embedding(id, &blob)?,
        model,
        created_at: parse_timestamp(id, &created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedding(seed: f32) -> Vec<f32> {
        (0..512).map(|i| seed + i as f32 * 0.001).collect()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = ProfileStore::open_in_memory().await.unwrap();
        let created = store.create("oval face", &embedding(0.5), Some("w600k_r50")).await.unwrap();

        let fetched = store.get(created.id).await.unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.embedding.len(), 512);
        assert_eq!(fetched.model.as_deref(), Some("w600k_r50"));
    }

    #[tokio::test]
    async fn test_ids_strictly_increase() {
        let store = ProfileStore::open_in_memory().await.unwrap();
        let a = store.create("a", &[1.0], None).await.unwrap();
        let b = store.create("b", &[2.0], None).await.unwrap();
        let c = store.create("c", &[3.0], None).await.unwrap();
        assert!(a.id < b.id && b.id < c.id);
    }

    #[tokio::test]
    async fn test_concurrent_creates_get_distinct_ids() {
        let store = ProfileStore::open_in_memory().await.unwrap();
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.create(&format!("p{i}"), &[i as f32], None).await.unwrap().id
            }));
        }
        let mut ids = Vec::new();
        for h in handles {
            ids.push(h.await.unwrap());
        }
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 16);
        assert_eq!(store.count().await.unwrap(), 16);
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let store = ProfileStore::open_in_memory().await.unwrap();
        assert!(matches!(store.get(99999).await, Err(StoreError::NotFound(99999))));
    }

    #[tokio::test]
    async fn test_list_order_and_pagination() {
        let store = ProfileStore::open_in_memory().await.unwrap();
        for name in ["first", "second", "third"] {
            store.create(name, &[1.0, 2.0], None).await.unwrap();
        }

        let all = store.list(0, DEFAULT_LIST_LIMIT).await.unwrap();
        let names: Vec<&str> = all.iter().map(|p| p.description.as_str()).collect();
        assert_eq!(names, ["first", "second", "third"]);

        let page = store.list(1, 1).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].description, "second");

        assert!(store.list(5, 10).await.unwrap().is_empty());
        assert!(store.list(0, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_embedding_round_trips_bit_exact() {
        let store = ProfileStore::open_in_memory().await.unwrap();
        let values = vec![f32::MIN_POSITIVE, -0.0, 1.0e-30, 0.123_456_79];
        let p = store.create("x", &values, None).await.unwrap();
        let back = store.get(p.id).await.unwrap().embedding;
        let bits = |v: &[f32]| v.iter().map(|f| f.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&back), bits(&values));
    }

    #[tokio::test]
    async fn test_reopen_preserves_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.db");

        let store = ProfileStore::open(&path, false).await.unwrap();
        let created = store.create("kept", &[0.1, 0.2], None).await.unwrap();
        store.close().await.unwrap();

        let reopened = ProfileStore::open(&path, false).await.unwrap();
        assert_eq!(reopened.get(created.id).await.unwrap().description, "kept");
    }

    #[tokio::test]
    async fn test_open_adds_model_column_to_older_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.db");
        {
            let conn = rusqlite::Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE profiles (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    description TEXT NOT NULL,
                    embedding BLOB NOT NULL,
                    created_at TEXT NOT NULL
                );
                INSERT INTO profiles (description, embedding, created_at)
                VALUES ('old', x'0000803f', '2025-03-01T12:30:45.123456Z');",
            )
            .unwrap();
        }

        let store = ProfileStore::open(&path, false).await.unwrap();
        let old = store.get(1).await.unwrap();
        assert_eq!(old.embedding, vec![1.0]);
        assert!(old.model.is_none());

        let new = store.create("new", &[0.5], Some("w600k_r50")).await.unwrap();
        assert_eq!(store.get(new.id).await.unwrap().model.as_deref(), Some("w600k_r50"));
    }

    #[tokio::test]
    async fn test_reset_drops_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("profiles.db");

        let store = ProfileStore::open(&path, false).await.unwrap();
        store.create("gone", &[0.1], None).await.unwrap();
        store.close().await.unwrap();

        let reset = ProfileStore::open(&path, true).await.unwrap();
        assert_eq!(reset.count().await.unwrap(), 0);
    }

    #[test]
    fn test_decode_rejects_truncated_blob() {
        assert!(matches!(
            decode_embedding(7, &[0, 0, 128]),
            Err(StoreError::Corrupt { id: 7, .. })
        ));
    }

    #[test]
    fn test_timestamp_format_round_trip() {
        let ts = parse_timestamp(1, "2025-03-01T12:30:45.123456Z").unwrap();
        assert_eq!(format_timestamp(ts), "2025-03-01T12:30:45.123456Z");
    }
}
