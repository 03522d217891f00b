use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use super::error::{MetadataError, MetadataResult};
use super::types::FileRecord;

/// SQLite-backed store of FileRecords, keyed by file name.
///
/// The pool is capped at a single connection so concurrent `put`/`delete`
/// on the same name serialize (last writer wins) and every read observes a
/// consistent snapshot.
pub struct MetadataStore {
    pool: SqlitePool,
}

impl MetadataStore {
    /// Open (or create) a store at the given SQLite URL.
    pub async fn new(db_url: &str) -> MetadataResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(db_url)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS files (
                name TEXT PRIMARY KEY,
                size INTEGER NOT NULL,
                chunk_count INTEGER NOT NULL,
                chunks TEXT NOT NULL,
                replication_factor INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_files_created ON files(created_at)")
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }

    /// In-memory database, for tests and the demo binary.
    pub async fn new_in_memory() -> MetadataResult<Self> {
        Self::new("sqlite::memory:").await
    }

    /// Upsert a record. Fully replaces any prior record for the same name;
    /// a re-upload invalidates all previous chunk placements, even ones that
    /// happen to coincide.
    pub async fn put(&self, record: &FileRecord) -> MetadataResult<()> {
        let chunks_json = serde_json::to_string(&record.chunks)?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO files
            (name, size, chunk_count, chunks, replication_factor, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.name)
        .bind(record.size as i64)
        .bind(record.chunk_count as i64)
        .bind(chunks_json)
        .bind(record.replication_factor as i64)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Look up a record by name. `None` is the not-found case.
    pub async fn get(&self, name: &str) -> MetadataResult<Option<FileRecord>> {
        let row = sqlx::query("SELECT * FROM files WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::record_from_row).transpose()
    }

    /// Delete a record. Errors with `NotFound` when no record existed.
    pub async fn delete(&self, name: &str) -> MetadataResult<()> {
        let result = sqlx::query("DELETE FROM files WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(MetadataError::NotFound(name.to_string()));
        }
        Ok(())
    }

    /// All records, oldest first.
    pub async fn list(&self) -> MetadataResult<Vec<FileRecord>> {
        let rows = sqlx::query("SELECT * FROM files ORDER BY created_at, name")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::record_from_row).collect()
    }

    pub async fn exists(&self, name: &str) -> MetadataResult<bool> {
        Ok(self.get(name).await?.is_some())
    }

    pub async fn count(&self) -> MetadataResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM files")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("count")?)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn record_from_row(row: sqlx::sqlite::SqliteRow) -> MetadataResult<FileRecord> {
        Ok(FileRecord {
            name: row.try_get("name")?,
            size: row.try_get::<i64, _>("size")? as u64,
            chunk_count: row.try_get::<i64, _>("chunk_count")? as u32,
            chunks: serde_json::from_str(&row.try_get::<String, _>("chunks")?)?,
            replication_factor: row.try_get::<i64, _>("replication_factor")? as u32,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrity::IntegrityVerifier;
    use crate::metadata::types::ChunkRecord;

    fn sample_record(name: &str, nodes: Vec<u64>) -> FileRecord {
        let hash = IntegrityVerifier::digest(name.as_bytes());
        FileRecord::new(
            name,
            128,
            2,
            vec![ChunkRecord {
                index: 0,
                hash,
                nodes,
            }],
        )
    }

    #[tokio::test]
    async fn test_store_creation() {
        let store = MetadataStore::new_in_memory().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = MetadataStore::new_in_memory().await.unwrap();
        let record = sample_record("a.bin", vec![1, 2]);

        store.put(&record).await.unwrap();

        let loaded = store.get("a.bin").await.unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let store = MetadataStore::new_in_memory().await.unwrap();
        assert!(store.get("ghost.bin").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_replaces_wholesale() {
        let store = MetadataStore::new_in_memory().await.unwrap();
        store.put(&sample_record("a.bin", vec![1, 2])).await.unwrap();

        // Re-upload with a different placement replaces the whole record.
        let replacement = sample_record("a.bin", vec![3]);
        store.put(&replacement).await.unwrap();

        let loaded = store.get("a.bin").await.unwrap().unwrap();
        assert_eq!(loaded.chunks[0].nodes, vec![3]);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MetadataStore::new_in_memory().await.unwrap();
        store.put(&sample_record("a.bin", vec![1])).await.unwrap();

        store.delete("a.bin").await.unwrap();
        assert!(!store.exists("a.bin").await.unwrap());

        let result = store.delete("a.bin").await;
        assert!(matches!(result, Err(MetadataError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list() {
        let store = MetadataStore::new_in_memory().await.unwrap();
        for name in ["a.bin", "b.bin", "c.bin"] {
            store.put(&sample_record(name, vec![1])).await.unwrap();
        }

        let records = store.list().await.unwrap();
        assert_eq!(records.len(), 3);
    }

    #[tokio::test]
    async fn test_zero_chunk_record_round_trips() {
        let store = MetadataStore::new_in_memory().await.unwrap();
        let record = FileRecord::new("empty.bin", 0, 2, Vec::new());

        store.put(&record).await.unwrap();

        let loaded = store.get("empty.bin").await.unwrap().unwrap();
        assert_eq!(loaded.chunk_count, 0);
        assert!(loaded.chunks.is_empty());
    }
}
