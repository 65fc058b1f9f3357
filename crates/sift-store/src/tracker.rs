//! Per-file content-hash tracking for incremental indexing.
//!
//! One row per (project, file path, source type). A file whose current hash
//! equals the stored hash is never re-chunked or re-embedded; that
//! comparison is the sole gate.

use std::collections::HashMap;
use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct StateTracker {
    pool: SqlitePool,
}

impl StateTracker {
    /// Open (or create) the `SQLite` database and run migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub async fn new(path: &str) -> Result<Self> {
        let url = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let opts = SqliteConnectOptions::from_str(&url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Expose the underlying pool for shared access.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Stored content hash for one file, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_hash(
        &self,
        project_id: &str,
        source_type: &str,
        file_path: &str,
    ) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT content_hash FROM file_index_state \
             WHERE project_id = ? AND source_type = ? AND file_path = ?",
        )
        .bind(project_id)
        .bind(source_type)
        .bind(file_path)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(h,)| h))
    }

    /// All (file path, content hash) pairs for a project/source scope.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_all_hashes(
        &self,
        project_id: &str,
        source_type: &str,
    ) -> Result<HashMap<String, String>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT file_path, content_hash FROM file_index_state \
             WHERE project_id = ? AND source_type = ?",
        )
        .bind(project_id)
        .bind(source_type)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    /// All tracked file paths for a project/source scope.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_all_file_paths(
        &self,
        project_id: &str,
        source_type: &str,
    ) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT file_path FROM file_index_state \
             WHERE project_id = ? AND source_type = ?",
        )
        .bind(project_id)
        .bind(source_type)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(p,)| p).collect())
    }

    /// Record a file's hash after a successful index.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn save_hash(
        &self,
        project_id: &str,
        source_type: &str,
        file_path: &str,
        content_hash: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO file_index_state \
             (project_id, file_path, source_type, content_hash, indexed_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(project_id)
        .bind(file_path)
        .bind(source_type)
        .bind(content_hash)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Replace the whole source-type scope in one transaction
    /// (delete-then-insert). Either fully replaced or left as before.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails; no partial state remains.
    pub async fn batch_save(
        &self,
        project_id: &str,
        source_type: &str,
        entries: &[(String, String)],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM file_index_state WHERE project_id = ? AND source_type = ?")
            .bind(project_id)
            .bind(source_type)
            .execute(&mut *tx)
            .await?;

        let now = chrono::Utc::now().to_rfc3339();
        for (file_path, content_hash) in entries {
            sqlx::query(
                "INSERT INTO file_index_state \
                 (project_id, file_path, source_type, content_hash, indexed_at) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(project_id)
            .bind(file_path)
            .bind(source_type)
            .bind(content_hash)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Drop tracking rows for files that no longer exist.
    ///
    /// # Errors
    ///
    /// Returns an error if a delete fails.
    pub async fn remove_deleted(
        &self,
        project_id: &str,
        source_type: &str,
        file_paths: &[String],
    ) -> Result<()> {
        for file_path in file_paths {
            sqlx::query(
                "DELETE FROM file_index_state \
                 WHERE project_id = ? AND source_type = ? AND file_path = ?",
            )
            .bind(project_id)
            .bind(source_type)
            .bind(file_path)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    /// Clear one source type's state for a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn clear_project_source_state(
        &self,
        project_id: &str,
        source_type: &str,
    ) -> Result<()> {
        sqlx::query("DELETE FROM file_index_state WHERE project_id = ? AND source_type = ?")
            .bind(project_id)
            .bind(source_type)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Clear all state for a project across every source type.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn clear_project_state(&self, project_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM file_index_state WHERE project_id = ?")
            .bind(project_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn tracker() -> StateTracker {
        StateTracker::new(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn save_and_get_hash() {
        let t = tracker().await;
        assert!(t.get_hash("p1", "files", "a.md").await.unwrap().is_none());

        t.save_hash("p1", "files", "a.md", "hash-a").await.unwrap();
        assert_eq!(
            t.get_hash("p1", "files", "a.md").await.unwrap().as_deref(),
            Some("hash-a")
        );
    }

    #[tokio::test]
    async fn save_hash_replaces_existing() {
        let t = tracker().await;
        t.save_hash("p1", "files", "a.md", "hash-1").await.unwrap();
        t.save_hash("p1", "files", "a.md", "hash-2").await.unwrap();

        assert_eq!(
            t.get_hash("p1", "files", "a.md").await.unwrap().as_deref(),
            Some("hash-2")
        );
        assert_eq!(t.get_all_file_paths("p1", "files").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn scopes_are_independent() {
        let t = tracker().await;
        t.save_hash("p1", "files", "a.md", "h1").await.unwrap();
        t.save_hash("p1", "notes", "a.md", "h2").await.unwrap();
        t.save_hash("p2", "files", "a.md", "h3").await.unwrap();

        assert_eq!(
            t.get_hash("p1", "files", "a.md").await.unwrap().as_deref(),
            Some("h1")
        );
        assert_eq!(
            t.get_hash("p1", "notes", "a.md").await.unwrap().as_deref(),
            Some("h2")
        );
        assert_eq!(
            t.get_hash("p2", "files", "a.md").await.unwrap().as_deref(),
            Some("h3")
        );
    }

    #[tokio::test]
    async fn batch_save_replaces_scope() {
        let t = tracker().await;
        t.save_hash("p1", "files", "old.md", "h-old").await.unwrap();

        t.batch_save(
            "p1",
            "files",
            &[
                ("a.md".to_string(), "h-a".to_string()),
                ("b.md".to_string(), "h-b".to_string()),
            ],
        )
        .await
        .unwrap();

        let hashes = t.get_all_hashes("p1", "files").await.unwrap();
        assert_eq!(hashes.len(), 2);
        assert!(!hashes.contains_key("old.md"));
        assert_eq!(hashes.get("a.md").map(String::as_str), Some("h-a"));
    }

    #[tokio::test]
    async fn batch_save_leaves_other_scopes() {
        let t = tracker().await;
        t.save_hash("p1", "notes", "n.md", "h-n").await.unwrap();

        t.batch_save("p1", "files", &[("a.md".to_string(), "h-a".to_string())])
            .await
            .unwrap();

        assert_eq!(
            t.get_hash("p1", "notes", "n.md").await.unwrap().as_deref(),
            Some("h-n")
        );
    }

    #[tokio::test]
    async fn remove_deleted_drops_rows() {
        let t = tracker().await;
        t.save_hash("p1", "files", "a.md", "h-a").await.unwrap();
        t.save_hash("p1", "files", "b.md", "h-b").await.unwrap();

        t.remove_deleted("p1", "files", &["a.md".to_string()])
            .await
            .unwrap();

        let paths = t.get_all_file_paths("p1", "files").await.unwrap();
        assert_eq!(paths, vec!["b.md".to_string()]);
    }

    #[tokio::test]
    async fn clear_project_source_state_scoped() {
        let t = tracker().await;
        t.save_hash("p1", "files", "a.md", "h1").await.unwrap();
        t.save_hash("p1", "notes", "n.md", "h2").await.unwrap();

        t.clear_project_source_state("p1", "files").await.unwrap();

        assert!(t.get_all_hashes("p1", "files").await.unwrap().is_empty());
        assert_eq!(t.get_all_hashes("p1", "notes").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn clear_project_state_drops_all_sources() {
        let t = tracker().await;
        t.save_hash("p1", "files", "a.md", "h1").await.unwrap();
        t.save_hash("p1", "notes", "n.md", "h2").await.unwrap();
        t.save_hash("p2", "files", "a.md", "h3").await.unwrap();

        t.clear_project_state("p1").await.unwrap();

        assert!(t.get_all_hashes("p1", "files").await.unwrap().is_empty());
        assert!(t.get_all_hashes("p1", "notes").await.unwrap().is_empty());
        assert_eq!(t.get_all_hashes("p2", "files").await.unwrap().len(), 1);
    }
}
