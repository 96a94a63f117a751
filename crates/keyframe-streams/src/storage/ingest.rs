//! Ingest store: `streams(id, active, notify_url, token)`.

use sqlx::{Sqlite, Transaction};

use super::models::IngestStream;
use super::DatabaseError;

keyframe_core::define_database!(
    IngestStore,
    "./migrations/ingest",
    "Ingest store migrations complete"
);

impl IngestStore {
    /// Open the run transaction.
    pub async fn begin_run(&self) -> Result<IngestTxn, DatabaseError> {
        Ok(IngestTxn {
            tx: self.begin().await?,
        })
    }

    /// All streams, active or not, ordered by id.
    pub async fn list_streams(&self) -> Result<Vec<IngestStream>, DatabaseError> {
        let rows = sqlx::query_as::<_, IngestStream>(
            "SELECT id, active, notify_url, token FROM streams ORDER BY id",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// The active stream carrying `token`.
    pub async fn find_active_by_token(&self, token: &str) -> Result<IngestStream, DatabaseError> {
        sqlx::query_as::<_, IngestStream>(
            "SELECT id, active, notify_url, token FROM streams \
             WHERE token = ? AND active = TRUE ORDER BY id DESC LIMIT 1",
        )
        .bind(token)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| DatabaseError::NotFound("active ingest stream for token".into()))
    }
}

/// Staged writes against the ingest store for one run.
///
/// Dropping without [`IngestTxn::commit`] rolls everything back.
pub struct IngestTxn {
    tx: Transaction<'static, Sqlite>,
}

impl IngestTxn {
    /// Insert an active stream and return its id, the seed of its SRT stream id.
    pub async fn insert_stream(&mut self, notify_url: &str, token: &str) -> Result<i64, DatabaseError> {
        let result =
            sqlx::query("INSERT INTO streams (active, notify_url, token) VALUES (TRUE, ?, ?)")
                .bind(notify_url)
                .bind(token)
                .execute(&mut *self.tx)
                .await?;
        Ok(result.last_insert_rowid())
    }

    /// Stop accepting every active stream carrying `token`. Returns how many rows changed.
    pub async fn deactivate_by_token(&mut self, token: &str) -> Result<u64, DatabaseError> {
        let result = sqlx::query("UPDATE streams SET active = FALSE WHERE token = ? AND active = TRUE")
            .bind(token)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn savepoint(&mut self) -> Result<(), DatabaseError> {
        super::savepoint(&mut self.tx).await
    }

    pub async fn release_savepoint(&mut self) -> Result<(), DatabaseError> {
        super::release_savepoint(&mut self.tx).await
    }

    pub async fn rollback_savepoint(&mut self) -> Result<(), DatabaseError> {
        super::rollback_savepoint(&mut self.tx).await
    }

    pub async fn commit(self) -> Result<(), DatabaseError> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<(), DatabaseError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
