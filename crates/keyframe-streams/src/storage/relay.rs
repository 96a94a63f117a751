//! Relay store: `streams(id, mpd_url UNIQUE)` and `ingestd_tokens(stream_id, token)`.

use sqlx::{Sqlite, Transaction};
use tracing::debug;

use keyframe_core::db::is_unique_violation;

use super::models::RelayStream;
use super::DatabaseError;

keyframe_core::define_database!(
    RelayStore,
    "./migrations/relay",
    "Relay store migrations complete"
);

const SELECT_STREAMS: &str = "SELECT s.id, s.mpd_url, t.token FROM streams s \
    LEFT JOIN ingestd_tokens t ON t.stream_id = s.id";

impl RelayStore {
    /// Open the run transaction.
    pub async fn begin_run(&self) -> Result<RelayTxn, DatabaseError> {
        Ok(RelayTxn {
            tx: self.begin().await?,
        })
    }

    /// All streams with their tokens, ordered by id.
    pub async fn list_streams(&self) -> Result<Vec<RelayStream>, DatabaseError> {
        let rows = sqlx::query_as::<_, RelayStream>(&format!("{SELECT_STREAMS} ORDER BY s.id"))
            .fetch_all(self.pool())
            .await?;
        Ok(rows)
    }

    /// Look a stream up by its playback URL.
    pub async fn find_by_url(&self, mpd_url: &str) -> Result<RelayStream, DatabaseError> {
        sqlx::query_as::<_, RelayStream>(&format!("{SELECT_STREAMS} WHERE s.mpd_url = ?"))
            .bind(mpd_url)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Stream {mpd_url}")))
    }
}

/// Staged writes against the relay store for one run.
///
/// Dropping without [`RelayTxn::commit`] rolls everything back.
pub struct RelayTxn {
    tx: Transaction<'static, Sqlite>,
}

impl RelayTxn {
    /// Insert a stream row.
    ///
    /// Returns `None` when a stream with this URL already exists, which is how
    /// the reconciler recognises already provisioned streams.
    pub async fn insert_stream(&mut self, mpd_url: &str) -> Result<Option<i64>, DatabaseError> {
        match sqlx::query("INSERT INTO streams (mpd_url) VALUES (?)")
            .bind(mpd_url)
            .execute(&mut *self.tx)
            .await
        {
            Ok(result) => Ok(Some(result.last_insert_rowid())),
            Err(e) if is_unique_violation(&e) => {
                debug!(mpd_url, "Stream already present");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Bind an ingest token to a stream.
    pub async fn insert_token(&mut self, stream_id: i64, token: &str) -> Result<(), DatabaseError> {
        sqlx::query("INSERT INTO ingestd_tokens (stream_id, token) VALUES (?, ?)")
            .bind(stream_id)
            .bind(token)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    /// All streams as seen inside the transaction, staged inserts included.
    pub async fn list_streams(&mut self) -> Result<Vec<RelayStream>, DatabaseError> {
        let rows = sqlx::query_as::<_, RelayStream>(&format!("{SELECT_STREAMS} ORDER BY s.id"))
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows)
    }

    /// Delete a stream together with its redirect and token.
    ///
    /// Dependent rows are deleted explicitly: a store whose schema was created
    /// by the CMS may declare the foreign keys without `ON DELETE CASCADE`.
    pub async fn delete_stream(&mut self, id: i64) -> Result<bool, DatabaseError> {
        for dependent in [
            "DELETE FROM stream_redirects WHERE stream_id = ?",
            "DELETE FROM ingestd_tokens WHERE stream_id = ?",
        ] {
            sqlx::query(dependent)
                .bind(id)
                .execute(&mut *self.tx)
                .await?;
        }
        let result = sqlx::query("DELETE FROM streams WHERE id = ?")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
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
