//! `SQLite` stores the reconciler keeps in step.
//!
//! - [`RelayStore`]: the web frontend's stream list and ingest tokens.
//! - [`IngestStore`]: the SRT ingest service's accepted streams.
//!
//! Each run stages all writes in one transaction per store ([`RelayTxn`],
//! [`IngestTxn`]) and commits both at the end. Per-stream provisioning is
//! additionally wrapped in a savepoint so a single stream can be undone
//! without losing the rest of the run.

mod ingest;
mod models;
mod relay;


pub use ingest::{IngestStore, IngestTxn};
pub use keyframe_core::db::DatabaseError;
pub use models::*;
pub use relay::{RelayStore, RelayTxn};

use sqlx::SqliteConnection;

/// Savepoint wrapping the writes of the stream currently being provisioned.
const PROVISION_SAVEPOINT: &str = "provision_stream";

async fn savepoint(conn: &mut SqliteConnection) -> Result<(), DatabaseError> {
    sqlx::query(&format!("SAVEPOINT {PROVISION_SAVEPOINT}"))
        .execute(conn)
        .await?;
    Ok(())
}

async fn release_savepoint(conn: &mut SqliteConnection) -> Result<(), DatabaseError> {
    sqlx::query(&format!("RELEASE SAVEPOINT {PROVISION_SAVEPOINT}"))
        .execute(conn)
        .await?;
    Ok(())
}

/// Undo everything since [`savepoint`] and drop the savepoint.
async fn rollback_savepoint(conn: &mut SqliteConnection) -> Result<(), DatabaseError> {
    sqlx::query(&format!("ROLLBACK TO SAVEPOINT {PROVISION_SAVEPOINT}"))
        .execute(&mut *conn)
        .await?;
    release_savepoint(conn).await
}
