//! Run-level errors of the reconciler.
//!
//! Only fatal conditions appear here. Per-stream registration failures, mail
//! failures and reload failures are logged and recorded in the
//! [`RunReport`](super::RunReport) instead.

use keyframe_core::db::DatabaseError;
use keyframe_crypto::CryptoError;

use crate::tools::ToolError;

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// Store access or commit failed. Aborts before any further side effect.
    #[error("store error: {0}")]
    Store(#[from] DatabaseError),

    /// Relay store committed but ingest store did not.
    ///
    /// The relay rows of this run now reference tokens the ingest service does
    /// not know; `keyframe-streams audit` lists them.
    #[error("ingest store commit failed after relay store commit: {0}")]
    PartialCommit(#[source] DatabaseError),

    #[error("credential generation failed: {0}")]
    Credentials(#[from] CryptoError),

    /// Room membership could not be synced; rooms now diverge from the stores.
    #[error("room membership sync failed: {0}")]
    MembershipSync(#[source] ToolError),
}
