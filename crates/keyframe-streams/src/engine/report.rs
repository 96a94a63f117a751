//! Summary of one reconciliation run.

use crate::tools::{ReloadOutcome, RoomEnsure};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub dry_run: bool,
    /// Streams in the manifest.
    pub desired: usize,
    /// Streams provisioned by this run.
    pub provisioned: Vec<String>,
    /// Streams that were already provisioned before this run.
    pub already_provisioned: usize,
    /// Playback URLs removed from the relay store.
    pub decommissioned: Vec<String>,
    /// Streams whose provisioning was rolled back because account registration failed.
    pub registration_failures: Vec<String>,
    /// Streams whose credentials mail could not be delivered.
    pub mail_failures: Vec<String>,
    /// Rooms handed to membership sync.
    pub ensure: Vec<RoomEnsure>,
    pub remove: Vec<String>,
    /// `None` when the reload was skipped (dry run) or failed.
    pub reload: Option<ReloadOutcome>,
}

impl RunReport {
    /// True when the run changed neither store.
    pub fn is_noop(&self) -> bool {
        self.provisioned.is_empty() && self.decommissioned.is_empty()
    }
}
