//! Reconciliation of the stream manifest against the relay and ingest stores.
//!
//! A run has three phases:
//!
//! 1. **Stage**: inside one transaction per store, insert every desired
//!    stream (a duplicate playback URL means "already provisioned"),
//!    provision the new ones, and delete relay rows no longer desired.
//! 2. **Commit**: relay store first, then ingest store.
//! 3. **Side effects**: credentials mail, room membership sync, ingest
//!    service reload, in that order.
//!
//! Re-running on an unchanged manifest stages nothing and only repeats the
//! (idempotent) membership sync and reload.

mod error;
mod report;

pub use error::ReconcileError;
pub use report::RunReport;

use std::collections::HashSet;

use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

use keyframe_core::{DesiredStream, Manifest, SiteConfig};
use keyframe_crypto::{
    CredentialGenerator, CryptoError, DEFAULT_PASSWORD_LEN, SecretDeriver, SrtCredentials,
};

use crate::notification::{AccountCredentials, Notification};
use crate::storage::{DatabaseError, IngestStore, IngestTxn, RelayStore, RelayTxn};
use crate::tools::{RoomEnsure, ToolError, Toolbox};

/// Whether a run commits its writes and talks to external systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Apply,
    /// Stage everything, log the plan, roll both stores back, touch nothing else.
    DryRun,
}

/// Why provisioning a single stream stopped.
enum ProvisionError {
    /// Undo this stream, keep going with the rest.
    Registration(ToolError),
    /// Abort the run.
    Fatal(ReconcileError),
}

impl From<DatabaseError> for ProvisionError {
    fn from(e: DatabaseError) -> Self {
        Self::Fatal(e.into())
    }
}

impl From<CryptoError> for ProvisionError {
    fn from(e: CryptoError) -> Self {
        Self::Fatal(e.into())
    }
}

/// Writes staged by a run but not yet committed.
struct Staged {
    relay: RelayTxn,
    ingest: IngestTxn,
    notifications: Vec<Notification>,
    report: RunReport,
}

/// Drives one reconciliation run.
///
/// Concurrent runs against the same stores are not safe; callers serialize
/// them (the binary holds a lock file for the duration of a run).
pub struct Reconciler<'a> {
    site: &'a SiteConfig,
    deriver: &'a dyn SecretDeriver,
    credentials: CredentialGenerator,
    tools: &'a Toolbox,
}

impl<'a> Reconciler<'a> {
    pub const fn new(site: &'a SiteConfig, deriver: &'a dyn SecretDeriver, tools: &'a Toolbox) -> Self {
        Self {
            site,
            deriver,
            credentials: CredentialGenerator::new(),
            tools,
        }
    }

    /// Reconcile both stores and the external systems with `manifest`.
    pub async fn run(
        &self,
        manifest: &Manifest,
        relay: &RelayStore,
        ingest: &IngestStore,
        mode: RunMode,
    ) -> Result<RunReport, ReconcileError> {
        info!(
            desired = manifest.len(),
            dry_run = mode == RunMode::DryRun,
            "Starting reconciliation"
        );

        let staged = self.stage(manifest, relay, ingest, mode).await?;
        match mode {
            RunMode::Apply => self.apply(staged).await,
            RunMode::DryRun => Self::discard(staged).await,
        }
    }

    /// JID that owns the room of `stream`.
    fn identity_of(&self, stream: &DesiredStream) -> String {
        stream
            .jid
            .clone()
            .unwrap_or_else(|| self.site.default_identity(&stream.name))
    }

    async fn stage(
        &self,
        manifest: &Manifest,
        relay: &RelayStore,
        ingest: &IngestStore,
        mode: RunMode,
    ) -> Result<Staged, ReconcileError> {
        let mut relay_tx = relay.begin_run().await?;
        let mut ingest_tx = ingest.begin_run().await?;
        let mut notifications = Vec::new();
        let mut report = RunReport {
            dry_run: mode == RunMode::DryRun,
            desired: manifest.len(),
            ..RunReport::default()
        };

        for stream in manifest.streams() {
            // Membership is reconciled every run, provisioned or not.
            report.ensure.push(RoomEnsure {
                room: self.site.room_identity(&stream.name),
                jid: self.identity_of(stream),
            });

            relay_tx.savepoint().await?;
            ingest_tx.savepoint().await?;
            match self
                .provision(stream, &mut relay_tx, &mut ingest_tx, mode)
                .await
            {
                Ok(Some(notification)) => {
                    relay_tx.release_savepoint().await?;
                    ingest_tx.release_savepoint().await?;
                    report.provisioned.push(stream.name.clone());
                    notifications.push(notification);
                }
                Ok(None) => {
                    relay_tx.release_savepoint().await?;
                    ingest_tx.release_savepoint().await?;
                    report.already_provisioned += 1;
                }
                Err(ProvisionError::Registration(e)) => {
                    relay_tx.rollback_savepoint().await?;
                    ingest_tx.rollback_savepoint().await?;
                    error!(
                        stream = %stream.name,
                        error = %e,
                        "Account registration failed, stream left unprovisioned until next run"
                    );
                    report.registration_failures.push(stream.name.clone());
                }
                Err(ProvisionError::Fatal(e)) => return Err(e),
            }
        }

        self.decommission(manifest, &mut relay_tx, &mut ingest_tx, &mut report)
            .await?;

        Ok(Staged {
            relay: relay_tx,
            ingest: ingest_tx,
            notifications,
            report,
        })
    }

    /// Provision `stream` if its relay row does not exist yet.
    ///
    /// Returns the credentials mail for a new stream, `None` if it was
    /// already provisioned.
    async fn provision(
        &self,
        stream: &DesiredStream,
        relay_tx: &mut RelayTxn,
        ingest_tx: &mut IngestTxn,
        mode: RunMode,
    ) -> Result<Option<Notification>, ProvisionError> {
        let mpd_url = self.site.playback_url(&stream.name);
        let Some(relay_id) = relay_tx.insert_stream(&mpd_url).await? else {
            debug!(stream = %stream.name, "Already provisioned");
            return Ok(None);
        };

        let token = Zeroizing::new(self.credentials.random_token()?);
        relay_tx.insert_token(relay_id, &token).await?;
        let ingest_id = ingest_tx
            .insert_stream(&self.site.notify_url(), &token)
            .await?;
        let srt = SrtCredentials::derive(self.deriver, ingest_id);

        let account = if stream.jid.is_none() {
            let password = Zeroizing::new(self.credentials.random_password(DEFAULT_PASSWORD_LEN)?);
            match mode {
                RunMode::Apply => self
                    .tools
                    .registrar
                    .register_identity(&stream.name, &self.site.domain, &password)
                    .await
                    .map_err(ProvisionError::Registration)?,
                RunMode::DryRun => {
                    info!(stream = %stream.name, "Would register XMPP account");
                }
            }
            Some(AccountCredentials {
                jid: self.site.default_identity(&stream.name),
                password,
            })
        } else {
            None
        };

        info!(
            stream = %stream.name,
            relay_id,
            ingest_id,
            generated_account = account.is_some(),
            "Provisioned stream"
        );
        Ok(Some(Notification::new(
            self.site,
            &stream.name,
            &stream.email,
            &srt,
            account,
        )))
    }

    /// Delete relay rows whose playback URL no longer matches a desired stream.
    ///
    /// The matching ingest rows are deactivated, never deleted, so their ids
    /// are never handed out again.
    async fn decommission(
        &self,
        manifest: &Manifest,
        relay_tx: &mut RelayTxn,
        ingest_tx: &mut IngestTxn,
        report: &mut RunReport,
    ) -> Result<(), ReconcileError> {
        let desired: HashSet<String> = manifest
            .streams()
            .iter()
            .map(|s| self.site.playback_url(&s.name))
            .collect();
        let ensured: HashSet<String> = report
            .ensure
            .iter()
            .map(|entry| entry.room.to_lowercase())
            .collect();

        for row in relay_tx.list_streams().await? {
            if desired.contains(&row.mpd_url) {
                continue;
            }

            relay_tx.delete_stream(row.id).await?;
            match &row.token {
                Some(token) => {
                    if ingest_tx.deactivate_by_token(token).await? == 0 {
                        warn!(mpd_url = %row.mpd_url, "No active ingest stream for removed stream");
                    }
                }
                None => warn!(mpd_url = %row.mpd_url, "Removed stream had no ingest token"),
            }

            match self.site.stream_name_from_playback_url(&row.mpd_url) {
                Some(name) => {
                    let room = self.site.room_identity(name);
                    // Room JIDs compare case-insensitively on the chat server.
                    if ensured.contains(&room.to_lowercase()) {
                        warn!(
                            mpd_url = %row.mpd_url,
                            room = %room,
                            "Removed stream's room is still ensured under another case, keeping it"
                        );
                    } else {
                        report.remove.push(room);
                    }
                }
                None => warn!(
                    mpd_url = %row.mpd_url,
                    "Removed stream is not under this site's stream path, no room to remove"
                ),
            }

            info!(mpd_url = %row.mpd_url, "Decommissioned stream");
            report.decommissioned.push(row.mpd_url);
        }
        Ok(())
    }

    async fn apply(&self, staged: Staged) -> Result<RunReport, ReconcileError> {
        let Staged {
            relay,
            ingest,
            notifications,
            mut report,
        } = staged;

        relay.commit().await?;
        ingest.commit().await.map_err(ReconcileError::PartialCommit)?;
        debug!("Both stores committed");

        for notification in &notifications {
            if let Err(e) = self.tools.dispatcher.dispatch(notification).await {
                // The SRT passphrase can be recovered later, a generated password cannot.
                error!(
                    stream = %notification.stream,
                    recipient = %notification.recipient,
                    error = %e,
                    "Failed to deliver credentials mail"
                );
                report.mail_failures.push(notification.stream.clone());
            }
        }

        self.tools
            .membership
            .sync_membership(&report.ensure, &report.remove)
            .await
            .map_err(ReconcileError::MembershipSync)?;

        match self.tools.reloader.reload_if_active().await {
            Ok(outcome) => report.reload = Some(outcome),
            Err(e) => warn!(error = %e, "Failed to reload ingest service"),
        }

        Ok(report)
    }

    async fn discard(staged: Staged) -> Result<RunReport, ReconcileError> {
        let Staged {
            relay,
            ingest,
            report,
            ..
        } = staged;
        relay.rollback().await?;
        ingest.rollback().await?;

        for entry in &report.ensure {
            info!(room = %entry.room, jid = %entry.jid, "Would ensure room");
        }
        for room in &report.remove {
            info!(room = %room, "Would remove room");
        }
        Ok(report)
    }
}
