//! Recording fakes for the reconciler's external collaborators.

#![allow(clippy::unwrap_used, dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use keyframe_core::{DerivationKey, DesiredStream, Manifest, SiteConfig};
use keyframe_crypto::KeyedBlake3;
use keyframe_streams::notification::Notification;
use keyframe_streams::storage::{IngestStore, IngestStream, RelayStore, RelayStream};
use keyframe_streams::tools::{
    IdentityRegistrar, MembershipSync, NotificationDispatcher, ReloadOutcome, RoomEnsure,
    ServiceReloader, ToolError, Toolbox,
};
use keyframe_streams::{ReconcileError, Reconciler, RunMode, RunReport};

fn failure(description: &str) -> ToolError {
    ToolError::Io(std::io::Error::other(format!("{description} failed")))
}

#[derive(Default)]
pub struct FakeRegistrar {
    pub calls: Mutex<Vec<(String, String, String)>>,
    pub failing: Mutex<HashSet<String>>,
}

#[async_trait]
impl IdentityRegistrar for FakeRegistrar {
    async fn register_identity(
        &self,
        username: &str,
        host: &str,
        password: &str,
    ) -> Result<(), ToolError> {
        if self.failing.lock().unwrap().contains(username) {
            return Err(failure("register"));
        }
        self.calls
            .lock()
            .unwrap()
            .push((username.into(), host.into(), password.into()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeDispatcher {
    pub sent: Mutex<Vec<Notification>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl NotificationDispatcher for FakeDispatcher {
    async fn dispatch(&self, notification: &Notification) -> Result<(), ToolError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(failure("sendmail"));
        }
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeMembership {
    pub calls: Mutex<Vec<(Vec<RoomEnsure>, Vec<String>)>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl MembershipSync for FakeMembership {
    async fn sync_membership(
        &self,
        ensure: &[RoomEnsure],
        remove: &[String],
    ) -> Result<(), ToolError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(failure("stream-muc-manager"));
        }
        self.calls
            .lock()
            .unwrap()
            .push((ensure.to_vec(), remove.to_vec()));
        Ok(())
    }
}

pub struct FakeReloader {
    pub calls: AtomicUsize,
    pub active: AtomicBool,
    pub fail: AtomicBool,
}

impl Default for FakeReloader {
    fn default() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            active: AtomicBool::new(true),
            fail: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ServiceReloader for FakeReloader {
    async fn reload_if_active(&self) -> Result<ReloadOutcome, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(failure("systemctl reload"));
        }
        if self.active.load(Ordering::SeqCst) {
            Ok(ReloadOutcome::Reloaded)
        } else {
            Ok(ReloadOutcome::Inactive)
        }
    }
}

/// In-memory stores plus fakes, wired the way the binary wires the real thing.
pub struct Harness {
    pub site: SiteConfig,
    pub deriver: KeyedBlake3,
    pub relay: RelayStore,
    pub ingest: IngestStore,
    pub registrar: Arc<FakeRegistrar>,
    pub dispatcher: Arc<FakeDispatcher>,
    pub membership: Arc<FakeMembership>,
    pub reloader: Arc<FakeReloader>,
    pub tools: Toolbox,
}

impl Harness {
    pub async fn new() -> Self {
        let registrar = Arc::new(FakeRegistrar::default());
        let dispatcher = Arc::new(FakeDispatcher::default());
        let membership = Arc::new(FakeMembership::default());
        let reloader = Arc::new(FakeReloader::default());
        let tools = Toolbox {
            registrar: registrar.clone(),
            dispatcher: dispatcher.clone(),
            membership: membership.clone(),
            reloader: reloader.clone(),
        };
        Self {
            site: SiteConfig::new("example.com"),
            deriver: KeyedBlake3::new(DerivationKey::from_bytes([42u8; 32])),
            relay: RelayStore::open_in_memory().await.unwrap(),
            ingest: IngestStore::open_in_memory().await.unwrap(),
            registrar,
            dispatcher,
            membership,
            reloader,
            tools,
        }
    }

    pub async fn run_mode(
        &self,
        manifest: &Manifest,
        mode: RunMode,
    ) -> Result<RunReport, ReconcileError> {
        Reconciler::new(&self.site, &self.deriver, &self.tools)
            .run(manifest, &self.relay, &self.ingest, mode)
            .await
    }

    pub async fn run(&self, manifest: &Manifest) -> Result<RunReport, ReconcileError> {
        self.run_mode(manifest, RunMode::Apply).await
    }

    pub async fn relay_rows(&self) -> Vec<RelayStream> {
        self.relay.list_streams().await.unwrap()
    }

    pub async fn relay_urls(&self) -> Vec<String> {
        let mut urls: Vec<_> = self
            .relay_rows()
            .await
            .into_iter()
            .map(|r| r.mpd_url)
            .collect();
        urls.sort();
        urls
    }

    pub async fn ingest_rows(&self) -> Vec<IngestStream> {
        self.ingest.list_streams().await.unwrap()
    }

    pub fn registrations(&self) -> Vec<String> {
        self.registrar
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|(user, _, _)| user.clone())
            .collect()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.dispatcher.sent.lock().unwrap().clone()
    }

    pub fn membership_calls(&self) -> Vec<(Vec<RoomEnsure>, Vec<String>)> {
        self.membership.calls.lock().unwrap().clone()
    }
}

pub fn manifest(streams: impl IntoIterator<Item = DesiredStream>) -> Manifest {
    Manifest::from_streams(streams).unwrap()
}

pub fn stream(name: &str) -> DesiredStream {
    DesiredStream::new(name, format!("{name}-owner@x.com"))
}
