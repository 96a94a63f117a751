//! Read-only maintenance: passphrase recovery and cross-store audit.

use std::collections::HashSet;

use tracing::{info, warn};

use keyframe_core::SiteConfig;
use keyframe_crypto::{SecretDeriver, SrtCredentials};

use crate::storage::{DatabaseError, IngestStore, RelayStore};

/// Recompute the SRT credentials of an already provisioned stream.
pub async fn recover_srt_credentials(
    site: &SiteConfig,
    deriver: &dyn SecretDeriver,
    relay: &RelayStore,
    ingest: &IngestStore,
    name: &str,
) -> Result<SrtCredentials, DatabaseError> {
    let stream = relay.find_by_url(&site.playback_url(name)).await?;
    let token = stream
        .token
        .ok_or_else(|| DatabaseError::NotFound(format!("ingest token of stream {name}")))?;
    let ingest_stream = ingest.find_active_by_token(&token).await?;
    Ok(SrtCredentials::derive(deriver, ingest_stream.id))
}

/// Inconsistencies between the relay and ingest stores.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    /// Relay streams with no ingest token.
    pub missing_token: Vec<String>,
    /// Relay streams whose token matches no active ingest stream.
    pub missing_ingest: Vec<String>,
    /// Active ingest stream ids whose token no relay stream carries.
    pub orphaned_ingest: Vec<i64>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.missing_token.is_empty()
            && self.missing_ingest.is_empty()
            && self.orphaned_ingest.is_empty()
    }
}

/// Compare both stores and report every broken token pairing.
pub async fn audit(relay: &RelayStore, ingest: &IngestStore) -> Result<AuditReport, DatabaseError> {
    let relay_streams = relay.list_streams().await?;
    let ingest_streams = ingest.list_streams().await?;

    let active_tokens: HashSet<&str> = ingest_streams
        .iter()
        .filter(|s| s.active)
        .map(|s| s.token.as_str())
        .collect();
    let relay_tokens: HashSet<&str> = relay_streams
        .iter()
        .filter_map(|s| s.token.as_deref())
        .collect();

    let mut report = AuditReport::default();
    for stream in &relay_streams {
        match stream.token.as_deref() {
            None => report.missing_token.push(stream.mpd_url.clone()),
            Some(token) if !active_tokens.contains(token) => {
                report.missing_ingest.push(stream.mpd_url.clone());
            }
            Some(_) => {}
        }
    }
    report.orphaned_ingest = ingest_streams
        .iter()
        .filter(|s| s.active && !relay_tokens.contains(s.token.as_str()))
        .map(|s| s.id)
        .collect();

    for url in &report.missing_token {
        warn!(mpd_url = %url, "Relay stream has no ingest token");
    }
    for url in &report.missing_ingest {
        warn!(mpd_url = %url, "Relay stream token has no active ingest stream");
    }
    for id in &report.orphaned_ingest {
        warn!(ingest_id = *id, "Active ingest stream is not referenced by the relay store");
    }
    if report.is_clean() {
        info!(
            relay = relay_streams.len(),
            ingest = ingest_streams.len(),
            "Stores are consistent"
        );
    }

    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use keyframe_core::DerivationKey;
    use keyframe_crypto::KeyedBlake3;

    use super::*;

    async fn stores() -> (RelayStore, IngestStore) {
        (
            RelayStore::open_in_memory().await.unwrap(),
            IngestStore::open_in_memory().await.unwrap(),
        )
    }

    async fn seed_pair(relay: &RelayStore, ingest: &IngestStore, url: &str, token: &str) -> i64 {
        let mut relay_tx = relay.begin_run().await.unwrap();
        let id = relay_tx.insert_stream(url).await.unwrap().unwrap();
        relay_tx.insert_token(id, token).await.unwrap();
        relay_tx.commit().await.unwrap();

        let mut ingest_tx = ingest.begin_run().await.unwrap();
        let ingest_id = ingest_tx.insert_stream("notify", token).await.unwrap();
        ingest_tx.commit().await.unwrap();
        ingest_id
    }

    #[tokio::test]
    async fn recovers_passphrase_from_stores() {
        let site = SiteConfig::new("example.com");
        let deriver = KeyedBlake3::new(DerivationKey::from_bytes([4u8; 32]));
        let (relay, ingest) = stores().await;
        let ingest_id = seed_pair(&relay, &ingest, &site.playback_url("radio"), "tok").await;

        let creds = recover_srt_credentials(&site, &deriver, &relay, &ingest, "radio")
            .await
            .unwrap();
        assert_eq!(creds, SrtCredentials::derive(&deriver, ingest_id));
    }

    #[tokio::test]
    async fn unknown_stream_is_not_found() {
        let site = SiteConfig::new("example.com");
        let deriver = KeyedBlake3::new(DerivationKey::from_bytes([4u8; 32]));
        let (relay, ingest) = stores().await;
        let err = recover_srt_credentials(&site, &deriver, &relay, &ingest, "radio")
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound(_)));
    }

    #[tokio::test]
    async fn consistent_stores_audit_clean() {
        let (relay, ingest) = stores().await;
        seed_pair(&relay, &ingest, "https://example.com/stream/a.mpd", "ta").await;
        seed_pair(&relay, &ingest, "https://example.com/stream/b.mpd", "tb").await;
        assert!(audit(&relay, &ingest).await.unwrap().is_clean());
    }

    #[tokio::test]
    async fn audit_finds_every_broken_pairing() {
        let (relay, ingest) = stores().await;
        seed_pair(&relay, &ingest, "https://example.com/stream/ok.mpd", "ok").await;

        let mut relay_tx = relay.begin_run().await.unwrap();
        relay_tx
            .insert_stream("https://example.com/stream/tokenless.mpd")
            .await
            .unwrap();
        let id = relay_tx
            .insert_stream("https://example.com/stream/dangling.mpd")
            .await
            .unwrap()
            .unwrap();
        relay_tx.insert_token(id, "dangling").await.unwrap();
        relay_tx.commit().await.unwrap();

        let mut ingest_tx = ingest.begin_run().await.unwrap();
        let orphan = ingest_tx.insert_stream("notify", "orphan").await.unwrap();
        let inactive = ingest_tx.insert_stream("notify", "retired").await.unwrap();
        ingest_tx.deactivate_by_token("retired").await.unwrap();
        ingest_tx.commit().await.unwrap();

        let report = audit(&relay, &ingest).await.unwrap();
        assert_eq!(
            report.missing_token,
            ["https://example.com/stream/tokenless.mpd"]
        );
        assert_eq!(
            report.missing_ingest,
            ["https://example.com/stream/dangling.mpd"]
        );
        assert_eq!(report.orphaned_ingest, [orphan]);
        assert!(!report.orphaned_ingest.contains(&inactive));
    }
}
