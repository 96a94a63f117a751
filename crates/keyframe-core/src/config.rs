//! Site configuration and the derivation key source.
//!
//! Every externally visible name a stream gets (playback URL, chat room,
//! XMPP account, SRT endpoint) is derived here from the site domain, so the
//! reconciler and the recovery commands can never disagree about them.

use std::fmt;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};

/// Default SRT listener port of the ingest service.
pub const DEFAULT_SRT_PORT: u16 = 3800;

/// Length in bytes of the passphrase derivation key.
pub const DERIVATION_KEY_LEN: usize = 32;

/// Names and endpoints derived from the site domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    pub domain: String,
    pub srt_port: u16,
}

impl SiteConfig {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            srt_port: DEFAULT_SRT_PORT,
        }
    }

    #[must_use]
    pub fn with_srt_port(mut self, port: u16) -> Self {
        self.srt_port = port;
        self
    }

    /// Validate the configuration. Returns an error on invalid values.
    pub fn validate(&self) -> Result<()> {
        if self.domain.is_empty() {
            return Err(Error::Config("domain must not be empty".into()));
        }
        if self
            .domain
            .chars()
            .any(|c| c == '/' || c == '@' || c.is_whitespace())
        {
            return Err(Error::Config(format!(
                "domain {:?} must be a bare host name",
                self.domain
            )));
        }
        if self.srt_port == 0 {
            return Err(Error::Config("SRT port must be non-zero".into()));
        }
        Ok(())
    }

    /// DASH manifest URL of a stream. Unique per stream in the relay store.
    pub fn playback_url(&self, name: &str) -> String {
        format!("https://{}/stream/{name}.mpd", self.domain)
    }

    /// Human-facing page URL of a stream.
    pub fn page_url(&self, name: &str) -> String {
        format!("https://{}/stream/{name}", self.domain)
    }

    /// Recover the stream name from a playback URL built by [`Self::playback_url`].
    pub fn stream_name_from_playback_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        let name = url
            .strip_prefix("https://")?
            .strip_prefix(self.domain.as_str())?
            .strip_prefix("/stream/")?
            .strip_suffix(".mpd")?;
        (!name.is_empty() && !name.contains('/')).then_some(name)
    }

    /// Chat room bound to a stream.
    pub fn room_identity(&self, name: &str) -> String {
        format!("{name}@streamchat.{}", self.domain)
    }

    /// XMPP account used for a stream when the manifest names none.
    pub fn default_identity(&self, name: &str) -> String {
        format!("{name}@{}", self.domain)
    }

    /// Callback the ingest service notifies on stream state changes.
    pub fn notify_url(&self) -> String {
        format!("https://{}/api/v1/ingestd-notify", self.domain)
    }

    pub fn ingest_host(&self) -> String {
        format!("ingestd.{}", self.domain)
    }

    /// Account the room manager logs in as.
    pub fn membership_identity(&self) -> String {
        format!("stream-muc-manager@streamadmin.{}", self.domain)
    }
}

/// Shared key the SRT passphrases are derived from.
///
/// Wiped from memory on drop; never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivationKey([u8; DERIVATION_KEY_LEN]);

impl DerivationKey {
    pub const fn from_bytes(bytes: [u8; DERIVATION_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Decode a base64 (standard alphabet) key of exactly 32 bytes.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let mut decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::Config(format!("derivation key is not valid base64: {e}")))?;
        let result = <[u8; DERIVATION_KEY_LEN]>::try_from(decoded.as_slice())
            .map(Self)
            .map_err(|_| {
                Error::Config(format!(
                    "derivation key must decode to exactly {DERIVATION_KEY_LEN} bytes (got {})",
                    decoded.len()
                ))
            });
        decoded.zeroize();
        result
    }

    pub const fn as_bytes(&self) -> &[u8; DERIVATION_KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for DerivationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivationKey([REDACTED])")
    }
}

fn key_from_toml<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<DerivationKey, D::Error> {
    use serde::de::Error as _;
    let encoded = zeroize::Zeroizing::new(String::deserialize(deserializer)?);
    DerivationKey::from_base64(&encoded).map_err(D::Error::custom)
}

/// The slice of the ingest service's own TOML config this tool reads.
///
/// Other fields of that file are ignored.
#[derive(Debug, Deserialize)]
pub struct IngestdConfig {
    #[serde(deserialize_with = "key_from_toml")]
    pub secret: DerivationKey,
}

impl IngestdConfig {
    pub fn parse(toml_text: &str) -> Result<Self> {
        Ok(toml::from_str(toml_text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = zeroize::Zeroizing::new(std::fs::read_to_string(path).map_err(|source| {
            Error::Read {
                path: path.to_path_buf(),
                source,
            }
        })?);
        Self::parse(&text)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn site() -> SiteConfig {
        SiteConfig::new("example.com")
    }

    #[test]
    fn derived_names() {
        let site = site();
        assert_eq!(
            site.playback_url("radio"),
            "https://example.com/stream/radio.mpd"
        );
        assert_eq!(site.page_url("radio"), "https://example.com/stream/radio");
        assert_eq!(site.room_identity("radio"), "radio@streamchat.example.com");
        assert_eq!(site.default_identity("radio"), "radio@example.com");
        assert_eq!(site.notify_url(), "https://example.com/api/v1/ingestd-notify");
        assert_eq!(site.ingest_host(), "ingestd.example.com");
        assert_eq!(
            site.membership_identity(),
            "stream-muc-manager@streamadmin.example.com"
        );
    }

    #[test]
    fn stream_name_round_trips_through_playback_url() {
        let site = site();
        let url = site.playback_url("late-night.show");
        assert_eq!(site.stream_name_from_playback_url(&url), Some("late-night.show"));
    }

    #[test]
    fn foreign_urls_have_no_stream_name() {
        let site = site();
        assert_eq!(
            site.stream_name_from_playback_url("https://other.org/stream/radio.mpd"),
            None
        );
        assert_eq!(
            site.stream_name_from_playback_url("https://example.com/stream/.mpd"),
            None
        );
        assert_eq!(
            site.stream_name_from_playback_url("https://example.com/vod/radio.mp4"),
            None
        );
    }

    #[test]
    fn validate_rejects_bad_domains() {
        assert!(SiteConfig::new("").validate().is_err());
        assert!(SiteConfig::new("example.com/x").validate().is_err());
        assert!(SiteConfig::new("a b").validate().is_err());
        assert!(SiteConfig::new("example.com").with_srt_port(0).validate().is_err());
        assert!(site().validate().is_ok());
    }

    #[test]
    fn ingestd_config_decodes_secret() {
        let encoded = STANDARD.encode([7u8; 32]);
        let config = IngestdConfig::parse(&format!(
            "stream-logs = \"/var/log/ingestd\"\nsecret = \"{encoded}\"\n"
        ))
        .unwrap();
        assert_eq!(config.secret.as_bytes(), &[7u8; 32]);
    }

    #[test]
    fn ingestd_config_rejects_short_secret() {
        let encoded = STANDARD.encode([7u8; 16]);
        let err = IngestdConfig::parse(&format!("secret = \"{encoded}\"\n")).unwrap_err();
        assert!(err.to_string().contains("exactly 32 bytes"));
    }

    #[test]
    fn ingestd_config_requires_secret() {
        assert!(IngestdConfig::parse("stream-logs = \"/tmp\"\n").is_err());
    }

    #[test]
    fn derivation_key_debug_is_redacted() {
        let key = DerivationKey::from_bytes([1u8; 32]);
        assert_eq!(format!("{key:?}"), "DerivationKey([REDACTED])");
    }

    #[test]
    fn ingestd_config_loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ingestd-srt.toml");
        std::fs::write(&path, format!("secret = \"{}\"\n", STANDARD.encode([9u8; 32]))).unwrap();
        let config = IngestdConfig::load(&path).unwrap();
        assert_eq!(config.secret.as_bytes(), &[9u8; 32]);

        assert!(IngestdConfig::load(&dir.path().join("missing.toml")).is_err());
    }
}
