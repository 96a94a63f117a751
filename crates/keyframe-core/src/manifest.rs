//! Stream manifest: the desired set of streams.
//!
//! The manifest is a JSON object keyed by stream name:
//!
//! ```json
//! { "radio": { "email": "owner@example.org" },
//!   "talk":  { "email": "host@example.org", "jid": "host@example.org" } }
//! ```
//!
//! Stream names end up in URLs, room names and account names, so they are
//! restricted to a conservative character set.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// One manifest entry as written on disk.
#[derive(Debug, Clone, Deserialize)]
struct ManifestEntry {
    #[serde(default)]
    jid: Option<String>,
    email: String,
}

/// A stream that should exist after reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredStream {
    pub name: String,
    /// Explicit XMPP account. When absent the stream gets a generated account.
    pub jid: Option<String>,
    /// Where the credentials of a newly provisioned stream are mailed.
    pub email: String,
}

impl DesiredStream {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            jid: None,
            email: email.into(),
        }
    }

    #[must_use]
    pub fn with_jid(mut self, jid: impl Into<String>) -> Self {
        self.jid = Some(jid.into());
        self
    }
}

/// Validated desired stream set, ordered by name.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    streams: Vec<DesiredStream>,
}

impl Manifest {
    /// Build a manifest from already constructed streams, validating each.
    pub fn from_streams(streams: impl IntoIterator<Item = DesiredStream>) -> Result<Self> {
        let mut by_name = BTreeMap::new();
        for stream in streams {
            validate_stream(&stream)?;
            if by_name.contains_key(&stream.name) {
                return Err(Error::Manifest {
                    name: stream.name,
                    reason: "duplicate stream name".into(),
                });
            }
            by_name.insert(stream.name.clone(), stream);
        }
        Ok(Self {
            streams: by_name.into_values().collect(),
        })
    }

    /// Parse a JSON manifest.
    pub fn parse(json: &str) -> Result<Self> {
        let entries: BTreeMap<String, ManifestEntry> = serde_json::from_str(json)?;
        Self::from_streams(entries.into_iter().map(|(name, entry)| DesiredStream {
            name,
            jid: entry.jid.filter(|jid| !jid.is_empty()),
            email: entry.email,
        }))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn streams(&self) -> &[DesiredStream] {
        &self.streams
    }

    pub fn get(&self, name: &str) -> Option<&DesiredStream> {
        self.streams
            .binary_search_by(|s| s.name.as_str().cmp(name))
            .ok()
            .and_then(|i| self.streams.get(i))
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

fn validate_stream(stream: &DesiredStream) -> Result<()> {
    let reject = |reason: &str| {
        Err(Error::Manifest {
            name: stream.name.clone(),
            reason: reason.to_string(),
        })
    };

    if stream.name.is_empty() {
        return reject("stream name must not be empty");
    }
    if stream.name.starts_with('.') {
        return reject("stream name must not start with '.'");
    }
    if !stream
        .name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return reject("stream name may only contain ASCII letters, digits, '-', '_' and '.'");
    }
    if !stream.email.contains('@') || stream.email.chars().any(char::is_whitespace) {
        return reject("email must be a single address");
    }
    let bad_jid = |jid: &String| !jid.contains('@') || jid.chars().any(char::is_whitespace);
    if stream.jid.as_ref().is_some_and(bad_jid) {
        return reject("jid must be a bare JID");
    }
    Ok(())
}
