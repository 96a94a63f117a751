//! SRT connection credentials of a provisioned stream.

use std::fmt;

use crate::derive::SecretDeriver;

/// Stream id and passphrase an encoder needs to push to the ingest service.
///
/// The stream id embeds the ingest store's row id; the passphrase is the keyed
/// digest of the stream id and is recomputed rather than stored.
#[derive(Clone, PartialEq, Eq)]
pub struct SrtCredentials {
    pub stream_id: String,
    pub passphrase: String,
}

impl SrtCredentials {
    /// Stream id for the ingest row `ingest_id`, in SRT access-control syntax.
    pub fn stream_id_for(ingest_id: i64) -> String {
        format!("#!::u={ingest_id}")
    }

    pub fn derive(deriver: &dyn SecretDeriver, ingest_id: i64) -> Self {
        let stream_id = Self::stream_id_for(ingest_id);
        let passphrase = deriver.derive(stream_id.as_bytes());
        Self {
            stream_id,
            passphrase,
        }
    }

    /// `srt://` URL an encoder can be pointed at directly.
    pub fn connection_url(&self, host: &str, port: u16) -> String {
        format!(
            "srt://{host}:{port}?streamid={}&passphrase={}",
            self.stream_id, self.passphrase
        )
    }
}

impl fmt::Debug for SrtCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SrtCredentials")
            .field("stream_id", &self.stream_id)
            .field("passphrase", &"[REDACTED]")
            .finish()
    }
}
