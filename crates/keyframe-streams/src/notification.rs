//! Credentials mail sent to the owner of a newly provisioned stream.

use std::fmt;

use keyframe_core::SiteConfig;
use keyframe_crypto::SrtCredentials;
use zeroize::Zeroizing;

/// Login of a generated XMPP account.
#[derive(Clone, PartialEq, Eq)]
pub struct AccountCredentials {
    pub jid: String,
    pub password: Zeroizing<String>,
}

/// Everything the owner of a new stream needs to start pushing to it.
#[derive(Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipient: String,
    pub stream: String,
    pub domain: String,
    pub page_url: String,
    pub srt_url: String,
    /// Present only when the stream got a generated account.
    pub account: Option<AccountCredentials>,
}

impl Notification {
    pub fn new(
        site: &SiteConfig,
        stream: &str,
        recipient: &str,
        srt: &SrtCredentials,
        account: Option<AccountCredentials>,
    ) -> Self {
        Self {
            recipient: recipient.to_string(),
            stream: stream.to_string(),
            domain: site.domain.clone(),
            page_url: site.page_url(stream),
            srt_url: srt.connection_url(&site.ingest_host(), site.srt_port),
            account,
        }
    }

    pub fn subject(&self) -> String {
        format!("New stream at {}", self.domain)
    }

    pub fn body(&self) -> String {
        let mut body = format!(
            "Stream URL: {}\nStream SRT URL: {}\n",
            self.page_url, self.srt_url
        );
        if let Some(account) = &self.account {
            body.push_str(&format!(
                "\nXMPP username: {}\nXMPP password: {}\n",
                account.jid,
                account.password.as_str()
            ));
        }
        body
    }

    /// RFC 5322 message as handed to `sendmail`: a subject header, a blank
    /// line, then the body.
    pub fn to_mail(&self) -> String {
        format!("Subject: {}\n\n{}", self.subject(), self.body())
    }
}

impl fmt::Debug for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notification")
            .field("recipient", &self.recipient)
            .field("stream", &self.stream)
            .field("has_account", &self.account.is_some())
            .finish_non_exhaustive()
    }
}
