//! External collaborators of a reconciliation run.
//!
//! Each collaborator is a narrow async trait so the engine can be exercised
//! against fakes; the production implementations shell out:
//!
//! | Trait                    | Production impl     | Program              |
//! |--------------------------|---------------------|----------------------|
//! | [`IdentityRegistrar`]    | [`Prosodyctl`]      | `prosodyctl`         |
//! | [`NotificationDispatcher`] | [`Sendmail`]      | `sendmail`           |
//! | [`MembershipSync`]       | [`StreamMucManager`] | `stream-muc-manager` |
//! | [`ServiceReloader`]      | [`Systemctl`]       | `systemctl`          |

mod membership;
mod registrar;
mod sendmail;
mod systemd;

use std::fmt;
use std::process::ExitStatus;
use std::sync::Arc;

use async_trait::async_trait;

use crate::notification::Notification;

pub use membership::StreamMucManager;
pub use registrar::Prosodyctl;
pub use sendmail::Sendmail;
pub use systemd::Systemctl;

/// Failure of an external program.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{description} failed ({status}): {stderr}")]
    Failed {
        description: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A room that must exist with `jid` as its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomEnsure {
    pub room: String,
    pub jid: String,
}

impl fmt::Display for RoomEnsure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.room, self.jid)
    }
}

/// What [`ServiceReloader::reload_if_active`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    Reloaded,
    /// The service is not running; it will read the store when it starts.
    Inactive,
}

impl fmt::Display for ReloadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reloaded => write!(f, "reloaded"),
            Self::Inactive => write!(f, "inactive"),
        }
    }
}

/// Creates chat accounts for streams without an explicit JID.
#[async_trait]
pub trait IdentityRegistrar: Send + Sync {
    async fn register_identity(
        &self,
        username: &str,
        host: &str,
        password: &str,
    ) -> Result<(), ToolError>;
}

/// Delivers credentials mail.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, notification: &Notification) -> Result<(), ToolError>;
}

/// Converges chat room membership to exactly `ensure` minus `remove`.
#[async_trait]
pub trait MembershipSync: Send + Sync {
    async fn sync_membership(&self, ensure: &[RoomEnsure], remove: &[String])
    -> Result<(), ToolError>;
}

/// Makes the ingest service pick up store changes.
#[async_trait]
pub trait ServiceReloader: Send + Sync {
    async fn reload_if_active(&self) -> Result<ReloadOutcome, ToolError>;
}

/// The full set of collaborators a run talks to.
#[derive(Clone)]
pub struct Toolbox {
    pub registrar: Arc<dyn IdentityRegistrar>,
    pub dispatcher: Arc<dyn NotificationDispatcher>,
    pub membership: Arc<dyn MembershipSync>,
    pub reloader: Arc<dyn ServiceReloader>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_ensure_is_tab_separated() {
        let entry = RoomEnsure {
            room: "radio@streamchat.example.com".into(),
            jid: "radio@example.com".into(),
        };
        assert_eq!(
            entry.to_string(),
            "radio@streamchat.example.com\tradio@example.com"
        );
    }
}
