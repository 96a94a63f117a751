use async_trait::async_trait;

use super::{IdentityRegistrar, ToolError};
use crate::cmd::run_cmd;

/// Registers XMPP accounts through `prosodyctl register`.
#[derive(Debug, Clone)]
pub struct Prosodyctl {
    program: String,
}

impl Prosodyctl {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for Prosodyctl {
    fn default() -> Self {
        Self::new("prosodyctl")
    }
}

#[async_trait]
impl IdentityRegistrar for Prosodyctl {
    async fn register_identity(
        &self,
        username: &str,
        host: &str,
        password: &str,
    ) -> Result<(), ToolError> {
        run_cmd(
            &format!("registering XMPP account {username}@{host}"),
            &self.program,
            &["register", username, host, password],
            &[password],
        )
        .await
    }
}
