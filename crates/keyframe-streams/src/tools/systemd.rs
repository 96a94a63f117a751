use async_trait::async_trait;

use super::{ReloadOutcome, ServiceReloader, ToolError};
use crate::cmd::{cmd_succeeds, run_cmd};

/// Reloads a systemd unit if, and only if, it is currently active.
#[derive(Debug, Clone)]
pub struct Systemctl {
    unit: String,
}

impl Systemctl {
    pub fn new(unit: impl Into<String>) -> Self {
        Self { unit: unit.into() }
    }

    /// Check whether the unit is currently active.
    pub async fn is_active(&self) -> bool {
        cmd_succeeds("systemctl", &["is-active", "--quiet", &self.unit]).await
    }
}

#[async_trait]
impl ServiceReloader for Systemctl {
    async fn reload_if_active(&self) -> Result<ReloadOutcome, ToolError> {
        if !self.is_active().await {
            tracing::info!(unit = %self.unit, "service not active, skipping reload");
            return Ok(ReloadOutcome::Inactive);
        }
        run_cmd(
            &format!("reloading {}", self.unit),
            "systemctl",
            &["reload", &self.unit],
            &[],
        )
        .await?;
        Ok(ReloadOutcome::Reloaded)
    }
}
