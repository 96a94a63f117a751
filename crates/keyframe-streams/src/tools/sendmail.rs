use async_trait::async_trait;

use super::{NotificationDispatcher, ToolError};
use crate::cmd::run_cmd_with_input;
use crate::notification::Notification;

/// Hands credentials mail to the local MTA via `sendmail <recipient>`.
#[derive(Debug, Clone)]
pub struct Sendmail {
    program: String,
}

impl Sendmail {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for Sendmail {
    fn default() -> Self {
        Self::new("sendmail")
    }
}

#[async_trait]
impl NotificationDispatcher for Sendmail {
    async fn dispatch(&self, notification: &Notification) -> Result<(), ToolError> {
        let mail = zeroize::Zeroizing::new(notification.to_mail());
        run_cmd_with_input(
            &format!("mailing credentials for stream {}", notification.stream),
            &self.program,
            &[notification.recipient.as_str()],
            &[],
            Some(mail.as_bytes()),
        )
        .await
    }
}
