use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use zeroize::Zeroizing;

use super::{MembershipSync, RoomEnsure, ToolError};
use crate::cmd::run_cmd;

/// Drives `stream-muc-manager`, which owns the chat rooms.
///
/// The ensure and remove lists are passed as files, one entry per line.
#[derive(Debug, Clone)]
pub struct StreamMucManager {
    program: String,
    jid: String,
    password_file: PathBuf,
}

impl StreamMucManager {
    pub fn new(program: impl Into<String>, jid: impl Into<String>, password_file: PathBuf) -> Self {
        Self {
            program: program.into(),
            jid: jid.into(),
            password_file,
        }
    }
}

fn write_list<T: std::fmt::Display>(entries: &[T]) -> Result<NamedTempFile, ToolError> {
    let mut file = NamedTempFile::new()?;
    for entry in entries {
        writeln!(file, "{entry}")?;
    }
    file.flush()?;
    Ok(file)
}

#[async_trait]
impl MembershipSync for StreamMucManager {
    async fn sync_membership(
        &self,
        ensure: &[RoomEnsure],
        remove: &[String],
    ) -> Result<(), ToolError> {
        let password = Zeroizing::new(
            tokio::fs::read_to_string(&self.password_file)
                .await?
                .trim()
                .to_string(),
        );
        let password: &str = &password;
        let ensure_file = write_list(ensure)?;
        let remove_file = write_list(remove)?;
        let ensure_path = ensure_file.path().to_string_lossy().into_owned();
        let remove_path = remove_file.path().to_string_lossy().into_owned();

        run_cmd(
            &format!(
                "syncing chat rooms ({} ensure, {} remove)",
                ensure.len(),
                remove.len()
            ),
            &self.program,
            &[
                "-jid",
                &self.jid,
                "-password",
                password,
                "-ensure",
                &ensure_path,
                "-remove",
                &remove_path,
            ],
            &[password],
        )
        .await
    }
}

#[cfg(all(test, unix))]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::os::unix::fs::PermissionsExt;

    use super::*;

    #[tokio::test]
    async fn lists_and_credentials_are_passed_to_program() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let password_file = dir.path().join("xmpp-password");
        std::fs::write(&password_file, "s3cret\n").unwrap();
        let script = dir.path().join("fake-muc-manager");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\n{{ echo \"$2 $4\"; cat \"$6\"; echo --; cat \"$8\"; }} > {}\n",
                out.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let manager = StreamMucManager::new(
            script.to_string_lossy(),
            "stream-muc-manager@streamadmin.example.com",
            password_file,
        );
        manager
            .sync_membership(
                &[RoomEnsure {
                    room: "radio@streamchat.example.com".into(),
                    jid: "radio@example.com".into(),
                }],
                &["old@streamchat.example.com".into()],
            )
            .await
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(out).unwrap(),
            "stream-muc-manager@streamadmin.example.com s3cret\n\
             radio@streamchat.example.com\tradio@example.com\n\
             --\n\
             old@streamchat.example.com\n"
        );
    }

    #[tokio::test]
    async fn missing_password_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let manager = StreamMucManager::new("true", "a@b", dir.path().join("absent"));
        assert!(manager.sync_membership(&[], &[]).await.is_err());
    }
}
