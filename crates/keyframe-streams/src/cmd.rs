use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::tools::ToolError;

/// Render a command line for logs, masking any argument listed in `secrets`.
pub fn display_cmd(program: &str, args: &[&str], secrets: &[&str]) -> String {
    let shown: Vec<&str> = args
        .iter()
        .map(|arg| if secrets.contains(arg) { "***" } else { *arg })
        .collect();
    format!("{program} {}", shown.join(" "))
}

/// Execute a command with logging. Logs the (masked) command line at debug
/// level and a human-friendly description at info level.
pub async fn run_cmd(
    description: &str,
    program: &str,
    args: &[&str],
    secrets: &[&str],
) -> Result<(), ToolError> {
    run_cmd_with_input(description, program, args, secrets, None).await
}

/// Execute a command, feeding `input` to its stdin (or `/dev/null` if `None`).
pub async fn run_cmd_with_input(
    description: &str,
    program: &str,
    args: &[&str],
    secrets: &[&str],
    input: Option<&[u8]>,
) -> Result<(), ToolError> {
    let cmd_line = display_cmd(program, args, secrets);
    tracing::info!("{description}");
    tracing::debug!("exec: {cmd_line}");

    let mut child = Command::new(program)
        .args(args)
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ToolError::Spawn {
            program: program.to_string(),
            source,
        })?;

    // Feed stdin while stderr is drained, or a chatty child blocks on a full pipe.
    let stdin = child.stdin.take();
    let feed = async move {
        if let (Some(input), Some(mut stdin)) = (input, stdin) {
            stdin.write_all(input).await?;
            // Close stdin so the child sees EOF.
            drop(stdin);
        }
        Ok::<(), std::io::Error>(())
    };
    let (fed, output) = tokio::join!(feed, child.wait_with_output());
    let output = output?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        tracing::error!("command failed: {cmd_line}\nstderr: {stderr}");
        return Err(ToolError::Failed {
            description: description.to_string(),
            status: output.status,
            stderr,
        });
    }
    fed?;
    Ok(())
}

/// Run a command purely for its exit status. Spawn failures count as `false`.
pub async fn cmd_succeeds(program: &str, args: &[&str]) -> bool {
    tracing::debug!("exec (status): {}", display_cmd(program, args, &[]));
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .is_ok_and(|s| s.success())
}
