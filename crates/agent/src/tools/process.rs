//! Bounded child-process execution shared by the shell tools.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use super::ToolError;

#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutput {
    /// Combined stdout and stderr, cut to the ceiling.
    pub text: String,
    pub truncated: bool,
    /// `None` when the process was killed.
    pub exit_code: Option<i32>,
}

/// Run `script` under `shell -c` with stderr folded into stdout.
///
/// The shell leads its own process group. When `timeout` elapses or output
/// exceeds `max_output` bytes the whole group is killed, so nothing the
/// script started outlives the call.
pub async fn run_capped(
    shell: &str,
    script: &str,
    timeout: Duration,
    max_output: usize,
) -> Result<CommandOutput, ToolError> {
    let mut command = Command::new(shell);
    command
        .arg("-c")
        .arg(format!("exec 2>&1\n{}", script))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let mut child = command
        .spawn()
        .map_err(|e| ToolError::Failed(format!("Failed to execute command: {}", e)))?;
    let group = child.id();

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ToolError::Failed("Failed to capture command output".to_string()))?;

    let run = async {
        let mut buf = Vec::new();
        stdout
            .take(max_output as u64 + 1)
            .read_to_end(&mut buf)
            .await?;

        let truncated = buf.len() > max_output;
        if truncated {
            buf.truncate(char_boundary(&buf, max_output));
            kill_group(&mut child, group);
        }
        let status = child.wait().await?;
        Ok::<_, std::io::Error>((buf, truncated, status))
    };
    let result = tokio::time::timeout(timeout, run).await;

    match result {
        Ok(Ok((buf, truncated, status))) => {
            debug!("{} exited with {:?}, {} bytes", shell, status.code(), buf.len());
            Ok(CommandOutput {
                text: String::from_utf8_lossy(&buf).into_owned(),
                truncated,
                exit_code: status.code(),
            })
        }
        Ok(Err(e)) => Err(ToolError::Failed(format!("Error executing command: {}", e))),
        Err(_) => {
            warn!("command exceeded {:?}, killing process group", timeout);
            kill_group(&mut child, group);
            let _ = child.wait().await;
            Err(ToolError::TimedOut(timeout.as_secs()))
        }
    }
}

/// Largest cut at or below `max` that does not split a UTF-8 sequence.
fn char_boundary(buf: &[u8], max: usize) -> usize {
    let mut cut = max.min(buf.len());
    // at most three continuation bytes follow a lead byte
    for _ in 0..3 {
        match buf.get(cut) {
            Some(byte) if cut > 0 && byte & 0xC0 == 0x80 => cut -= 1,
            _ => break,
        }
    }
    cut
}

fn kill_group(child: &mut Child, group: Option<u32>) {
    #[cfg(unix)]
    {
        if let Some(pgid) = group {
            // SAFETY: killpg takes plain integers; the group id came from our own spawn.
            let rc = unsafe { libc::killpg(pgid as libc::pid_t, libc::SIGKILL) };
            if rc != 0 {
                debug!("killpg({}) failed: {}", pgid, std::io::Error::last_os_error());
            }
        }
    }
    #[cfg(not(unix))]
    let _ = group;

    let _ = child.start_kill();
}
