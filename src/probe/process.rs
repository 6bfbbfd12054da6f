use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::error::{ProbeError, report};

/// Captured result of an external command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs external tools on behalf of the subprocess-backed probes.
pub trait CommandRunner: Send + Sync {
    fn run(
        &self,
        program: &str,
        args: &[String],
        stdin: Option<&[u8]>,
        timeout: Duration,
    ) -> impl Future<Output = Result<CommandOutput, ProbeError>> + Send;
}

/// Spawns real processes with tokio. A child still running at the timeout is killed on drop.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        stdin: Option<&[u8]>,
        timeout: Duration,
    ) -> Result<CommandOutput, ProbeError> {
        log::debug!("Running {} {}", program, args.join(" "));

        let mut child = Command::new(program)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ProbeError::Subprocess(format!("failed to run {program}: {}", report(&e))))?;

        let input = stdin.map(<[u8]>::to_vec);
        let pipe = child.stdin.take();

        let run = async move {
            if let (Some(mut pipe), Some(input)) = (pipe, input) {
                pipe.write_all(&input).await?;
                // Closing stdin lets tools that read to EOF proceed.
                drop(pipe);
            }
            child.wait_with_output().await
        };

        let output = tokio::time::timeout(timeout, run)
            .await
            .map_err(|_| ProbeError::Timeout {
                phase: "subprocess",
                after: timeout,
            })?
            .map_err(|e| ProbeError::Subprocess(format!("{program}: {}", report(&e))))?;

        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
