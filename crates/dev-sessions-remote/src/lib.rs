//! SSH/tmux remote executor.
//!
//! Translates session operations into tmux commands executed on the
//! remote host over SSH, and interprets their textual output. All
//! knowledge of the remote session's on-the-wire representation lives
//! here.

pub mod command;
pub mod ssh;

use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use dev_sessions_core::{CliChoice, RemoteError, RemoteExecutor, RunMode};

use command::{CommandBuildError, TmuxCommand};
use ssh::SshRunner;

pub use command::PROGRAM_SIGNATURE;
pub use ssh::SshConfig;

/// How long to let the launched CLI settle before dismissing its
/// first-run prompt.
const SETTLE_DELAY: Duration = Duration::from_secs(5);

impl From<CommandBuildError> for RemoteError {
    fn from(err: CommandBuildError) -> Self {
        Self::CommandBuild(err.to_string())
    }
}

/// Executor backed by SSH and tmux on the remote host.
pub struct SshTmuxExecutor {
    runner: SshRunner,
    settle_delay: Duration,
}

impl SshTmuxExecutor {
    /// Create an executor for the given SSH target.
    #[must_use]
    pub fn new(config: &SshConfig) -> Self {
        Self {
            runner: SshRunner::new(config),
            settle_delay: SETTLE_DELAY,
        }
    }

    async fn run(&self, command: &TmuxCommand<'_>) -> Result<String, RemoteError> {
        self.runner.run(&command.render()?).await
    }
}

#[async_trait]
impl RemoteExecutor for SshTmuxExecutor {
    async fn create_remote_session(
        &self,
        remote_name: &str,
        workspace_path: &str,
        cli: CliChoice,
        mode: RunMode,
    ) -> Result<(), RemoteError> {
        let program = cli.launch_command(mode);

        // Starting with a bare interactive shell loads the user's rc
        // files, so wrapper scripts and PATH additions are available.
        self.run(&TmuxCommand::NewDetached { name: remote_name }).await?;
        self.run(&TmuxCommand::LaunchProgram {
            name: remote_name,
            workspace_path,
            program,
        })
        .await?;

        // Give the CLI time to draw its first-run prompt, then press
        // Enter to dismiss it. Best effort: nothing is read back.
        tokio::time::sleep(self.settle_delay).await;
        self.run(&TmuxCommand::SubmitKey { name: remote_name }).await?;

        tracing::info!(remote_name, program, "created remote session");
        Ok(())
    }

    async fn is_program_running(&self, remote_name: &str) -> bool {
        // grep exits non-zero when nothing matches, which surfaces here
        // as an error; absence of evidence is treated as "not running".
        match self.run(&TmuxCommand::ListProgramProcesses { name: remote_name }).await {
            Ok(output) => !output.trim().is_empty(),
            Err(_) => false,
        }
    }

    async fn send_message(&self, remote_name: &str, text: &str) -> Result<(), RemoteError> {
        if !self.is_program_running(remote_name).await {
            return Err(RemoteError::NoLiveProgram);
        }

        let encoded = BASE64.encode(text.as_bytes());
        self.run(&TmuxCommand::SendLiteral {
            name: remote_name,
            encoded: &encoded,
        })
        .await?;

        // Both CLIs treat the first Enter as newline insertion; only the
        // second submits the buffered input.
        self.run(&TmuxCommand::SubmitKey { name: remote_name }).await?;
        self.run(&TmuxCommand::SubmitKey { name: remote_name }).await?;

        Ok(())
    }

    async fn capture_output(&self, remote_name: &str, lines: i64) -> Result<String, RemoteError> {
        self.run(&TmuxCommand::CapturePane {
            name: remote_name,
            lines,
        })
        .await
        .map_err(|e| match e {
            timeout @ RemoteError::Timeout(_) => timeout,
            other => RemoteError::CaptureFailed(other.to_string()),
        })
    }

    async fn session_exists(&self, remote_name: &str) -> bool {
        self.run(&TmuxCommand::HasSession { name: remote_name })
            .await
            .is_ok()
    }

    async fn list_remote_sessions(&self) -> Vec<String> {
        match self.run(&TmuxCommand::ListSessions).await {
            Ok(output) => output
                .lines()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            // tmux errors when no server is running; that simply means
            // there are no sessions.
            Err(_) => Vec::new(),
        }
    }

    async fn kill_session(&self, remote_name: &str) -> Result<(), RemoteError> {
        self.run(&TmuxCommand::KillSession { name: remote_name })
            .await
            .map_err(|e| match e {
                timeout @ RemoteError::Timeout(_) => timeout,
                other => RemoteError::KillFailed(other.to_string()),
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_payload_is_transport_safe() {
        let hostile = "hello; rm -rf / && `reboot` $(shutdown)";
        let encoded = BASE64.encode(hostile.as_bytes());

        // The encoded form carries none of the shell metacharacters.
        assert!(encoded.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=')));
        let decoded = BASE64.decode(&encoded).expect("decode");
        assert_eq!(decoded, hostile.as_bytes());
    }
}
