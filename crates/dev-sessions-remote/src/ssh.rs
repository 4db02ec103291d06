//! SSH transport for remote command execution.

use std::process::Stdio;
use std::time::Duration;

use dev_sessions_core::RemoteError;
use tokio::process::Command;
use tokio::time::timeout;

/// Connection parameters for the remote host.
#[derive(Debug, Clone)]
pub struct SshConfig {
    pub host: String,
    pub user: String,
    pub port: u16,
    /// TCP connect budget, passed to ssh as `ConnectTimeout`.
    pub connect_timeout: Duration,
    /// Whole-call budget for each remote command.
    pub exec_timeout: Duration,
}

impl SshConfig {
    /// Config with the default timeouts (5s connect, 10s execution).
    #[must_use]
    pub fn new(host: impl Into<String>, user: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            port,
            connect_timeout: Duration::from_secs(5),
            exec_timeout: Duration::from_secs(10),
        }
    }
}

/// Runs single commands on the remote host, non-interactively.
#[derive(Debug)]
pub(crate) struct SshRunner {
    target: String,
    options: Vec<String>,
    exec_timeout: Duration,
}

impl SshRunner {
    pub(crate) fn new(config: &SshConfig) -> Self {
        let mut options = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", config.connect_timeout.as_secs()),
        ];
        if config.port != 22 {
            options.push("-p".to_string());
            options.push(config.port.to_string());
        }

        Self {
            target: format!("{}@{}", config.user, config.host),
            options,
            exec_timeout: config.exec_timeout,
        }
    }

    /// Execute `remote_command` on the host and return its stdout.
    ///
    /// The command string is passed as a single argv entry; ssh hands it
    /// to the remote shell unchanged. A call that outlives the execution
    /// budget fails with `Timeout` instead of hanging the request.
    pub(crate) async fn run(&self, remote_command: &str) -> Result<String, RemoteError> {
        let mut cmd = Command::new("ssh");
        cmd.args(&self.options)
            .arg(&self.target)
            .arg(remote_command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(ssh_target = %self.target, command = remote_command, "running remote command");

        let output = timeout(self.exec_timeout, cmd.output())
            .await
            .map_err(|_| RemoteError::Timeout(self.exec_timeout))?
            .map_err(|e| RemoteError::Ssh(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RemoteError::Ssh(format!(
                "{}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
