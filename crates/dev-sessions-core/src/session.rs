//! Session metadata types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of a registered session.
///
/// Status only ever moves `Active` -> `Inactive`. Inactive rows are
/// deleted by the gateway's reconciliation pass, never resurrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// The remote counterpart was alive the last time we looked.
    Active,
    /// The remote counterpart was confirmed gone; awaiting deletion.
    Inactive,
}

impl SessionStatus {
    /// Storage representation of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing a status string from storage.
#[derive(Debug, Error)]
#[error("unknown session status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for SessionStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// Which interactive CLI a session runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CliChoice {
    #[default]
    Claude,
    Codex,
}

/// How the CLI is launched on the remote host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Launch through the host's container wrapper scripts.
    #[default]
    Sandboxed,
    /// Launch the CLI directly on the host.
    Native,
}

impl CliChoice {
    /// Command injected into the remote shell to start the program.
    ///
    /// Sandboxed mode uses the host-provided wrapper scripts that run the
    /// CLI inside a dev container; native mode runs it directly.
    #[must_use]
    pub const fn launch_command(self, mode: RunMode) -> &'static str {
        match (self, mode) {
            (Self::Claude, RunMode::Sandboxed) => "clauded",
            (Self::Claude, RunMode::Native) => "claude",
            (Self::Codex, RunMode::Sandboxed) => "codexed",
            (Self::Codex, RunMode::Native) => "codex",
        }
    }
}

/// A registered developer session.
///
/// The row is a cache of the remote tmux session, which remains the
/// ground truth; callers reconcile against it before trusting `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Short human-memorable slug, unique among registered sessions.
    pub id: String,
    /// Tmux session name on the host; always `to_remote_name(id)`.
    pub remote_name: String,
    /// Free-text description.
    pub description: String,
    /// Free-text creator label; the quota partition key.
    pub creator: String,
    /// Absolute path on the remote host where the program runs.
    pub workspace_path: String,
    /// Creation timestamp (Unix epoch milliseconds).
    pub created_at: i64,
    /// Updated on every successful read/write interaction.
    pub last_used: i64,
    /// Current status.
    pub status: SessionStatus,
}
