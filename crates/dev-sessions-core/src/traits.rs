//! Seams between the gateway and its storage / remote-execution backends.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::session::{CliChoice, RunMode, Session, SessionStatus};

/// Default number of terminal lines returned by an output read.
pub const DEFAULT_CAPTURE_LINES: i64 = 100;

/// Bounds applied to every output read, regardless of caller input.
pub const MIN_CAPTURE_LINES: i64 = 1;
/// Upper bound on terminal lines per output read.
pub const MAX_CAPTURE_LINES: i64 = 1000;

/// Clamp a requested line count into the supported capture range.
#[must_use]
pub fn clamp_capture_lines(lines: i64) -> u32 {
    u32::try_from(lines.clamp(MIN_CAPTURE_LINES, MAX_CAPTURE_LINES)).unwrap_or(1)
}

/// Storage error.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique-constraint violation on the session key or tmux name.
    ///
    /// Surfaced when a concurrent create wins the insert race; the store
    /// is the final arbiter for id collisions.
    #[error("duplicate session key: {0}")]
    DuplicateKey(String),
    #[error("storage error: {0}")]
    Internal(String),
}

/// Registry of session metadata.
///
/// Sole source of truth for "does this session exist and what is its
/// recorded status". Implementations must enforce uniqueness of
/// `remote_name` across all rows.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a new `active` row with both timestamps set to now.
    ///
    /// # Errors
    /// Returns `DuplicateKey` if the id or its tmux name already exists.
    async fn create(
        &self,
        id: &str,
        description: &str,
        creator: &str,
        workspace_path: &str,
    ) -> Result<Session, StoreError>;

    /// Get a session by id.
    ///
    /// # Errors
    /// Returns error on backend failure; an unknown id is `Ok(None)`.
    async fn get(&self, id: &str) -> Result<Option<Session>, StoreError>;

    /// List sessions sorted by `last_used` descending, optionally
    /// filtered by status.
    ///
    /// # Errors
    /// Returns error on backend failure.
    async fn list(&self, status: Option<SessionStatus>) -> Result<Vec<Session>, StoreError>;

    /// Refresh `last_used`. No-op when the id is absent.
    ///
    /// # Errors
    /// Returns error on backend failure.
    async fn touch(&self, id: &str) -> Result<(), StoreError>;

    /// Set the status and bump `last_used`.
    ///
    /// # Errors
    /// Returns error on backend failure.
    async fn set_status(&self, id: &str, status: SessionStatus) -> Result<(), StoreError>;

    /// Remove the row. Idempotent: deleting an absent id succeeds.
    ///
    /// # Errors
    /// Returns error on backend failure.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Release the underlying storage handle.
    async fn close(&self);
}

/// Remote execution error.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The remote call exceeded its execution timeout.
    #[error("remote command timed out after {0:?}")]
    Timeout(Duration),
    /// Safety gate: no expected program detected in the session.
    #[error("no interactive CLI is running in this session - refusing to send message")]
    NoLiveProgram,
    #[error("failed to read session output: {0}")]
    CaptureFailed(String),
    #[error("failed to kill session: {0}")]
    KillFailed(String),
    #[error("failed to build remote command: {0}")]
    CommandBuild(String),
    /// Transport-level failure, carrying the underlying message.
    #[error("ssh command failed: {0}")]
    Ssh(String),
}

/// Issues commands against remote tmux sessions over a secure channel.
///
/// Existence and liveness probes return plain booleans and swallow
/// remote-side errors: a probe that fails because there is nothing there
/// is policy-equivalent to confirmed absence.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Start a detached tmux session and launch the chosen CLI in it.
    ///
    /// Best-effort choreography; nothing is read back, and callers must
    /// not assume the program is ready when this returns.
    ///
    /// # Errors
    /// Returns error if any remote command fails or times out.
    async fn create_remote_session(
        &self,
        remote_name: &str,
        workspace_path: &str,
        cli: CliChoice,
        mode: RunMode,
    ) -> Result<(), RemoteError>;

    /// Whether one of the expected CLI processes is attached to the
    /// session's terminal. Any probe failure yields `false`.
    async fn is_program_running(&self, remote_name: &str) -> bool;

    /// Deliver `text` literally to the session's input, then submit it.
    ///
    /// # Errors
    /// Returns `NoLiveProgram` when the liveness gate fails, or a
    /// transport error.
    async fn send_message(&self, remote_name: &str, text: &str) -> Result<(), RemoteError>;

    /// Return the last `lines` lines of the session's terminal buffer.
    /// `lines` is clamped to the capture range before use.
    ///
    /// # Errors
    /// Returns `CaptureFailed` on remote error.
    async fn capture_output(&self, remote_name: &str, lines: i64) -> Result<String, RemoteError>;

    /// Whether the tmux session exists. Any probe failure yields `false`.
    async fn session_exists(&self, remote_name: &str) -> bool;

    /// Names of all tmux sessions on the host; empty when none exist.
    async fn list_remote_sessions(&self) -> Vec<String>;

    /// Best-effort session termination.
    ///
    /// # Errors
    /// Returns `KillFailed` if the remote command errors.
    async fn kill_session(&self, remote_name: &str) -> Result<(), RemoteError>;
}
