//! The gateway service and its policy logic.

use chrono::{DateTime, SecondsFormat, Utc};
use dev_sessions_core::{
    CliChoice, DEFAULT_CAPTURE_LINES, IdGenerator, RemoteError, RemoteExecutor, RunMode, Session,
    SessionStatus, SessionStore, StoreError, clamp_capture_lines,
};
use serde::Serialize;
use thiserror::Error;

use crate::validate::validate_workspace_path;

/// Bound on the generate-and-check id loop. A best-effort mitigation for
/// concurrent collisions; the store's uniqueness constraint is the final
/// arbiter.
const ID_ATTEMPTS: u32 = 10;

/// Gateway error.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("rate limit exceeded: {creator} has {count} active sessions (max: {limit})")]
    QuotaExceeded {
        creator: String,
        count: usize,
        limit: usize,
    },
    #[error("failed to generate unique session id after {0} attempts")]
    IdExhausted(u32),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Result of a successful session creation.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedSession {
    pub session: Session,
    /// Human-readable hint for attaching to the tmux session directly.
    pub attach_hint: String,
}

/// Wire-friendly session listing entry (ISO-8601 timestamps).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub tmux_session_name: String,
    pub description: String,
    pub creator: String,
    pub workspace_path: String,
    pub created_at: String,
    pub last_used: String,
    pub status: SessionStatus,
}

fn to_iso(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl From<Session> for SessionSummary {
    fn from(session: Session) -> Self {
        Self {
            session_id: session.id,
            tmux_session_name: session.remote_name,
            description: session.description,
            creator: session.creator,
            workspace_path: session.workspace_path,
            created_at: to_iso(session.created_at),
            last_used: to_iso(session.last_used),
            status: session.status,
        }
    }
}

/// Composes the registry and the remote executor under one policy.
///
/// Constructed once at startup and shared by reference across request
/// handlers; all state lives in the store or on the remote host.
pub struct GatewayService<S, R> {
    store: S,
    remote: R,
    ids: Box<dyn IdGenerator>,
    max_sessions_per_creator: usize,
}

impl<S, R> GatewayService<S, R>
where
    S: SessionStore,
    R: RemoteExecutor,
{
    /// Create a new gateway service.
    #[must_use]
    pub fn new(
        store: S,
        remote: R,
        ids: Box<dyn IdGenerator>,
        max_sessions_per_creator: usize,
    ) -> Self {
        Self {
            store,
            remote,
            ids,
            max_sessions_per_creator,
        }
    }

    /// Register a session and start its remote counterpart.
    ///
    /// The row is persisted before the remote session is created and is
    /// deliberately not rolled back if the remote call fails: a partial
    /// failure leaves a discoverable row that garbage collection reaps
    /// once the remote side is confirmed absent, rather than a remote
    /// session with no record.
    ///
    /// # Errors
    /// `InvalidInput` for an unsafe path, `QuotaExceeded` when the
    /// creator is at the active-session limit, `IdExhausted` when no
    /// unique id could be generated, or a store/remote error.
    pub async fn create_session(
        &self,
        workspace_path: &str,
        description: &str,
        creator: &str,
        cli: CliChoice,
        mode: RunMode,
    ) -> Result<CreatedSession, GatewayError> {
        validate_workspace_path(workspace_path)?;
        self.check_quota(creator).await?;

        let session = self
            .insert_with_fresh_id(description, creator, workspace_path)
            .await?;

        if let Err(err) = self
            .remote
            .create_remote_session(&session.remote_name, workspace_path, cli, mode)
            .await
        {
            tracing::warn!(
                id = %session.id,
                error = %err,
                "remote session creation failed; row kept for reconciliation"
            );
            return Err(err.into());
        }

        tracing::info!(
            id = %session.id,
            remote_name = %session.remote_name,
            creator,
            "created session"
        );

        let attach_hint = format!(
            "Dev session created. Attach with: tmux attach -t {}",
            session.remote_name
        );
        Ok(CreatedSession {
            session,
            attach_hint,
        })
    }

    async fn check_quota(&self, creator: &str) -> Result<(), GatewayError> {
        let active = self.store.list(Some(SessionStatus::Active)).await?;
        let count = active.iter().filter(|s| s.creator == creator).count();
        if count >= self.max_sessions_per_creator {
            return Err(GatewayError::QuotaExceeded {
                creator: creator.to_string(),
                count,
                limit: self.max_sessions_per_creator,
            });
        }
        Ok(())
    }

    async fn insert_with_fresh_id(
        &self,
        description: &str,
        creator: &str,
        workspace_path: &str,
    ) -> Result<Session, GatewayError> {
        for _ in 0..ID_ATTEMPTS {
            let id = self.ids.generate();
            if self.store.get(&id).await?.is_some() {
                continue;
            }
            match self
                .store
                .create(&id, description, creator, workspace_path)
                .await
            {
                Ok(session) => return Ok(session),
                // Lost the insert race to a concurrent create; the
                // constraint, not the pre-check, decides.
                Err(StoreError::DuplicateKey(_)) => continue,
                Err(other) => return Err(other.into()),
            }
        }
        Err(GatewayError::IdExhausted(ID_ATTEMPTS))
    }

    /// Look up a session and reconcile against the remote ground truth.
    ///
    /// A remote-confirmed disappearance marks the row inactive before
    /// the `NotFound` is returned; this deliberate side effect of the
    /// read path keeps the registry honest between GC passes.
    async fn live_session(&self, id: &str) -> Result<Session, GatewayError> {
        let session = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;

        if !self.remote.session_exists(&session.remote_name).await {
            self.store.set_status(id, SessionStatus::Inactive).await?;
            return Err(GatewayError::NotFound(format!(
                "remote session {} no longer exists",
                session.remote_name
            )));
        }

        Ok(session)
    }

    /// Deliver a message to the session's program.
    ///
    /// # Errors
    /// `NotFound` for an unknown id or a remote-confirmed-gone session;
    /// `NoLiveProgram` (propagated verbatim) when the liveness gate in
    /// the executor refuses; remote/store errors otherwise.
    pub async fn send_message(&self, id: &str, text: &str) -> Result<(), GatewayError> {
        let session = self.live_session(id).await?;

        self.remote.send_message(&session.remote_name, text).await?;
        self.store.touch(id).await?;

        tracing::info!(id, "sent message");
        Ok(())
    }

    /// Read the last `lines` lines of the session's terminal buffer.
    ///
    /// Returns the output together with the effective (clamped) line
    /// count. `lines` defaults to 100 when absent.
    ///
    /// # Errors
    /// Same lookup/reconciliation failures as `send_message`, plus
    /// `CaptureFailed` on remote error.
    pub async fn read_output(
        &self,
        id: &str,
        lines: Option<i64>,
    ) -> Result<(String, u32), GatewayError> {
        let session = self.live_session(id).await?;

        let requested = lines.unwrap_or(DEFAULT_CAPTURE_LINES);
        let output = self
            .remote
            .capture_output(&session.remote_name, requested)
            .await?;
        self.store.touch(id).await?;

        Ok((output, clamp_capture_lines(requested)))
    }

    /// Garbage-collect, then list every session most-recently-used first.
    ///
    /// # Errors
    /// Returns store errors from the scan or the listing.
    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>, GatewayError> {
        self.prune_dead_sessions().await?;

        let sessions = self.store.list(None).await?;
        Ok(sessions.into_iter().map(SessionSummary::from).collect())
    }

    /// Delete every row whose remote counterpart no longer exists.
    ///
    /// Scans all rows regardless of status, probing each sequentially;
    /// with N rows this costs N remote probes, a known scaling limit.
    /// Idempotent: a second pass with unchanged remote state is a no-op.
    ///
    /// # Errors
    /// Returns store errors; probe failures count as absence.
    pub async fn prune_dead_sessions(&self) -> Result<usize, GatewayError> {
        let sessions = self.store.list(None).await?;
        let mut pruned = 0;

        for session in sessions {
            if !self.remote.session_exists(&session.remote_name).await {
                self.store.delete(&session.id).await?;
                pruned += 1;
                tracing::info!(
                    id = %session.id,
                    remote_name = %session.remote_name,
                    "pruned session whose remote counterpart is gone"
                );
            }
        }

        Ok(pruned)
    }

    /// Release the underlying registry handle.
    pub async fn close(&self) {
        self.store.close().await;
    }
}
