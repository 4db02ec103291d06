//! Closed vocabulary of remote tmux commands.
//!
//! Every remote command is rendered from one of these variants. The only
//! caller-supplied inputs are tmux session names, pre-validated workspace
//! paths, and base64 payloads; each is quoted (or already transport-safe)
//! before it reaches the command string, so no raw request text is ever
//! interpolated into a shell command.

use dev_sessions_core::clamp_capture_lines;
use thiserror::Error;

/// Process signatures counted as "a live CLI" by the liveness probe:
/// either CLI directly, or the sandbox container running one.
pub const PROGRAM_SIGNATURE: &str = "(claude|codex|docker.*dev-sandbox)";

/// Command render error.
#[derive(Debug, Error)]
pub enum CommandBuildError {
    #[error("failed to quote argument: {0}")]
    Quote(#[from] shlex::QuoteError),
}

/// One remote tmux operation.
#[derive(Debug, Clone)]
pub enum TmuxCommand<'a> {
    /// Start a detached session running an interactive shell.
    NewDetached { name: &'a str },
    /// Type `cd <path> && <program> .` into the session and press Enter.
    LaunchProgram {
        name: &'a str,
        workspace_path: &'a str,
        program: &'a str,
    },
    /// Press Enter. Used both to dismiss the first-run prompt and to
    /// submit buffered input.
    SubmitKey { name: &'a str },
    /// Decode a base64 payload on the remote side and inject it as
    /// literal keystrokes, bypassing all shell interpretation.
    SendLiteral { name: &'a str, encoded: &'a str },
    /// Existence probe.
    HasSession { name: &'a str },
    /// Names of all sessions on the host.
    ListSessions,
    /// Last `lines` lines of the pane's scrollback.
    CapturePane { name: &'a str, lines: i64 },
    /// Terminate a session.
    KillSession { name: &'a str },
    /// List processes attached to the session's pane TTYs, filtered to
    /// the expected CLI signatures.
    ListProgramProcesses { name: &'a str },
}

impl TmuxCommand<'_> {
    /// Render the command string executed on the remote host.
    ///
    /// # Errors
    /// Returns error if an argument cannot be shell-quoted.
    pub fn render(&self) -> Result<String, CommandBuildError> {
        Ok(match self {
            Self::NewDetached { name } => {
                format!("tmux new-session -d -s {}", quote(name)?)
            }
            Self::LaunchProgram {
                name,
                workspace_path,
                program,
            } => {
                let launch = format!("cd {} && {program} .", quote(workspace_path)?);
                format!("tmux send-keys -t {} {} C-m", quote(name)?, quote(&launch)?)
            }
            Self::SubmitKey { name } => {
                format!("tmux send-keys -t {} C-m", quote(name)?)
            }
            Self::SendLiteral { name, encoded } => {
                // The base64 alphabet is shell-inert, so the payload can
                // sit inside single quotes; the decoded bytes only ever
                // exist in a variable passed to send-keys -l.
                format!(
                    "decoded=$(printf '%s' '{encoded}' | base64 --decode); \
                     tmux send-keys -l -t {} \"$decoded\"",
                    quote(name)?
                )
            }
            Self::HasSession { name } => {
                format!("tmux has-session -t {}", quote(name)?)
            }
            Self::ListSessions => "tmux list-sessions -F '#{session_name}'".to_string(),
            Self::CapturePane { name, lines } => {
                let lines = clamp_capture_lines(*lines);
                format!("tmux capture-pane -p -S -{lines} -t {}", quote(name)?)
            }
            Self::KillSession { name } => {
                format!("tmux kill-session -t {}", quote(name)?)
            }
            Self::ListProgramProcesses { name } => {
                format!(
                    "tmux list-panes -t {} -F '#{{pane_tty}}' \
                     | xargs -I {{}} ps -t {{}} \
                     | grep -E '{PROGRAM_SIGNATURE}'",
                    quote(name)?
                )
            }
        })
    }
}

fn quote(arg: &str) -> Result<String, CommandBuildError> {
    Ok(shlex::try_quote(arg)?.into_owned())
}
