//! Core abstractions for the dev-session gateway.
//!
//! This crate provides the fundamental building blocks:
//! - `Session` - Registry row for a remote developer session
//! - `CliChoice` / `RunMode` - Closed sets of launch options
//! - Slug id generation and the id <-> tmux name mapping
//! - `SessionStore` and `RemoteExecutor` traits

pub mod ids;
pub mod session;
pub mod traits;

pub use ids::{IdGenerator, SlugGenerator, from_remote_name, to_remote_name};
pub use session::{CliChoice, RunMode, Session, SessionStatus};
pub use traits::{
    DEFAULT_CAPTURE_LINES, MAX_CAPTURE_LINES, MIN_CAPTURE_LINES, RemoteError, RemoteExecutor,
    SessionStore, StoreError, clamp_capture_lines,
};
