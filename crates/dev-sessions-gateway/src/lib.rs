//! Policy layer for the dev-session gateway.
//!
//! `GatewayService` composes a `SessionStore` and a `RemoteExecutor` and
//! enforces everything cross-cutting: input validation, per-creator
//! quotas, bounded id generation, liveness-gated messaging, and garbage
//! collection of sessions whose remote counterpart has disappeared.

pub mod service;
mod validate;

pub use service::{CreatedSession, GatewayError, GatewayService, SessionSummary};
