//! HTTP surface for the dev-session gateway.

pub mod config;
pub mod http;
