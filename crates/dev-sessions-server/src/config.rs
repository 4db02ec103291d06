//! Environment-based configuration.

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable must be set")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Server configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port.
    pub port: u16,
    /// Remote host reached over SSH.
    pub ssh_host: String,
    /// SSH login user.
    pub ssh_user: String,
    /// SSH port on the remote host.
    pub ssh_port: u16,
    /// Active-session quota per creator label.
    pub max_sessions_per_creator: usize,
    /// Path of the SQLite registry.
    pub database_path: PathBuf,
}

impl Config {
    /// Read configuration from process environment variables.
    ///
    /// # Errors
    /// Returns error when `SSH_USER` (and the `USER` fallback) is unset
    /// or a variable fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let ssh_user = get("SSH_USER")
            .or_else(|| get("USER"))
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("SSH_USER"))?;

        Ok(Self {
            port: parse_or("PORT", get("PORT"), 6767)?,
            ssh_host: get("SSH_HOST").unwrap_or_else(|| "host.docker.internal".to_string()),
            ssh_user,
            ssh_port: parse_or("SSH_PORT", get("SSH_PORT"), 22)?,
            max_sessions_per_creator: parse_or(
                "MAX_SESSIONS_PER_CREATOR",
                get("MAX_SESSIONS_PER_CREATOR"),
                10,
            )?,
            database_path: get("DATABASE_PATH")
                .map_or_else(|| PathBuf::from("/data/sessions.db"), PathBuf::from),
        })
    }
}

fn parse_or<T: FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    value.map_or(Ok(default), |raw| {
        raw.parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<&str, &str> = vars.iter().copied().collect();
        Config::from_lookup(|name| map.get(name).map(ToString::to_string))
    }

    #[test]
    fn defaults_apply_when_only_user_is_set() {
        let config = config_from(&[("SSH_USER", "alice")]).expect("config");
        assert_eq!(config.port, 6767);
        assert_eq!(config.ssh_host, "host.docker.internal");
        assert_eq!(config.ssh_port, 22);
        assert_eq!(config.max_sessions_per_creator, 10);
        assert_eq!(config.database_path, PathBuf::from("/data/sessions.db"));
    }

    #[test]
    fn ssh_user_falls_back_to_user() {
        let config = config_from(&[("USER", "bob")]).expect("config");
        assert_eq!(config.ssh_user, "bob");
    }

    #[test]
    fn missing_ssh_user_is_a_startup_error() {
        assert!(matches!(config_from(&[]), Err(ConfigError::Missing("SSH_USER"))));
    }

    #[test]
    fn unparsable_numbers_are_rejected() {
        let err = config_from(&[("SSH_USER", "alice"), ("PORT", "teapot")]);
        assert!(matches!(err, Err(ConfigError::Invalid { name: "PORT", .. })));
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = config_from(&[
            ("SSH_USER", "alice"),
            ("SSH_HOST", "devbox"),
            ("SSH_PORT", "2222"),
            ("PORT", "8080"),
            ("MAX_SESSIONS_PER_CREATOR", "3"),
            ("DATABASE_PATH", "/tmp/s.db"),
        ])
        .expect("config");
        assert_eq!(config.ssh_host, "devbox");
        assert_eq!(config.ssh_port, 2222);
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_sessions_per_creator, 3);
        assert_eq!(config.database_path, PathBuf::from("/tmp/s.db"));
    }
}
