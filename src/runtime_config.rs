//! # Runtime Configuration
//!
//! Environment overrides applied on top of the YAML configuration file.
//!
//! ## Environment Variables
//!
//! ### `BRRTG_CONFIG`
//!
//! Path of the configuration file used when the CLI is not given one.
//!
//! ### `BRRTG_SESSION_COOKIE`
//!
//! Overrides `session.cookie_name` from the configuration file.
//!
//! ### `BRRTG_SESSION_MAX_INACTIVE_SECS`
//!
//! Idle timeout of sessions in the in-memory store. Default: `1800`.
//!
//! ```bash
//! export BRRTG_CONFIG=/etc/brrtguard/guard.yaml
//! export BRRTG_SESSION_MAX_INACTIVE_SECS=600
//! brrtguard check
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_MAX_INACTIVE_SECS: u64 = 1800;

/// Runtime configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub config_path: Option<PathBuf>,
    pub session_cookie: Option<String>,
    pub session_max_inactive: Duration,
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let max_inactive = non_empty("BRRTG_SESSION_MAX_INACTIVE_SECS")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_MAX_INACTIVE_SECS);
        RuntimeConfig {
            config_path: non_empty("BRRTG_CONFIG").map(PathBuf::from),
            session_cookie: non_empty("BRRTG_SESSION_COOKIE"),
            session_max_inactive: Duration::from_secs(max_inactive),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
