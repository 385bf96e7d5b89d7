//! Ambient configuration assembled once in `main` and threaded through the
//! rest of the program — no deep call site reaches into the environment
//! directly.
//!
//! Small free functions that fold CLI flags and environment variables into
//! a plain value, called once near the top of `main`.

use std::path::PathBuf;

/// Default timeout, in seconds, for an application-scoped idle wait
/// (`COU_STANDARD_IDLE_TIMEOUT`).
pub const DEFAULT_STANDARD_IDLE_TIMEOUT: u64 = 300;
/// Default timeout, in seconds, for a model-wide idle wait (
/// `COU_LONG_IDLE_TIMEOUT`).
pub const DEFAULT_LONG_IDLE_TIMEOUT: u64 = 1800;

/// Resolved ambient configuration for one invocation.
#[derive(Clone, Debug)]
pub struct Config {
    /// Juju model name to operate against.
    pub model: Option<String>,
    /// Standard (application-scoped) idle-wait timeout, in seconds.
    pub standard_idle_timeout: u64,
    /// Long (model-wide) idle-wait timeout, in seconds.
    pub long_idle_timeout: u64,
    /// Directory backup dumps and logs are written under.
    pub data_dir: PathBuf,
}

impl Config {
    /// What: Assemble a [`Config`] from an explicit `--model` flag (if any)
    /// and the process environment.
    ///
    /// Input: `model_flag`, the value of `--model` when given.
    ///
    /// Output: A `Config` with every field resolved; nothing here can fail
    /// — missing/invalid environment values fall back to documented
    /// defaults.
    #[must_use]
    pub fn resolve(model_flag: Option<String>) -> Self {
        Self {
            model: resolve_model_name(model_flag),
            standard_idle_timeout: env_u64("COU_STANDARD_IDLE_TIMEOUT", DEFAULT_STANDARD_IDLE_TIMEOUT),
            long_idle_timeout: env_u64("COU_LONG_IDLE_TIMEOUT", DEFAULT_LONG_IDLE_TIMEOUT),
            data_dir: std::env::var_os("COU_DATA").map_or_else(default_data_dir, PathBuf::from),
        }
    }
}

/// What: Resolve the model name via the documented fallback order:
/// explicit flag → `JUJU_MODEL` → `MODEL_NAME` → `None` (the caller then
/// asks the controller for its current model).
///
/// Input: `flag`, the value of `--model` when the operator passed one.
///
/// Output: `Some(name)` from the first source that provided one, else
/// `None`.
#[must_use]
pub fn resolve_model_name(flag: Option<String>) -> Option<String> {
    flag.or_else(|| std::env::var("JUJU_MODEL").ok())
        .or_else(|| std::env::var("MODEL_NAME").ok())
        .filter(|s| !s.is_empty())
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn default_data_dir() -> PathBuf {
    std::env::temp_dir().join("cou")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_flag_wins_over_environment() {
        let _guard = crate::global_test_mutex_lock();
        // SAFETY: tests touching process-wide env vars are serialized by
        // `global_test_mutex_lock`.
        unsafe {
            std::env::set_var("JUJU_MODEL", "from-env");
        }
        assert_eq!(resolve_model_name(Some("from-flag".to_string())), Some("from-flag".to_string()));
        unsafe {
            std::env::remove_var("JUJU_MODEL");
        }
    }

    #[test]
    fn falls_back_through_juju_model_then_model_name() {
        let _guard = crate::global_test_mutex_lock();
        unsafe {
            std::env::remove_var("JUJU_MODEL");
            std::env::set_var("MODEL_NAME", "legacy-name");
        }
        assert_eq!(resolve_model_name(None), Some("legacy-name".to_string()));
        unsafe {
            std::env::remove_var("MODEL_NAME");
        }
    }

    #[test]
    fn no_source_yields_none() {
        let _guard = crate::global_test_mutex_lock();
        unsafe {
            std::env::remove_var("JUJU_MODEL");
            std::env::remove_var("MODEL_NAME");
        }
        assert_eq!(resolve_model_name(None), None);
    }

    #[test]
    fn idle_timeouts_default_when_env_absent() {
        let _guard = crate::global_test_mutex_lock();
        unsafe {
            std::env::remove_var("COU_STANDARD_IDLE_TIMEOUT");
            std::env::remove_var("COU_LONG_IDLE_TIMEOUT");
        }
        let config = Config::resolve(None);
        assert_eq!(config.standard_idle_timeout, DEFAULT_STANDARD_IDLE_TIMEOUT);
        assert_eq!(config.long_idle_timeout, DEFAULT_LONG_IDLE_TIMEOUT);
    }
}
