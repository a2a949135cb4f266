//! # Loader Options
//!
//! Settings of the loader itself, as opposed to the configuration it loads.
//! Defaults can be overridden from `TASKER_CONFIG_*` environment variables with
//! [`LoaderOptions::from_env`]. The options apply when
//! [`ConfigBuilder::build`](crate::ConfigBuilder::build) runs: `poll_interval_ms`
//! reaches every file source added with `with_file`, and `env_prefixes` adds an
//! environment source that overrides all other sources.

use crate::error::{ConfigError, ConfigResult};
use crate::resolver::DEFAULT_MAX_DEPTH;
use crate::source::file::DEFAULT_POLL_INTERVAL;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Settings of the loader itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderOptions {
    /// Upper bound for `load()` and each reload; 0 disables the bound
    pub load_timeout_ms: u64,
    /// Interval at which file sources check for modifications
    pub poll_interval_ms: u64,
    /// Maximum chain of placeholder references
    pub max_resolve_depth: usize,
    /// Prefixes of an environment source layered over every other source
    pub env_prefixes: Vec<String>,
    /// `.env` file consulted for placeholder variables
    pub dotenv_path: Option<PathBuf>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            load_timeout_ms: 30_000,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            max_resolve_depth: DEFAULT_MAX_DEPTH,
            env_prefixes: Vec::new(),
            dotenv_path: None,
        }
    }
}

impl LoaderOptions {
    /// Defaults overridden by `TASKER_CONFIG_*` environment variables
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::default();

        if let Some(value) = lookup("TASKER_CONFIG_LOAD_TIMEOUT_MS") {
            options.load_timeout_ms = parse_number("TASKER_CONFIG_LOAD_TIMEOUT_MS", &value)?;
        }

        if let Some(value) = lookup("TASKER_CONFIG_POLL_INTERVAL_MS") {
            options.poll_interval_ms = parse_number("TASKER_CONFIG_POLL_INTERVAL_MS", &value)?;
        }

        if let Some(value) = lookup("TASKER_CONFIG_MAX_RESOLVE_DEPTH") {
            options.max_resolve_depth = parse_number("TASKER_CONFIG_MAX_RESOLVE_DEPTH", &value)?;
        }

        if let Some(value) = lookup("TASKER_CONFIG_ENV_PREFIXES") {
            options.env_prefixes = value
                .split(',')
                .map(str::trim)
                .filter(|prefix| !prefix.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(value) = lookup("TASKER_CONFIG_DOTENV") {
            if !value.trim().is_empty() {
                options.dotenv_path = Some(PathBuf::from(value));
            }
        }

        Ok(options)
    }

    pub fn load_timeout(&self) -> Option<Duration> {
        (self.load_timeout_ms > 0).then(|| Duration::from_millis(self.load_timeout_ms))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::type_mismatch(name, "unsigned integer", format!("'{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let options = LoaderOptions::default();
        assert_eq!(options.load_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(options.poll_interval(), Duration::from_secs(2));
        assert_eq!(options.max_resolve_depth, 32);
    }

    #[test]
    fn test_environment_overrides() {
        let options = LoaderOptions::from_lookup(lookup_from(&[
            ("TASKER_CONFIG_LOAD_TIMEOUT_MS", "0"),
            ("TASKER_CONFIG_POLL_INTERVAL_MS", "250"),
            ("TASKER_CONFIG_MAX_RESOLVE_DEPTH", "8"),
            ("TASKER_CONFIG_ENV_PREFIXES", "APP_, SVC ,"),
            ("TASKER_CONFIG_DOTENV", ".env.local"),
        ]))
        .unwrap();

        assert_eq!(options.load_timeout(), None);
        assert_eq!(options.poll_interval(), Duration::from_millis(250));
        assert_eq!(options.max_resolve_depth, 8);
        assert_eq!(options.env_prefixes, vec!["APP_", "SVC"]);
        assert_eq!(options.dotenv_path, Some(PathBuf::from(".env.local")));
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let error = LoaderOptions::from_lookup(lookup_from(&[(
            "TASKER_CONFIG_LOAD_TIMEOUT_MS",
            "soon",
        )]))
        .unwrap_err();
        assert!(matches!(error, ConfigError::TypeMismatch { .. }));
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let options: LoaderOptions = serde_json::from_str(r#"{"max_resolve_depth": 4}"#).unwrap();
        assert_eq!(options.max_resolve_depth, 4);
        assert_eq!(options.load_timeout_ms, 30_000);
    }
}
