//! Environment variable configuration source.
//!
//! Variables matching one of the configured prefixes become flat entries with the
//! prefix (and a following `_`) stripped: with prefix `APP_`, `APP_PORT=8080`
//! becomes the key `PORT`. With no prefixes every variable is included.

use super::{RawEntry, Source};
use crate::error::ConfigResult;
use async_trait::async_trait;
use tracing::debug;

/// Source reading process environment variables
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    prefixes: Vec<String>,
}

impl EnvSource {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    /// Include every environment variable
    pub fn all() -> Self {
        Self::default()
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Map a variable name to its entry key, or `None` when it is filtered out
    fn entry_key(&self, name: &str) -> Option<String> {
        if self.prefixes.is_empty() {
            return Some(name.to_string());
        }
        self.prefixes.iter().find_map(|prefix| {
            let stripped = name.strip_prefix(prefix.as_str())?;
            let stripped = stripped.strip_prefix('_').unwrap_or(stripped);
            (!stripped.is_empty()).then(|| stripped.to_string())
        })
    }

    fn collect<I: IntoIterator<Item = (String, String)>>(&self, vars: I) -> Vec<RawEntry> {
        let mut entries: Vec<RawEntry> = vars
            .into_iter()
            .filter_map(|(name, value)| {
                self.entry_key(&name)
                    .map(|key| RawEntry::flat(key, value))
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }
}

#[async_trait]
impl Source for EnvSource {
    fn name(&self) -> &str {
        "env"
    }

    async fn load(&self) -> ConfigResult<Vec<RawEntry>> {
        // Non-UTF-8 variables are skipped; std::env::vars() would panic on them
        let vars = std::env::vars_os().filter_map(|(name, value)| {
            Some((name.into_string().ok()?, value.into_string().ok()?))
        });
        let entries = self.collect(vars);
        debug!(
            prefixes = ?self.prefixes,
            count = entries.len(),
            "Loaded environment variable entries"
        );
        Ok(entries)
    }
}
