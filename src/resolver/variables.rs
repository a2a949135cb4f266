//! Variable namespaces consulted when a placeholder does not match a tree key.

use crate::error::{ConfigError, ConfigResult};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Named string variables available to placeholders
pub trait VariableProvider: Send + Sync + fmt::Debug {
    fn get(&self, name: &str) -> Option<String>;
}

/// Process environment variables
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvironmentVariables;

impl VariableProvider for EnvironmentVariables {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Fixed set of variables, mostly for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct StaticVariables {
    values: HashMap<String, String>,
}

impl StaticVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StaticVariables {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl VariableProvider for StaticVariables {
    fn get(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }
}

/// Variables from a `.env` file, falling back to the process environment.
///
/// The file is read once; the process environment is not modified.
#[derive(Debug, Clone, Default)]
pub struct DotenvVariables {
    values: HashMap<String, String>,
}

impl DotenvVariables {
    pub fn from_path<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let source_name = format!("dotenv:{}", path.display());
        let iter = dotenvy::from_path_iter(path)
            .map_err(|e| ConfigError::source_unavailable(&source_name, e))?;

        let mut values = HashMap::new();
        for item in iter {
            let (name, value) =
                item.map_err(|e| ConfigError::source_unavailable(&source_name, e))?;
            values.insert(name, value);
        }

        debug!(
            "DOTENV: Loaded {} variables from {}",
            values.len(),
            path.display()
        );
        Ok(Self { values })
    }
}

impl VariableProvider for DotenvVariables {
    fn get(&self, name: &str) -> Option<String> {
        self.values
            .get(name)
            .cloned()
            .or_else(|| EnvironmentVariables.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_static_variables() {
        let vars: StaticVariables = [("PORT", "9000")].into_iter().collect();
        assert_eq!(vars.get("PORT").as_deref(), Some("9000"));
        assert_eq!(vars.get("HOST"), None);
    }

    #[test]
    fn test_dotenv_file_with_environment_fallback() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "DATABASE_URL=postgres://localhost/app\n# comment\nPORT=7000\n").unwrap();

        std::env::set_var("TASKER_CONFIG_DOTENV_FALLBACK", "from-process");
        let vars = DotenvVariables::from_path(&path).unwrap();

        assert_eq!(
            vars.get("DATABASE_URL").as_deref(),
            Some("postgres://localhost/app")
        );
        assert_eq!(vars.get("PORT").as_deref(), Some("7000"));
        assert_eq!(
            vars.get("TASKER_CONFIG_DOTENV_FALLBACK").as_deref(),
            Some("from-process")
        );
        std::env::remove_var("TASKER_CONFIG_DOTENV_FALLBACK");
    }

    #[test]
    fn test_missing_dotenv_is_source_error() {
        let dir = TempDir::new().unwrap();
        let error = DotenvVariables::from_path(dir.path().join("absent.env")).unwrap_err();
        assert!(error.is_source_error());
    }
}
