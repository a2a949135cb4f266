//! File system configuration source.
//!
//! Points at a single file or at a directory. For a directory every regular,
//! non-hidden file is loaded in file-name order. The file extension is the format
//! tag, so `app.yaml` is decoded by the `yaml` codec.
//!
//! Watching polls file fingerprints (modification time and length) on an interval
//! and emits the full set of entries whenever any fingerprint changes.

use super::{RawEntry, Source, SourceWatcher};
use crate::error::{ConfigError, ConfigResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, warn};

/// Files above this size are rejected rather than read
pub const MAX_CONFIG_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Default polling interval for change detection
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

type Fingerprint = BTreeMap<PathBuf, (Option<SystemTime>, u64)>;

/// Source reading a file or a directory of files
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    name: String,
    poll_interval: Duration,
}

impl FileSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let name = format!("file:{}", path.display());
        Self {
            path,
            name,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the change polling interval
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unavailable<R: std::fmt::Display>(&self, reason: R) -> ConfigError {
        ConfigError::source_unavailable(&self.name, reason)
    }

    /// Files backing this source, in load order
    async fn discover_files(&self) -> ConfigResult<Vec<PathBuf>> {
        let metadata = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| self.unavailable(format!("{}: {e}", self.path.display())))?;

        if metadata.is_file() {
            return Ok(vec![self.path.clone()]);
        }
        if !metadata.is_dir() {
            return Err(self.unavailable(format!(
                "{} is neither a file nor a directory",
                self.path.display()
            )));
        }

        let mut reader = tokio::fs::read_dir(&self.path)
            .await
            .map_err(|e| self.unavailable(format!("{}: {e}", self.path.display())))?;

        let mut files = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| self.unavailable(format!("{}: {e}", self.path.display())))?
        {
            let path = entry.path();
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'));
            if hidden {
                continue;
            }
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if is_file {
                files.push(path);
            }
        }

        files.sort();
        debug!(source = %self.name, files = files.len(), "Discovered configuration files");
        Ok(files)
    }

    /// Read one file with size and type checks
    async fn read_file(&self, path: &Path) -> ConfigResult<RawEntry> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| self.unavailable(format!("{}: {e}", path.display())))?;

        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(self.unavailable(format!(
                "{} is too large ({}MB > {}MB limit)",
                path.display(),
                metadata.len() / (1024 * 1024),
                MAX_CONFIG_FILE_SIZE / (1024 * 1024)
            )));
        }

        let value = tokio::fs::read(path)
            .await
            .map_err(|e| self.unavailable(format!("{}: {e}", path.display())))?;

        let key = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        // An empty format would mark the entry as flat key/value data
        let format = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| ConfigError::unsupported_format("", &key))?;

        Ok(RawEntry { key, format, value })
    }

    async fn fingerprint(&self) -> Fingerprint {
        let mut fingerprint = Fingerprint::new();
        // A missing path yields an empty fingerprint, which differs from any
        // previously observed state and so triggers a (failing) reload
        let Ok(files) = self.discover_files().await else {
            return fingerprint;
        };
        for file in files {
            if let Ok(metadata) = tokio::fs::metadata(&file).await {
                fingerprint.insert(file, (metadata.modified().ok(), metadata.len()));
            }
        }
        fingerprint
    }
}

#[async_trait]
impl Source for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self) -> ConfigResult<Vec<RawEntry>> {
        let files = self.discover_files().await?;
        let mut entries = Vec::with_capacity(files.len());
        for file in &files {
            entries.push(self.read_file(file).await?);
        }
        Ok(entries)
    }

    async fn watch(&self) -> ConfigResult<Option<Box<dyn SourceWatcher>>> {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; consume it so polling starts one period out
        ticker.tick().await;

        let last = self.fingerprint().await;
        Ok(Some(Box::new(FileWatcher {
            source: self.clone(),
            ticker,
            last,
        })))
    }
}

struct FileWatcher {
    source: FileSource,
    ticker: Interval,
    last: Fingerprint,
}

#[async_trait]
impl SourceWatcher for FileWatcher {
    async fn next(&mut self) -> Option<ConfigResult<Vec<RawEntry>>> {
        loop {
            self.ticker.tick().await;
            let current = self.source.fingerprint().await;
            if current == self.last {
                continue;
            }
            debug!(source = %self.source.name, "Detected configuration file change");
            self.last = current;

            let result = self.source.load().await;
            if let Err(e) = &result {
                warn!(source = %self.source.name, error = %e, "Failed to re-read changed configuration");
            }
            return Some(result);
        }
    }
}
