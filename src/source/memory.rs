//! In-process configuration source.
//!
//! Useful for programmatic overrides and for driving reloads in tests: every
//! [`MemorySource::update`] replaces the entries and notifies active watchers.

use super::{RawEntry, Source, SourceWatcher};
use crate::error::ConfigResult;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Source holding entries in memory
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    entries: Arc<RwLock<Vec<RawEntry>>>,
    sender: broadcast::Sender<Vec<RawEntry>>,
}

impl MemorySource {
    /// Create a memory source with the given initial entries
    pub fn new<N: Into<String>>(name: N, entries: Vec<RawEntry>) -> Self {
        let (sender, _) = broadcast::channel(16);
        Self {
            name: name.into(),
            entries: Arc::new(RwLock::new(entries)),
            sender,
        }
    }

    /// Convenience constructor for a single formatted document
    pub fn document<N: Into<String>, F: Into<String>, B: Into<Vec<u8>>>(
        name: N,
        format: F,
        body: B,
    ) -> Self {
        let name = name.into();
        let entry = RawEntry::new(name.clone(), format, body);
        Self::new(name, vec![entry])
    }

    /// Replace all entries and notify watchers
    pub fn update(&self, entries: Vec<RawEntry>) {
        *self.entries.write() = entries.clone();
        // No receivers simply means nobody is watching yet
        let receivers = self.sender.send(entries).unwrap_or(0);
        debug!(source = %self.name, receivers, "Memory source updated");
    }

    /// Current entries
    pub fn entries(&self) -> Vec<RawEntry> {
        self.entries.read().clone()
    }
}

#[async_trait]
impl Source for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self) -> ConfigResult<Vec<RawEntry>> {
        Ok(self.entries())
    }

    async fn watch(&self) -> ConfigResult<Option<Box<dyn SourceWatcher>>> {
        Ok(Some(Box::new(MemoryWatcher {
            receiver: self.sender.subscribe(),
            entries: Arc::clone(&self.entries),
        })))
    }
}

struct MemoryWatcher {
    receiver: broadcast::Receiver<Vec<RawEntry>>,
    entries: Arc<RwLock<Vec<RawEntry>>>,
}

#[async_trait]
impl SourceWatcher for MemoryWatcher {
    async fn next(&mut self) -> Option<ConfigResult<Vec<RawEntry>>> {
        match self.receiver.recv().await {
            Ok(entries) => Some(Ok(entries)),
            // Skipped updates are superseded by the current entries
            Err(broadcast::error::RecvError::Lagged(_)) => Some(Ok(self.entries.read().clone())),
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}
