use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tasker_config::{ConfigResult, MemorySource, RawEntry, Source, Tree};

/// Convert a JSON literal into a tree
pub fn tree(value: Value) -> Tree {
    match value {
        Value::Object(map) => map,
        other => panic!("expected mapping, got {other}"),
    }
}

pub fn yaml(name: &str, body: &str) -> MemorySource {
    MemorySource::document(name, "yaml", body)
}

pub fn yaml_entry(name: &str, body: &str) -> RawEntry {
    RawEntry::new(name, "yaml", body)
}

/// Source that takes `delay` to answer each load
#[derive(Debug, Clone)]
pub struct SlowSource {
    pub name: String,
    pub delay: Duration,
    pub entries: Vec<RawEntry>,
}

impl SlowSource {
    pub fn new(name: &str, delay: Duration, entries: Vec<RawEntry>) -> Self {
        Self {
            name: name.to_string(),
            delay,
            entries,
        }
    }
}

#[async_trait]
impl Source for SlowSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self) -> ConfigResult<Vec<RawEntry>> {
        tokio::time::sleep(self.delay).await;
        Ok(self.entries.clone())
    }
}

/// Source that answers its first load at once and stalls for `delay` afterwards
#[derive(Debug)]
pub struct StallingSource {
    pub name: String,
    pub delay: Duration,
    pub entries: Vec<RawEntry>,
    loads: AtomicUsize,
}

impl StallingSource {
    pub fn new(name: &str, delay: Duration, entries: Vec<RawEntry>) -> Self {
        Self {
            name: name.to_string(),
            delay,
            entries,
            loads: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Source for StallingSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self) -> ConfigResult<Vec<RawEntry>> {
        if self.loads.fetch_add(1, Ordering::SeqCst) > 0 {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.entries.clone())
    }
}
