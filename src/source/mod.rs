//! # Configuration Sources
//!
//! A [`Source`] produces raw, undecoded [`RawEntry`] values and may optionally
//! report changes through a [`SourceWatcher`]. The loader merges sources in the
//! order they were registered, so later sources override earlier ones.
//!
//! Built-in sources:
//!
//! - [`FileSource`] - a file, or every file of a directory; format from the extension
//! - [`EnvSource`] - process environment variables selected by prefix
//! - [`MemorySource`] - in-process entries that can be replaced at runtime

pub mod env;
pub mod file;
pub mod memory;

use crate::error::ConfigResult;
use async_trait::async_trait;
use std::fmt;

pub use env::EnvSource;
pub use file::FileSource;
pub use memory::MemorySource;

/// One unit of raw configuration emitted by a source
#[derive(Clone, PartialEq, Eq)]
pub struct RawEntry {
    /// Entry name: a file name, a variable name, or any label the source picks
    pub key: String,
    /// Format tag used to select a codec; empty for flat key/value entries
    pub format: String,
    /// Undecoded bytes
    pub value: Vec<u8>,
}

impl RawEntry {
    pub fn new<K: Into<String>, F: Into<String>, V: Into<Vec<u8>>>(
        key: K,
        format: F,
        value: V,
    ) -> Self {
        Self {
            key: key.into(),
            format: format.into(),
            value: value.into(),
        }
    }

    /// A flat entry: `value` is placed verbatim at the dot-path `key`
    pub fn flat<K: Into<String>, V: Into<String>>(key: K, value: V) -> Self {
        Self {
            key: key.into(),
            format: String::new(),
            value: value.into().into_bytes(),
        }
    }

    pub fn is_flat(&self) -> bool {
        self.format.is_empty()
    }
}

impl fmt::Debug for RawEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Entry bodies may hold secrets; only their size is shown
        f.debug_struct("RawEntry")
            .field("key", &self.key)
            .field("format", &self.format)
            .field("bytes", &self.value.len())
            .finish()
    }
}

/// Origin of raw configuration entries
#[async_trait]
pub trait Source: Send + Sync + fmt::Debug {
    /// Stable name used in logs and errors
    fn name(&self) -> &str;

    /// Read the current entries of this source
    async fn load(&self) -> ConfigResult<Vec<RawEntry>>;

    /// Start watching for changes. Sources that never change return `None`.
    async fn watch(&self) -> ConfigResult<Option<Box<dyn SourceWatcher>>> {
        Ok(None)
    }
}

/// Change stream of a single source
#[async_trait]
pub trait SourceWatcher: Send {
    /// Wait for the next change and return the source's complete fresh entries.
    ///
    /// `None` means the stream has ended and no further changes will arrive.
    /// An error is reported but does not end the stream.
    async fn next(&mut self) -> Option<ConfigResult<Vec<RawEntry>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_entry() {
        let entry = RawEntry::flat("http.port", "8080");
        assert!(entry.is_flat());
        assert_eq!(entry.value, b"8080");
    }

    #[test]
    fn test_debug_hides_body() {
        let entry = RawEntry::new("secrets.yaml", "yaml", "password: hunter2");
        let rendered = format!("{entry:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("secrets.yaml"));
    }
}
