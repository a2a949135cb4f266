//! # Codecs and Decoding
//!
//! A [`Codec`] turns raw bytes into a generic value tree. Codecs are kept in a
//! [`CodecRegistry`] keyed by format name; registering a name twice replaces the
//! earlier codec, which is how applications override built-in formats.
//!
//! The registry is an explicit object handed to the loader rather than process
//! global state. [`CodecRegistry::default`] comes prepopulated with the built-in
//! codecs (`json`, `yaml`/`yml`, `toml`, `form`).
//!
//! ## Usage
//!
//! ```rust
//! use tasker_config::codec::{Codec, CodecRegistry};
//! use tasker_config::error::BoxError;
//!
//! #[derive(Debug)]
//! struct UpperJson;
//!
//! impl Codec for UpperJson {
//!     fn name(&self) -> &str {
//!         "ujson"
//!     }
//!
//!     fn unmarshal(&self, data: &[u8]) -> Result<serde_json::Value, BoxError> {
//!         Ok(serde_json::from_slice(&data.to_ascii_uppercase())?)
//!     }
//! }
//!
//! let registry = CodecRegistry::default();
//! registry.register(UpperJson);
//! let tree = registry.decode("ujson", br#"{"a": "b"}"#).unwrap();
//! assert_eq!(tree["A"], "B");
//! ```

mod builtin;

pub use builtin::{FormCodec, JsonCodec, TomlCodec, YamlCodec};

use crate::error::{BoxError, ConfigError, ConfigResult};
use crate::source::RawEntry;
use crate::value::{kind_name, Tree};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Format-specific parser from bytes to a value tree
pub trait Codec: Send + Sync + fmt::Debug {
    /// Format name the codec is registered under
    fn name(&self) -> &str;

    /// Parse raw bytes into a value
    fn unmarshal(&self, data: &[u8]) -> Result<Value, BoxError>;
}

/// Turns one raw entry into a tree. Replaceable as a whole on the loader.
pub trait Decoder: Send + Sync {
    fn decode_entry(&self, entry: &RawEntry) -> ConfigResult<Tree>;
}

impl<F> Decoder for F
where
    F: Fn(&RawEntry) -> ConfigResult<Tree> + Send + Sync,
{
    fn decode_entry(&self, entry: &RawEntry) -> ConfigResult<Tree> {
        self(entry)
    }
}

#[derive(Default)]
struct RegistryState {
    codecs: HashMap<String, Arc<dyn Codec>>,
    aliases: HashMap<String, String>,
}

/// Registry of codecs keyed by lower-cased format name
pub struct CodecRegistry {
    state: RwLock<RegistryState>,
}

impl CodecRegistry {
    /// Create a registry with no codecs at all
    pub fn empty() -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// Install a codec under its name, replacing any previous codec of that name
    pub fn register<C: Codec + 'static>(&self, codec: C) {
        self.register_arc(Arc::new(codec));
    }

    pub fn register_arc(&self, codec: Arc<dyn Codec>) {
        let name = codec.name().to_ascii_lowercase();
        let mut state = self.state.write();
        // A real codec takes precedence over an alias of the same name
        state.aliases.remove(&name);
        if state.codecs.insert(name.clone(), codec).is_some() {
            debug!(format = %name, "Replaced registered codec");
        } else {
            debug!(format = %name, "Registered codec");
        }
    }

    /// Make `alias` resolve to the codec registered as `target`
    pub fn register_alias<A: AsRef<str>, T: AsRef<str>>(&self, alias: A, target: T) {
        let mut state = self.state.write();
        state.aliases.insert(
            alias.as_ref().to_ascii_lowercase(),
            target.as_ref().to_ascii_lowercase(),
        );
    }

    /// Look up a codec by format name or alias
    pub fn get(&self, format: &str) -> Option<Arc<dyn Codec>> {
        let format = format.to_ascii_lowercase();
        let state = self.state.read();
        if let Some(codec) = state.codecs.get(&format) {
            return Some(Arc::clone(codec));
        }
        state
            .aliases
            .get(&format)
            .and_then(|target| state.codecs.get(target))
            .map(Arc::clone)
    }

    /// Registered format names (aliases included), sorted
    pub fn formats(&self) -> Vec<String> {
        let state = self.state.read();
        let mut formats: Vec<String> = state
            .codecs
            .keys()
            .chain(state.aliases.keys())
            .cloned()
            .collect();
        formats.sort();
        formats
    }

    /// Decode bytes of the given format into a tree
    pub fn decode(&self, format: &str, data: &[u8]) -> ConfigResult<Tree> {
        self.decode_named(format, format, data)
    }

    fn decode_named(&self, key: &str, format: &str, data: &[u8]) -> ConfigResult<Tree> {
        let codec = self
            .get(format)
            .ok_or_else(|| ConfigError::unsupported_format(format, key))?;

        let value = codec
            .unmarshal(data)
            .map_err(|e| ConfigError::decode_error(key, format, e))?;

        match value {
            Value::Object(tree) => Ok(tree),
            // Empty documents (e.g. a YAML file holding only comments)
            Value::Null => Ok(Tree::new()),
            other => Err(ConfigError::decode_error(
                key,
                format,
                format!("document root must be a mapping, got {}", kind_name(&other)),
            )),
        }
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        let registry = Self::empty();
        registry.register(JsonCodec);
        registry.register(YamlCodec);
        registry.register(TomlCodec);
        registry.register(FormCodec);
        registry.register_alias("yml", "yaml");
        registry
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("formats", &self.formats())
            .finish()
    }
}

impl Decoder for CodecRegistry {
    fn decode_entry(&self, entry: &RawEntry) -> ConfigResult<Tree> {
        if entry.is_flat() {
            let text = std::str::from_utf8(&entry.value)
                .map_err(|e| ConfigError::decode_error(&entry.key, "flat", e))?;
            let mut tree = Tree::new();
            insert_dotted(&mut tree, &entry.key, Value::String(text.to_string()));
            return Ok(tree);
        }
        self.decode_named(&entry.key, &entry.format, &entry.value)
    }
}

/// Insert `value` at a dot-separated key, creating intermediate mappings.
///
/// An intermediate node that is not a mapping is replaced by one.
pub(crate) fn insert_dotted(tree: &mut Tree, key: &str, value: Value) {
    let mut parts = key.split('.').peekable();
    let mut current = tree;
    while let Some(part) = parts.next() {
        if parts.peek().is_none() {
            current.insert(part.to_string(), value);
            return;
        }
        let slot = current
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Tree::new()));
        if !slot.is_object() {
            *slot = Value::Object(Tree::new());
        }
        current = match slot {
            Value::Object(map) => map,
            _ => return,
        };
    }
}
