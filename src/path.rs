//! Key path parsing and tree navigation.
//!
//! Paths are dot-delimited (`http.server.port`). Sequence elements are addressed
//! either with brackets (`servers[0].host`) or with a numeric dotted segment
//! (`servers.0.host`). Both spellings canonicalise to the dotted form.

use crate::error::{ConfigError, ConfigResult};
use crate::value::{kind_name, Tree};
use serde_json::Value;
use std::fmt;

/// One step of a key path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Mapping key (also used for numeric segments written with dots)
    Key(String),
    /// Explicit bracketed sequence index
    Index(usize),
}

/// A parsed key path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct KeyPath {
    segments: Vec<Segment>,
}

impl KeyPath {
    /// Parse a textual path. Empty input is the root path.
    ///
    /// Malformed brackets (`a[x]`, `a[0`) are kept as part of the key text, so a
    /// path never fails to parse; it may simply not match anything.
    pub fn parse(input: &str) -> Self {
        let mut segments = Vec::new();
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Self { segments };
        }

        for part in trimmed.split('.') {
            Self::parse_part(part, &mut segments);
        }

        Self { segments }
    }

    fn parse_part(part: &str, segments: &mut Vec<Segment>) {
        let Some(open) = part.find('[') else {
            segments.push(Segment::Key(part.to_string()));
            return;
        };

        let (name, mut rest) = part.split_at(open);
        let mut indices = Vec::new();
        while let Some(stripped) = rest.strip_prefix('[') {
            let Some(close) = stripped.find(']') else {
                break;
            };
            match stripped[..close].parse::<usize>() {
                Ok(index) => indices.push(index),
                Err(_) => break,
            }
            rest = &stripped[close + 1..];
        }

        if !rest.is_empty() {
            // Not a well-formed index suffix; treat the whole part as a key
            segments.push(Segment::Key(part.to_string()));
            return;
        }

        if !name.is_empty() {
            segments.push(Segment::Key(name.to_string()));
        }
        segments.extend(indices.into_iter().map(Segment::Index));
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Append a mapping key, returning the child path
    pub fn child_key(&self, key: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Key(key.to_string()));
        Self { segments }
    }

    /// Append a sequence index, returning the child path
    pub fn child_index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Index(index));
        Self { segments }
    }

    /// Canonical dotted rendering used for comparisons
    pub fn canonical(&self) -> String {
        self.to_string()
    }

    /// Render the first `len` segments, used in error messages
    fn prefix(&self, len: usize) -> String {
        KeyPath {
            segments: self.segments[..len].to_vec(),
        }
        .canonical()
    }

    /// Look up the value addressed by this path, if any
    pub fn lookup<'a>(&self, root: &'a Tree) -> Option<&'a Value> {
        let (first, rest) = self.segments.split_first()?;
        let mut current = match first {
            Segment::Key(key) => root.get(key)?,
            Segment::Index(_) => return None,
        };
        for segment in rest {
            current = step(current, segment)?;
        }
        Some(current)
    }

    /// Look up the value addressed by this path, reporting which segment failed
    pub fn navigate<'a>(&self, root: &'a Tree) -> ConfigResult<&'a Value> {
        let (first, rest) = self
            .segments
            .split_first()
            .ok_or_else(|| ConfigError::key_not_found(""))?;

        let mut current = match first {
            Segment::Key(key) => root
                .get(key)
                .ok_or_else(|| ConfigError::key_not_found(self.prefix(1)))?,
            Segment::Index(_) => {
                return Err(ConfigError::type_mismatch("", "sequence", "mapping"));
            }
        };

        for (position, segment) in rest.iter().enumerate() {
            let depth = position + 1;
            current = match (current, segment) {
                (Value::Object(_), Segment::Index(_)) => {
                    return Err(ConfigError::type_mismatch(
                        self.prefix(depth),
                        "sequence",
                        "mapping",
                    ));
                }
                (Value::Object(_) | Value::Array(_), _) => step(current, segment)
                    .ok_or_else(|| ConfigError::key_not_found(self.prefix(depth + 1)))?,
                (other, _) => {
                    return Err(ConfigError::type_mismatch(
                        self.prefix(depth),
                        "mapping or sequence",
                        kind_name(other),
                    ));
                }
            };
        }

        Ok(current)
    }
}

fn step<'a>(node: &'a Value, segment: &Segment) -> Option<&'a Value> {
    match (node, segment) {
        (Value::Object(map), Segment::Key(key)) => map.get(key),
        (Value::Array(items), Segment::Key(key)) => items.get(key.parse::<usize>().ok()?),
        (Value::Array(items), Segment::Index(index)) => items.get(*index),
        _ => None,
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, segment) in self.segments.iter().enumerate() {
            if position > 0 {
                f.write_str(".")?;
            }
            match segment {
                Segment::Key(key) => f.write_str(key)?,
                Segment::Index(index) => write!(f, "{index}")?,
            }
        }
        Ok(())
    }
}

impl From<&str> for KeyPath {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}
