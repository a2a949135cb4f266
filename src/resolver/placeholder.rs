//! Placeholder expansion.
//!
//! Grammar inside any string value:
//!
//! - `${path}` - value at `path` in the merged tree, else the variable `path`
//! - `${path:default}` - as above, falling back to the literal `default`
//!   (everything after the first `:`, so `${OFFSET:-1}` falls back to `-1`)
//! - `$${` - a literal `${`
//!
//! A string that is exactly one placeholder takes the referenced value with its
//! type (a number stays a number, a mapping stays a mapping). Placeholders inside
//! longer strings are spliced in as text. A placeholder that cannot be resolved
//! and has no default is left in place verbatim. `$NAME` without braces is
//! ordinary text.
//!
//! ```rust
//! use serde_json::json;
//! use std::sync::Arc;
//! use tasker_config::resolver::{PlaceholderResolver, Resolver, StaticVariables};
//!
//! let mut tree = json!({
//!     "service": {"name": "kratos_app"},
//!     "http": {"server": {
//!         "name": "${service.name}",
//!         "port": "${PORT:8080}",
//!         "timeout": "$TIMEOUT"
//!     }}
//! })
//! .as_object()
//! .cloned()
//! .unwrap();
//!
//! let resolver = PlaceholderResolver::new(Arc::new(StaticVariables::new()));
//! resolver.resolve(&mut tree).unwrap();
//!
//! assert_eq!(tree["http"]["server"]["name"], "kratos_app");
//! assert_eq!(tree["http"]["server"]["port"], "8080");
//! assert_eq!(tree["http"]["server"]["timeout"], "$TIMEOUT");
//! ```

use super::variables::{EnvironmentVariables, VariableProvider};
use super::Resolver;
use crate::error::{ConfigError, ConfigResult};
use crate::path::KeyPath;
use crate::value::{render_scalar, Tree};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Maximum number of chained placeholder hops
pub const DEFAULT_MAX_DEPTH: usize = 32;

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\$\{|\$\{([^}]*)\}").expect("placeholder pattern is a valid regex")
    })
}

/// Whether `text` may need expansion
pub fn contains_placeholder(text: &str) -> bool {
    text.contains("${")
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Reference<'t> {
    /// Full `${...}` text, kept for unresolved placeholders
    raw: &'t str,
    path: &'t str,
    default: Option<&'t str>,
}

impl<'t> Reference<'t> {
    fn parse(raw: &'t str, inner: &'t str) -> Self {
        match inner.split_once(':') {
            Some((path, default)) => Self {
                raw,
                path: path.trim(),
                default: Some(default),
            },
            None => Self {
                raw,
                path: inner.trim(),
                default: None,
            },
        }
    }

    /// Value used when neither the tree nor the variables know `path`
    fn fallback(&self) -> &'t str {
        self.default.unwrap_or(self.raw)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece<'t> {
    Text(&'t str),
    Reference(Reference<'t>),
}

fn parse_pieces(text: &str) -> Vec<Piece<'_>> {
    let mut pieces = Vec::new();
    let mut last_end = 0;

    for captures in placeholder_pattern().captures_iter(text) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        if whole.start() > last_end {
            pieces.push(Piece::Text(&text[last_end..whole.start()]));
        }
        match captures.get(1) {
            Some(inner) => pieces.push(Piece::Reference(Reference::parse(
                whole.as_str(),
                inner.as_str(),
            ))),
            // Escaped `$${`
            None => pieces.push(Piece::Text(&whole.as_str()[1..])),
        }
        last_end = whole.end();
    }

    if last_end < text.len() {
        pieces.push(Piece::Text(&text[last_end..]));
    }
    pieces
}

/// Default resolver: expands placeholders against the tree, then variables
#[derive(Debug, Clone)]
pub struct PlaceholderResolver {
    variables: Arc<dyn VariableProvider>,
    max_depth: usize,
}

impl PlaceholderResolver {
    pub fn new(variables: Arc<dyn VariableProvider>) -> Self {
        Self {
            variables,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Bound the number of chained placeholder hops
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

impl Default for PlaceholderResolver {
    fn default() -> Self {
        Self::new(Arc::new(EnvironmentVariables))
    }
}

impl Resolver for PlaceholderResolver {
    fn resolve(&self, tree: &mut Tree) -> ConfigResult<()> {
        let snapshot = tree.clone();
        let mut resolution = Resolution {
            root: &snapshot,
            variables: self.variables.as_ref(),
            max_depth: self.max_depth,
            stack: Vec::new(),
            resolved: HashMap::new(),
        };

        let root = KeyPath::default();
        for (key, value) in tree.iter_mut() {
            let path = root.child_key(key);
            *value = resolution.walk(&path, value)?;
        }
        Ok(())
    }
}

/// State of one resolve pass over a tree snapshot
struct Resolution<'a> {
    root: &'a Tree,
    variables: &'a dyn VariableProvider,
    max_depth: usize,
    /// Leaf paths currently being expanded, outermost first
    stack: Vec<String>,
    /// Expanded leaves by canonical path
    resolved: HashMap<String, Value>,
}

impl Resolution<'_> {
    /// Expand every string below `value`
    fn walk(&mut self, path: &KeyPath, value: &Value) -> ConfigResult<Value> {
        match value {
            Value::String(text) => self.resolve_leaf(path, text),
            Value::Object(map) => {
                let mut out = Tree::new();
                for (key, child) in map {
                    let resolved = self.walk(&path.child_key(key), child)?;
                    out.insert(key.clone(), resolved);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(index, item)| self.walk(&path.child_index(index), item))
                .collect::<ConfigResult<Vec<_>>>()
                .map(Value::Array),
            scalar => Ok(scalar.clone()),
        }
    }

    fn resolve_leaf(&mut self, path: &KeyPath, text: &str) -> ConfigResult<Value> {
        if !contains_placeholder(text) {
            return Ok(Value::String(text.to_string()));
        }

        let key = path.canonical();
        if let Some(done) = self.resolved.get(&key) {
            return Ok(done.clone());
        }
        if let Some(start) = self.stack.iter().position(|p| *p == key) {
            let mut chain = self.stack[start..].to_vec();
            chain.push(key);
            return Err(ConfigError::ResolutionCycle { chain });
        }
        if self.stack.len() >= self.max_depth {
            return Err(ConfigError::ResolutionDepthExceeded {
                path: key,
                max_depth: self.max_depth,
            });
        }

        self.stack.push(key.clone());
        let expanded = self.expand(text);
        self.stack.pop();

        let value = expanded?;
        self.resolved.insert(key, value.clone());
        Ok(value)
    }

    fn expand(&mut self, text: &str) -> ConfigResult<Value> {
        let pieces = parse_pieces(text);

        if let [Piece::Reference(reference)] = pieces.as_slice() {
            return Ok(self
                .lookup(reference)?
                .unwrap_or_else(|| Value::String(reference.fallback().to_string())));
        }

        let mut out = String::with_capacity(text.len());
        for piece in &pieces {
            match piece {
                Piece::Text(t) => out.push_str(t),
                Piece::Reference(reference) => match self.lookup(reference)? {
                    Some(value) => out.push_str(&render_scalar(&value)),
                    None => out.push_str(reference.fallback()),
                },
            }
        }
        Ok(Value::String(out))
    }

    /// Resolve a reference against the tree, then the variables
    fn lookup(&mut self, reference: &Reference<'_>) -> ConfigResult<Option<Value>> {
        let path = KeyPath::parse(reference.path);
        let root = self.root;
        if !path.is_root() {
            if let Some(raw) = path.lookup(root) {
                return self.walk(&path, raw).map(Some);
            }
        }

        if let Some(value) = self.variables.get(reference.path) {
            return Ok(Some(Value::String(value)));
        }

        if reference.default.is_none() {
            debug!(
                placeholder = reference.raw,
                "Leaving unresolved placeholder as literal text"
            );
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::StaticVariables;
    use serde_json::json;

    fn tree(value: Value) -> Tree {
        match value {
            Value::Object(map) => map,
            other => panic!("expected mapping, got {other}"),
        }
    }

    fn resolve_with(value: Value, vars: StaticVariables) -> ConfigResult<Value> {
        let mut tree = tree(value);
        PlaceholderResolver::new(Arc::new(vars)).resolve(&mut tree)?;
        Ok(Value::Object(tree))
    }

    fn resolve(value: Value) -> ConfigResult<Value> {
        resolve_with(value, StaticVariables::new())
    }

    #[test]
    fn test_parse_pieces() {
        assert_eq!(
            parse_pieces("a${b:c}d$${e}"),
            vec![
                Piece::Text("a"),
                Piece::Reference(Reference {
                    raw: "${b:c}",
                    path: "b",
                    default: Some("c"),
                }),
                Piece::Text("d"),
                Piece::Text("${"),
                Piece::Text("e}"),
            ]
        );
    }

    #[test]
    fn test_whole_placeholder_preserves_type() {
        let resolved = resolve(json!({
            "limits": {"max": 10, "flags": [true, false]},
            "copy": "${limits.max}",
            "flags": "${limits.flags}",
            "all": "${limits}"
        }))
        .unwrap();

        assert_eq!(resolved["copy"], json!(10));
        assert_eq!(resolved["flags"], json!([true, false]));
        assert_eq!(resolved["all"], json!({"max": 10, "flags": [true, false]}));
    }

    #[test]
    fn test_splice_coerces_to_string() {
        let resolved = resolve(json!({
            "host": "db",
            "port": 5432,
            "url": "postgres://${host}:${port}/app"
        }))
        .unwrap();

        assert_eq!(resolved["url"], json!("postgres://db:5432/app"));
    }

    #[test]
    fn test_sequence_index_references() {
        let resolved = resolve(json!({
            "servers": [{"host": "a"}, {"host": "b"}],
            "primary": "${servers[1].host}",
            "first": "${servers.0.host}"
        }))
        .unwrap();

        assert_eq!(resolved["primary"], json!("b"));
        assert_eq!(resolved["first"], json!("a"));
    }

    #[test]
    fn test_defaults_and_literals() {
        let resolved = resolve(json!({
            "port": "${PORT:8080}",
            "negative": "${OFFSET:-1}",
            "signed_duration": "${DELTA:-5s}",
            "colons": "${ADDR:127.0.0.1:80}",
            "missing": "${NOPE}",
            "embedded": "x-${NOPE}-y",
            "dollar": "$PORT",
            "unterminated": "${PORT",
            "escaped": "$${PORT}"
        }))
        .unwrap();

        assert_eq!(resolved["port"], json!("8080"));
        assert_eq!(resolved["negative"], json!("-1"));
        assert_eq!(resolved["signed_duration"], json!("-5s"));
        assert_eq!(resolved["colons"], json!("127.0.0.1:80"));
        assert_eq!(resolved["missing"], json!("${NOPE}"));
        assert_eq!(resolved["embedded"], json!("x-${NOPE}-y"));
        assert_eq!(resolved["dollar"], json!("$PORT"));
        assert_eq!(resolved["unterminated"], json!("${PORT"));
        assert_eq!(resolved["escaped"], json!("${PORT}"));
    }

    #[test]
    fn test_tree_takes_precedence_over_variables() {
        let vars = StaticVariables::new()
            .with("service.name", "from-vars")
            .with("PORT", "7000");
        let resolved = resolve_with(
            json!({
                "service": {"name": "from-tree"},
                "name": "${service.name}",
                "port": "${PORT:8080}"
            }),
            vars,
        )
        .unwrap();

        assert_eq!(resolved["name"], json!("from-tree"));
        assert_eq!(resolved["port"], json!("7000"));
    }

    #[test]
    fn test_chained_references_resolve_transitively() {
        let resolved = resolve(json!({
            "a": "${b}",
            "b": "${c}-suffix",
            "c": "base"
        }))
        .unwrap();

        assert_eq!(resolved["a"], json!("base-suffix"));
        assert_eq!(resolved["b"], json!("base-suffix"));
    }

    #[test]
    fn test_cycle_is_detected() {
        let error = resolve(json!({"a": "${b}", "b": "${a}"})).unwrap_err();
        match error {
            ConfigError::ResolutionCycle { chain } => {
                assert_eq!(chain, vec!["a", "b", "a"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_self_reference_through_parent_is_cycle() {
        let error = resolve(json!({"a": {"b": "${a}"}})).unwrap_err();
        assert!(matches!(error, ConfigError::ResolutionCycle { .. }));
    }

    #[test]
    fn test_depth_is_bounded() {
        let mut chain = Tree::new();
        for i in 0..10 {
            chain.insert(format!("k{i}"), json!(format!("${{k{}}}", i + 1)));
        }
        chain.insert("k10".to_string(), json!("end"));

        let mut shallow = chain.clone();
        let error = PlaceholderResolver::new(Arc::new(StaticVariables::new()))
            .with_max_depth(4)
            .resolve(&mut shallow)
            .unwrap_err();
        assert!(matches!(
            error,
            ConfigError::ResolutionDepthExceeded { max_depth: 4, .. }
        ));

        let mut deep = chain;
        PlaceholderResolver::new(Arc::new(StaticVariables::new()))
            .resolve(&mut deep)
            .unwrap();
        assert_eq!(deep["k0"], json!("end"));
    }
}
