//! Built-in codecs.

use super::{insert_dotted, Codec};
use crate::error::BoxError;
use crate::value::Tree;
use serde_json::Value;

/// JSON documents
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &str {
        "json"
    }

    fn unmarshal(&self, data: &[u8]) -> Result<Value, BoxError> {
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(data)?)
    }
}

/// YAML documents
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlCodec;

impl Codec for YamlCodec {
    fn name(&self) -> &str {
        "yaml"
    }

    fn unmarshal(&self, data: &[u8]) -> Result<Value, BoxError> {
        let text = std::str::from_utf8(data)?;
        let has_content = text.lines().map(str::trim).any(|line| {
            !(line.is_empty() || line.starts_with('#') || line == "---" || line == "...")
        });
        if !has_content {
            return Ok(Value::Null);
        }
        Ok(serde_yaml::from_str(text)?)
    }
}

/// TOML documents
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlCodec;

impl Codec for TomlCodec {
    fn name(&self) -> &str {
        "toml"
    }

    fn unmarshal(&self, data: &[u8]) -> Result<Value, BoxError> {
        let text = std::str::from_utf8(data)?;
        let table: toml::Table = toml::from_str(text)?;
        Ok(toml_to_json(toml::Value::Table(table)))
    }
}

/// Convert a TOML value to the generic tree representation.
///
/// Datetimes become their RFC 3339 string form.
fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

/// `application/x-www-form-urlencoded` bodies.
///
/// Dotted keys nest (`http.port=80`), and a key repeated several times becomes a
/// sequence of its values in order of appearance.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormCodec;

impl Codec for FormCodec {
    fn name(&self) -> &str {
        "form"
    }

    fn unmarshal(&self, data: &[u8]) -> Result<Value, BoxError> {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(data)?;

        let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
        for (key, value) in pairs {
            match grouped.iter_mut().find(|(k, _)| *k == key) {
                Some((_, values)) => values.push(value),
                None => grouped.push((key, vec![value])),
            }
        }

        let mut tree = Tree::new();
        for (key, mut values) in grouped {
            let value = if values.len() == 1 {
                Value::String(values.remove(0))
            } else {
                Value::Array(values.into_iter().map(Value::String).collect())
            };
            insert_dotted(&mut tree, &key, value);
        }
        Ok(Value::Object(tree))
    }
}
