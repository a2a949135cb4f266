//! Configuration values and typed reads.

use crate::error::{ConfigError, ConfigResult};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// Keyed configuration tree; the document root of every decoded entry
pub type Tree = serde_json::Map<String, Value>;

/// Human-readable name of a value's kind, used in type mismatch errors
pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

/// Render a value the way it appears when spliced into a larger string.
///
/// Strings are used verbatim, null becomes empty, compound values are compact JSON.
pub fn render_scalar(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        compound => compound.to_string(),
    }
}

/// A value read from the configuration, remembering the path it came from
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValue {
    path: String,
    value: Value,
}

impl ConfigValue {
    pub fn new<P: Into<String>>(path: P, value: Value) -> Self {
        Self {
            path: path.into(),
            value,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn raw(&self) -> &Value {
        &self.value
    }

    pub fn into_raw(self) -> Value {
        self.value
    }

    fn mismatch(&self, expected: &str) -> ConfigError {
        ConfigError::type_mismatch(&self.path, expected, kind_name(&self.value))
    }

    /// Borrow the value as a string; only string values qualify
    pub fn as_str(&self) -> ConfigResult<&str> {
        self.value.as_str().ok_or_else(|| self.mismatch("string"))
    }

    /// Coerce any scalar to its string form
    pub fn to_string_value(&self) -> ConfigResult<String> {
        match &self.value {
            Value::Array(_) | Value::Object(_) => Err(self.mismatch("scalar")),
            scalar => Ok(render_scalar(scalar)),
        }
    }

    /// Read a boolean; the strings `true`/`false`/`1`/`0` are accepted
    pub fn as_bool(&self) -> ConfigResult<bool> {
        match &self.value {
            Value::Bool(b) => Ok(*b),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                _ => Err(self.mismatch("bool")),
            },
            _ => Err(self.mismatch("bool")),
        }
    }

    /// Read an integer; numeric strings are parsed
    pub fn as_i64(&self) -> ConfigResult<i64> {
        match &self.value {
            Value::Number(n) => n.as_i64().ok_or_else(|| self.mismatch("integer")),
            Value::String(s) => s.trim().parse().map_err(|_| self.mismatch("integer")),
            _ => Err(self.mismatch("integer")),
        }
    }

    /// Read a float; numeric strings are parsed
    pub fn as_f64(&self) -> ConfigResult<f64> {
        match &self.value {
            Value::Number(n) => n.as_f64().ok_or_else(|| self.mismatch("float")),
            Value::String(s) => s.trim().parse().map_err(|_| self.mismatch("float")),
            _ => Err(self.mismatch("float")),
        }
    }

    /// Read a duration. Bare integers are milliseconds; strings may carry a
    /// `ms`, `s`, `m` or `h` suffix (`"250ms"`, `"30s"`, `"1.5h"`).
    pub fn as_duration(&self) -> ConfigResult<Duration> {
        match &self.value {
            Value::Number(n) => n
                .as_u64()
                .map(Duration::from_millis)
                .ok_or_else(|| self.mismatch("duration")),
            Value::String(s) => parse_duration(s).ok_or_else(|| self.mismatch("duration")),
            _ => Err(self.mismatch("duration")),
        }
    }

    /// Decode this value into a structured type
    pub fn scan<T: DeserializeOwned>(&self) -> ConfigResult<T> {
        serde_json::from_value(self.value.clone())
            .map_err(|e| ConfigError::scan_error(std::any::type_name::<T>(), e))
    }
}

fn parse_duration(input: &str) -> Option<Duration> {
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    let amount: f64 = number.parse().ok()?;
    let millis_per_unit = match unit.trim() {
        "" | "ms" => 1.0,
        "s" => 1_000.0,
        "m" => 60_000.0,
        "h" => 3_600_000.0,
        _ => return None,
    };
    // Rejects negative, non-finite and out-of-range amounts
    Duration::try_from_secs_f64(amount * millis_per_unit / 1_000.0).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn test_string_coercion() {
        assert_eq!(
            ConfigValue::new("p", json!(8080)).to_string_value().unwrap(),
            "8080"
        );
        assert_eq!(
            ConfigValue::new("p", json!(true)).to_string_value().unwrap(),
            "true"
        );
        assert!(ConfigValue::new("p", json!({"a": 1}))
            .to_string_value()
            .is_err());
    }

    #[test]
    fn test_numeric_reads_accept_strings() {
        assert_eq!(ConfigValue::new("p", json!("8080")).as_i64().unwrap(), 8080);
        assert_eq!(ConfigValue::new("p", json!("0.5")).as_f64().unwrap(), 0.5);
        assert!(ConfigValue::new("p", json!("eighty")).as_i64().is_err());
    }

    #[test]
    fn test_bool_reads() {
        assert!(ConfigValue::new("p", json!("TRUE")).as_bool().unwrap());
        assert!(!ConfigValue::new("p", json!(false)).as_bool().unwrap());
        assert!(ConfigValue::new("p", json!("yes please")).as_bool().is_err());
    }

    #[test]
    fn test_duration_parsing() {
        let read = |v: Value| ConfigValue::new("timeout", v).as_duration().unwrap();

        assert_eq!(read(json!(250)), Duration::from_millis(250));
        assert_eq!(read(json!("250ms")), Duration::from_millis(250));
        assert_eq!(read(json!("30s")), Duration::from_secs(30));
        assert_eq!(read(json!("2m")), Duration::from_secs(120));
        assert_eq!(read(json!("1.5h")), Duration::from_secs(5400));
        assert!(ConfigValue::new("timeout", json!("soon"))
            .as_duration()
            .is_err());

        let overflow =
            ConfigValue::new("timeout", json!("99999999999999999999999h")).as_duration();
        assert!(matches!(overflow, Err(ConfigError::TypeMismatch { .. })));
        assert!(ConfigValue::new("timeout", json!(1e300)).as_duration().is_err());
    }

    #[test]
    fn test_scan_nested_value() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Server {
            name: String,
            port: u16,
        }

        let value = ConfigValue::new("http.server", json!({"name": "api", "port": 9000}));
        let server: Server = value.scan().unwrap();
        assert_eq!(
            server,
            Server {
                name: "api".to_string(),
                port: 9000
            }
        );
    }

    #[test]
    fn test_mismatch_names_path() {
        let error = ConfigValue::new("http.server", json!([1]))
            .as_str()
            .unwrap_err();
        assert!(error.to_string().contains("http.server"));
        assert!(error.to_string().contains("sequence"));
    }
}
