//! Configuration Error Types
//!
//! Error handling for every stage of the loading pipeline: source reads, decoding,
//! placeholder resolution and typed access. Variants carry enough context to be
//! actionable from a log line alone.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Boxed error used to carry the underlying failure of a codec or source.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Shared form of [`BoxError`] so that errors can be cloned across waiters
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Configuration errors with detailed context
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// No codec is registered for the requested format
    #[error("Unsupported configuration format '{format}' (entry '{key}')")]
    UnsupportedFormat { format: String, key: String },

    /// A codec failed to parse the raw bytes of an entry
    #[error("Failed to decode '{key}' as {format}: {source}")]
    DecodeError {
        key: String,
        format: String,
        #[source]
        source: SharedError,
    },

    /// Placeholder references form a loop
    #[error("Placeholder resolution cycle detected: {}", chain.join(" -> "))]
    ResolutionCycle { chain: Vec<String> },

    /// Placeholder references are nested deeper than allowed
    #[error("Placeholder resolution exceeded maximum depth {max_depth} while resolving '{path}'")]
    ResolutionDepthExceeded { path: String, max_depth: usize },

    /// A key path segment does not exist
    #[error("Configuration key not found: '{path}'")]
    KeyNotFound { path: String },

    /// A value (or an intermediate node) has an unexpected shape
    #[error("Type mismatch at '{path}': expected {expected}, got {actual}")]
    TypeMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    /// Structured decoding of the configuration tree failed
    #[error("Failed to scan configuration into {target}: {reason}")]
    ScanError { target: String, reason: String },

    /// A source could not be read
    #[error("Configuration source '{source_name}' unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// The configuration has not completed an initial load
    #[error("Configuration has not been loaded")]
    NotLoaded,

    /// `load` was called on an already loaded configuration
    #[error("Configuration is already loaded; use reload() instead")]
    AlreadyLoaded,

    /// A load or reload did not finish within the configured timeout
    #[error("Configuration {operation} timed out after {timeout:?}")]
    Timeout {
        operation: String,
        timeout: Duration,
    },

    /// The loader was closed and can no longer reload
    #[error("Configuration loader is closed")]
    Closed,
}

impl ConfigError {
    /// Create an unsupported format error
    pub fn unsupported_format<F: Into<String>, K: Into<String>>(format: F, key: K) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
            key: key.into(),
        }
    }

    /// Create a decode error wrapping the underlying parse failure
    pub fn decode_error<K, F, E>(key: K, format: F, source: E) -> Self
    where
        K: Into<String>,
        F: Into<String>,
        E: Into<BoxError>,
    {
        Self::DecodeError {
            key: key.into(),
            format: format.into(),
            source: Arc::from(source.into()),
        }
    }

    /// Create a key not found error
    pub fn key_not_found<P: Into<String>>(path: P) -> Self {
        Self::KeyNotFound { path: path.into() }
    }

    /// Create a type mismatch error
    pub fn type_mismatch<P: Into<String>, E: Into<String>, A: Into<String>>(
        path: P,
        expected: E,
        actual: A,
    ) -> Self {
        Self::TypeMismatch {
            path: path.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a scan error
    pub fn scan_error<T: Into<String>, R: std::fmt::Display>(target: T, reason: R) -> Self {
        Self::ScanError {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a source unavailable error
    pub fn source_unavailable<S: Into<String>, R: std::fmt::Display>(
        source_name: S,
        reason: R,
    ) -> Self {
        Self::SourceUnavailable {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a timeout error
    pub fn timeout<O: Into<String>>(operation: O, timeout: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout,
        }
    }

    /// Whether this error came from a source rather than from the pipeline itself
    pub fn is_source_error(&self) -> bool {
        matches!(self, Self::SourceUnavailable { .. })
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
