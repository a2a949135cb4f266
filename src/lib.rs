#![allow(clippy::doc_markdown)] // Allow technical terms like YAML, TOML in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Tasker Config
//!
//! Hierarchical configuration loading from several sources with placeholder
//! resolution and hot reload.
//!
//! ## Overview
//!
//! Configuration is assembled by a fixed pipeline:
//!
//! ```text
//! Source(s) -> Decoder -> per-entry trees -> Merger -> unified tree -> Resolver -> Snapshot
//! ```
//!
//! Each [`Source`] yields raw entries (a file, a set of environment variables,
//! an in-memory document). Entries are decoded by format into trees, deep-merged
//! in source registration order, and finally passed through a [`Resolver`] that
//! expands `${path}` / `${path:default}` placeholders. The result is published
//! as an immutable [`Snapshot`]. When a watched source changes, the pipeline
//! runs again, the new snapshot replaces the old one atomically, and watchers
//! of the paths whose values changed are notified.
//!
//! ## Module Organization
//!
//! - [`source`] - configuration sources and their change watchers
//! - [`codec`] - format registry and the decode step
//! - [`merge`] - deep merge of decoded trees
//! - [`resolver`] - placeholder expansion and variable providers
//! - [`loader`] - the pipeline, its lifecycle and the accessor API
//! - [`watch`] - path-scoped change notification
//! - [`value`] / [`path`] - typed values and key paths
//! - [`options`] - settings of the loader itself
//! - [`logging`] - structured logging setup
//! - [`error`] - structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use serde::Deserialize;
//! use tasker_config::{Config, ConfigResult, EnvSource, FileSource};
//!
//! #[derive(Debug, Deserialize)]
//! struct Server {
//!     name: String,
//!     port: String,
//! }
//!
//! # async fn example() -> ConfigResult<()> {
//! let config = Config::builder()
//!     .with_source(FileSource::new("config/"))
//!     .with_source(EnvSource::new(["APP_"]))
//!     .build()?;
//! config.load().await?;
//!
//! let server: Server = config.value("http.server")?.scan()?;
//!
//! config.watch("service.name", |event| {
//!     println!("service.name changed to {:?}", event.current);
//! });
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod error;
pub mod loader;
pub mod logging;
pub mod merge;
pub mod options;
pub mod path;
pub mod resolver;
pub mod source;
pub mod value;
pub mod watch;

pub use codec::{Codec, CodecRegistry, Decoder};
pub use error::{ConfigError, ConfigResult};
pub use loader::{Config, ConfigBuilder, LoaderState, ReloadErrorHook, Snapshot};
pub use options::LoaderOptions;
pub use path::KeyPath;
pub use resolver::{
    DotenvVariables, EnvironmentVariables, PlaceholderResolver, Resolver, StaticVariables,
    VariableProvider,
};
pub use source::{EnvSource, FileSource, MemorySource, RawEntry, Source, SourceWatcher};
pub use value::{ConfigValue, Tree};
pub use watch::{ChangeEvent, WatchSubscription, WatchToken};
