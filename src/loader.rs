//! # Configuration Loader
//!
//! Runs the pipeline `sources -> decode -> merge -> resolve -> publish` and keeps
//! the result current.
//!
//! ## Lifecycle
//!
//! ```text
//! Unloaded --load()--> Loading --ok--> Ready --change/reload()--> Reloading --ok--> Ready
//!              ^                                                      |
//!              +------ initial load failed                            +--err--> Failed
//! ```
//!
//! A failed reload leaves the previously published snapshot in place. `Failed`
//! only records that the most recent attempt did not succeed; the next
//! successful reload returns to `Ready`.
//!
//! ## Concurrency
//!
//! Every rebuild after the initial load happens on a single reload worker task
//! fed by one queue. Source watchers and [`Config::reload`] only enqueue
//! commands, so decode, merge and resolve never run concurrently, and change
//! notifications that pile up while a rebuild is running are coalesced into
//! one rebuild. Readers clone the current `Arc<Snapshot>` and never observe a
//! partially built tree.

use crate::codec::{CodecRegistry, Decoder};
use crate::error::{ConfigError, ConfigResult};
use crate::logging::log_config_operation;
use crate::merge::merge_into;
use crate::options::LoaderOptions;
use crate::path::KeyPath;
use crate::resolver::{
    DotenvVariables, EnvironmentVariables, PlaceholderResolver, Resolver, VariableProvider,
};
use crate::source::{EnvSource, FileSource, RawEntry, Source, SourceWatcher};
use crate::value::{ConfigValue, Tree};
use crate::watch::{ChangeEvent, WatchRegistry, WatchSubscription, WatchToken};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Callback invoked with every reload failure
pub type ReloadErrorHook = Arc<dyn Fn(&ConfigError) + Send + Sync>;

/// Pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoaderState {
    Unloaded,
    Loading,
    Ready,
    Reloading,
    /// Last reload failed; the previous snapshot is still served
    Failed,
}

impl LoaderState {
    /// Whether a snapshot has been published
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Ready | Self::Reloading | Self::Failed)
    }
}

impl fmt::Display for LoaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unloaded => "unloaded",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Reloading => "reloading",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// An immutable, fully resolved configuration tree
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    version: u64,
    loaded_at: DateTime<Utc>,
    tree: Tree,
}

impl Snapshot {
    fn new(version: u64, tree: Tree) -> Self {
        Self {
            version,
            loaded_at: Utc::now(),
            tree,
        }
    }

    /// Monotonic publication counter, starting at 1
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Value at `path`; the empty path addresses the whole tree
    pub fn value(&self, path: &str) -> ConfigResult<ConfigValue> {
        let key_path = KeyPath::parse(path);
        if key_path.is_root() {
            return Ok(ConfigValue::new(path, Value::Object(self.tree.clone())));
        }
        let value = key_path.navigate(&self.tree)?;
        Ok(ConfigValue::new(path, value.clone()))
    }

    /// Decode the whole tree into `T`
    pub fn scan<T: DeserializeOwned>(&self) -> ConfigResult<T> {
        serde_json::from_value(Value::Object(self.tree.clone()))
            .map_err(|e| ConfigError::scan_error(std::any::type_name::<T>(), e))
    }
}

/// Builder for [`Config`].
///
/// Sources are merged in the order they are added; later sources override
/// earlier ones. [`LoaderOptions`] apply at [`ConfigBuilder::build`], whatever
/// the call order: file sources added with [`ConfigBuilder::with_file`] poll at
/// the final `poll_interval_ms`, and a non-empty `env_prefixes` adds an
/// [`EnvSource`] after every registered source.
///
/// ```rust,no_run
/// use tasker_config::{Config, EnvSource, FileSource};
///
/// # async fn example() -> tasker_config::ConfigResult<()> {
/// let config = Config::builder()
///     .with_source(FileSource::new("config/"))
///     .with_source(EnvSource::new(["APP_"]))
///     .build()?;
/// config.load().await?;
///
/// let name = config.value("service.name")?.to_string_value()?;
/// # Ok(())
/// # }
/// ```
pub struct ConfigBuilder {
    sources: Vec<PendingSource>,
    codecs: Arc<CodecRegistry>,
    decoder: Option<Arc<dyn Decoder>>,
    resolver: Option<Arc<dyn Resolver>>,
    variables: Option<Arc<dyn VariableProvider>>,
    options: LoaderOptions,
    on_reload_error: Option<ReloadErrorHook>,
}

/// A source whose construction waits for the final options
#[derive(Debug)]
enum PendingSource {
    Ready(Arc<dyn Source>),
    File(PathBuf),
}

impl PendingSource {
    fn into_source(self, options: &LoaderOptions) -> Arc<dyn Source> {
        match self {
            Self::Ready(source) => source,
            Self::File(path) => {
                Arc::new(FileSource::new(path).with_poll_interval(options.poll_interval()))
            }
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            codecs: Arc::new(CodecRegistry::default()),
            decoder: None,
            resolver: None,
            variables: None,
            options: LoaderOptions::default(),
            on_reload_error: None,
        }
    }
}

impl fmt::Debug for ConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigBuilder")
            .field("sources", &self.sources)
            .field("codecs", &self.codecs)
            .field("custom_decoder", &self.decoder.is_some())
            .field("custom_resolver", &self.resolver.is_some())
            .field("options", &self.options)
            .finish()
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source<S: Source + 'static>(mut self, source: S) -> Self {
        self.sources.push(PendingSource::Ready(Arc::new(source)));
        self
    }

    pub fn with_source_arc(mut self, source: Arc<dyn Source>) -> Self {
        self.sources.push(PendingSource::Ready(source));
        self
    }

    /// Add a file or directory source polled at the configured interval
    pub fn with_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.sources.push(PendingSource::File(path.into()));
        self
    }

    /// Add an environment source for the given prefixes
    pub fn with_env<I, S>(self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_source(EnvSource::new(prefixes))
    }

    /// Codec registry used by the default decoder
    pub fn with_codecs(mut self, codecs: Arc<CodecRegistry>) -> Self {
        self.codecs = codecs;
        self
    }

    /// Replace the decode step entirely
    pub fn with_decoder<D: Decoder + 'static>(mut self, decoder: D) -> Self {
        self.decoder = Some(Arc::new(decoder));
        self
    }

    /// Replace the resolve step entirely
    pub fn with_resolver<R: Resolver + 'static>(mut self, resolver: R) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Variables consulted by the default placeholder resolver
    pub fn with_variables<V: VariableProvider + 'static>(mut self, variables: V) -> Self {
        self.variables = Some(Arc::new(variables));
        self
    }

    pub fn with_options(mut self, options: LoaderOptions) -> Self {
        self.options = options;
        self
    }

    /// Bound `load()` and each reload; `None` disables the bound
    pub fn load_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.options.load_timeout_ms = timeout.map_or(0, |t| t.as_millis().max(1) as u64);
        self
    }

    pub fn max_resolve_depth(mut self, depth: usize) -> Self {
        self.options.max_resolve_depth = depth;
        self
    }

    /// Called on the reload worker with every failed reload
    pub fn on_reload_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ConfigError) + Send + Sync + 'static,
    {
        self.on_reload_error = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> ConfigResult<Config> {
        let decoder: Arc<dyn Decoder> = match self.decoder {
            Some(decoder) => decoder,
            None => self.codecs,
        };

        let resolver: Arc<dyn Resolver> = match self.resolver {
            Some(resolver) => resolver,
            None => {
                let variables: Arc<dyn VariableProvider> =
                    match (self.variables, &self.options.dotenv_path) {
                        (Some(variables), _) => variables,
                        (None, Some(path)) => Arc::new(DotenvVariables::from_path(path)?),
                        (None, None) => Arc::new(EnvironmentVariables),
                    };
                Arc::new(
                    PlaceholderResolver::new(variables)
                        .with_max_depth(self.options.max_resolve_depth),
                )
            }
        };

        let options = self.options;
        let mut sources: Vec<Arc<dyn Source>> = self
            .sources
            .into_iter()
            .map(|pending| pending.into_source(&options))
            .collect();
        if !options.env_prefixes.is_empty() {
            sources.push(Arc::new(EnvSource::new(options.env_prefixes.clone())));
        }

        let source_count = sources.len();
        Ok(Config {
            inner: Arc::new(ConfigInner {
                sources,
                decoder,
                resolver,
                options,
                on_reload_error: self.on_reload_error,
                state: RwLock::new(LoaderState::Unloaded),
                current: RwLock::new(None),
                last_error: RwLock::new(None),
                entries: Mutex::new(vec![Vec::new(); source_count]),
                watches: Arc::new(WatchRegistry::new()),
                commands: Mutex::new(None),
                tasks: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            }),
        })
    }
}

enum Command {
    SourceChanged {
        index: usize,
        entries: Vec<RawEntry>,
    },
    SourceFailed {
        index: usize,
        error: ConfigError,
    },
    Reload {
        reply: oneshot::Sender<ConfigResult<u64>>,
    },
}

struct ConfigInner {
    sources: Vec<Arc<dyn Source>>,
    decoder: Arc<dyn Decoder>,
    resolver: Arc<dyn Resolver>,
    options: LoaderOptions,
    on_reload_error: Option<ReloadErrorHook>,
    state: RwLock<LoaderState>,
    current: RwLock<Option<Arc<Snapshot>>>,
    last_error: RwLock<Option<ConfigError>>,
    /// Most recent entries of each source, in registration order
    entries: Mutex<Vec<Vec<RawEntry>>>,
    watches: Arc<WatchRegistry>,
    commands: Mutex<Option<mpsc::UnboundedSender<Command>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

/// Handle to a loaded configuration.
///
/// Cloning is cheap; all clones share one pipeline. Background tasks stop when
/// [`Config::close`] is called or the last clone is dropped.
#[derive(Clone)]
pub struct Config {
    inner: Arc<ConfigInner>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("state", &self.state())
            .field("version", &self.version())
            .field("sources", &self.inner.sources)
            .field("watches", &self.inner.watches.len())
            .finish()
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Read every source, build the first snapshot and start watching.
    ///
    /// Sources are read concurrently but merged in registration order. On
    /// failure the loader returns to `Unloaded` and `load` may be retried.
    pub async fn load(&self) -> ConfigResult<()> {
        let inner = &self.inner;
        {
            let mut state = inner.state.write();
            if inner.closed.load(Ordering::Acquire) {
                return Err(ConfigError::Closed);
            }
            if *state != LoaderState::Unloaded {
                return Err(ConfigError::AlreadyLoaded);
            }
            *state = LoaderState::Loading;
        }

        info!(sources = inner.sources.len(), "Loading configuration");
        let started = Instant::now();

        let result = inner
            .with_timeout("load", async {
                let entries = inner.read_all().await?;
                let tree = inner.build_tree(&entries)?;
                Ok((entries, tree))
            })
            .await;

        let (entries, tree) = match result {
            Ok(built) => built,
            Err(e) => {
                inner.set_state(LoaderState::Unloaded);
                error!(error = %e, "Initial configuration load failed");
                return Err(e);
            }
        };

        *inner.entries.lock() = entries;
        let snapshot = Arc::new(Snapshot::new(1, tree));
        *inner.current.write() = Some(Arc::clone(&snapshot));

        // `Ready` only once reloads can be queued; the worker may already have
        // moved past `Loading` on an early source change
        self.start_background().await;
        {
            let mut state = inner.state.write();
            if *state == LoaderState::Loading {
                *state = LoaderState::Ready;
            }
        }

        log_config_operation(
            "load",
            Some(snapshot.version()),
            inner.sources.len(),
            "ready",
            Some(started.elapsed().as_millis() as u64),
            None,
        );
        Ok(())
    }

    /// Re-read every source and rebuild; returns the published version.
    ///
    /// Goes through the reload worker like any source change. On failure the
    /// previous snapshot stays current and the error is returned.
    pub async fn reload(&self) -> ConfigResult<u64> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(ConfigError::Closed);
        }
        if !self.state().is_loaded() {
            return Err(ConfigError::NotLoaded);
        }

        let sender = self.inner.commands.lock().clone().ok_or_else(|| {
            if self.is_closed() {
                ConfigError::Closed
            } else {
                ConfigError::NotLoaded
            }
        })?;
        let (reply, response) = oneshot::channel();
        sender
            .send(Command::Reload { reply })
            .map_err(|_| ConfigError::Closed)?;
        response.await.map_err(|_| ConfigError::Closed)?
    }

    /// Value at `path` in the current snapshot
    pub fn value(&self, path: &str) -> ConfigResult<ConfigValue> {
        self.snapshot()?.value(path)
    }

    /// Decode the current tree into `T`
    pub fn scan<T: DeserializeOwned>(&self) -> ConfigResult<T> {
        self.snapshot()?.scan()
    }

    /// Current snapshot
    pub fn snapshot(&self) -> ConfigResult<Arc<Snapshot>> {
        self.inner.current.read().clone().ok_or(ConfigError::NotLoaded)
    }

    /// Version of the current snapshot, if loaded
    pub fn version(&self) -> Option<u64> {
        self.inner.current.read().as_ref().map(|s| s.version())
    }

    /// Invoke `callback` whenever the value at `path` changes.
    ///
    /// The path does not need to exist yet. Callbacks run on the reload worker
    /// and should return quickly.
    pub fn watch<F>(&self, path: &str, callback: F) -> WatchToken
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.inner.watches.register(path, callback)
    }

    /// Cancel a watch; after this returns the callback never runs again
    pub fn unwatch(&self, token: WatchToken) -> bool {
        self.inner.watches.cancel(token)
    }

    /// Receive changes of the value at `path` through a channel
    pub fn subscribe(&self, path: &str) -> WatchSubscription {
        self.inner.watches.subscribe(path)
    }

    pub fn state(&self) -> LoaderState {
        *self.inner.state.read()
    }

    /// Error of the most recent failed reload, cleared by a successful one
    pub fn last_error(&self) -> Option<ConfigError> {
        self.inner.last_error.read().clone()
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.inner.options
    }

    /// Stop watching sources and end all subscriptions.
    ///
    /// The last snapshot stays readable; further reloads fail with `Closed`.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.shutdown();
        log_config_operation(
            "close",
            self.version(),
            self.inner.sources.len(),
            "closed",
            None,
            None,
        );
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    async fn start_background(&self) {
        let inner = &self.inner;
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut handles = Vec::new();

        for (index, source) in inner.sources.iter().enumerate() {
            match source.watch().await {
                Ok(Some(watcher)) => {
                    debug!(source = %source.name(), "Watching configuration source");
                    handles.push(tokio::spawn(forward_changes(
                        index,
                        source.name().to_string(),
                        watcher,
                        sender.clone(),
                    )));
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(source = %source.name(), error = %e, "Source cannot be watched; changes will not be picked up");
                }
            }
        }

        handles.push(tokio::spawn(run_worker(Arc::downgrade(inner), receiver)));

        if inner.closed.load(Ordering::Acquire) {
            for handle in handles {
                handle.abort();
            }
            return;
        }
        *inner.commands.lock() = Some(sender);
        inner.tasks.lock().extend(handles);
    }
}

impl ConfigInner {
    fn set_state(&self, state: LoaderState) {
        *self.state.write() = state;
    }

    async fn with_timeout<T, F>(&self, operation: &str, future: F) -> ConfigResult<T>
    where
        F: Future<Output = ConfigResult<T>>,
    {
        match self.options.load_timeout() {
            Some(limit) => tokio::time::timeout(limit, future)
                .await
                .map_err(|_| ConfigError::timeout(operation, limit))?,
            None => future.await,
        }
    }

    async fn read_all(&self) -> ConfigResult<Vec<Vec<RawEntry>>> {
        let results = join_all(self.sources.iter().map(|source| source.load())).await;
        let mut all = Vec::with_capacity(results.len());
        for (source, result) in self.sources.iter().zip(results) {
            let entries = result?;
            debug!(source = %source.name(), entries = entries.len(), "Read configuration source");
            all.push(entries);
        }
        Ok(all)
    }

    fn cached_entries(&self) -> Vec<Vec<RawEntry>> {
        self.entries.lock().clone()
    }

    /// Decode, merge and resolve
    fn build_tree(&self, all: &[Vec<RawEntry>]) -> ConfigResult<Tree> {
        let mut merged = Tree::new();
        for entries in all {
            for entry in entries {
                let tree = self.decoder.decode_entry(entry)?;
                merge_into(&mut merged, tree);
            }
        }
        self.resolver.resolve(&mut merged)?;
        Ok(merged)
    }

    async fn process(&self, batch: Vec<Command>) {
        let mut replies = Vec::new();
        let mut changed = false;

        for command in batch {
            match command {
                Command::SourceChanged { index, entries } => {
                    if let Some(slot) = self.entries.lock().get_mut(index) {
                        *slot = entries;
                        changed = true;
                    }
                }
                Command::SourceFailed { index, error } => {
                    let name = self.sources.get(index).map_or("unknown", |s| s.name());
                    warn!(source = %name, "Configuration source failed while watching");
                    self.record_failure(&error);
                }
                Command::Reload { reply } => replies.push(reply),
            }
        }

        if replies.is_empty() && !changed {
            return;
        }

        let result = self.rebuild(!replies.is_empty()).await;
        for reply in replies {
            // The caller may have given up waiting
            let _ = reply.send(result.clone());
        }
    }

    async fn rebuild(&self, reread_sources: bool) -> ConfigResult<u64> {
        self.set_state(LoaderState::Reloading);
        let started = Instant::now();

        let result = self
            .with_timeout("reload", async {
                let entries = if reread_sources {
                    self.read_all().await?
                } else {
                    self.cached_entries()
                };
                let tree = self.build_tree(&entries)?;
                Ok((entries, tree))
            })
            .await;

        match result {
            Ok((entries, tree)) => {
                if reread_sources {
                    *self.entries.lock() = entries;
                }
                let version = self.publish(tree);
                *self.last_error.write() = None;
                self.set_state(LoaderState::Ready);
                log_config_operation(
                    "reload",
                    Some(version),
                    self.sources.len(),
                    "ready",
                    Some(started.elapsed().as_millis() as u64),
                    None,
                );
                Ok(version)
            }
            Err(e) => {
                self.record_failure(&e);
                Err(e)
            }
        }
    }

    /// Swap in a new snapshot and notify watchers; unchanged trees are not republished
    fn publish(&self, tree: Tree) -> u64 {
        let (previous, snapshot) = {
            let mut current = self.current.write();
            if let Some(existing) = current.as_ref() {
                if existing.tree == tree {
                    debug!(version = existing.version(), "Configuration unchanged after reload");
                    return existing.version();
                }
            }
            let previous = current.take();
            let version = previous.as_ref().map_or(1, |s| s.version() + 1);
            let snapshot = Arc::new(Snapshot::new(version, tree));
            *current = Some(Arc::clone(&snapshot));
            (previous, snapshot)
        };

        let delivered = self.watches.dispatch(
            previous.as_ref().map(|s| s.tree()),
            snapshot.tree(),
            snapshot.version(),
        );
        debug!(
            version = snapshot.version(),
            notified = delivered,
            "Published configuration snapshot"
        );
        snapshot.version()
    }

    fn record_failure(&self, error: &ConfigError) {
        warn!(error = %error, "Configuration reload failed; keeping previous configuration");
        *self.last_error.write() = Some(error.clone());
        self.set_state(LoaderState::Failed);

        if let Some(hook) = &self.on_reload_error {
            if catch_unwind(AssertUnwindSafe(|| hook(error))).is_err() {
                warn!("Reload error hook panicked");
            }
        }
    }

    fn shutdown(&self) {
        self.commands.lock().take();
        for handle in self.tasks.lock().drain(..) {
            handle.abort();
        }
        self.watches.clear();
    }
}

impl Drop for ConfigInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn forward_changes(
    index: usize,
    name: String,
    mut watcher: Box<dyn SourceWatcher>,
    commands: mpsc::UnboundedSender<Command>,
) {
    while let Some(result) = watcher.next().await {
        let command = match result {
            Ok(entries) => Command::SourceChanged { index, entries },
            Err(error) => Command::SourceFailed { index, error },
        };
        if commands.send(command).is_err() {
            break;
        }
    }
    debug!(source = %name, "Source watcher finished");
}

async fn run_worker(inner: Weak<ConfigInner>, mut commands: mpsc::UnboundedReceiver<Command>) {
    while let Some(first) = commands.recv().await {
        let mut batch = vec![first];
        while let Ok(next) = commands.try_recv() {
            batch.push(next);
        }

        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.process(batch).await;
    }
    debug!("Configuration reload worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use crate::StaticVariables;
    use async_trait::async_trait;
    use serde_json::json;

    /// Source whose `watch` takes `delay` to start
    #[derive(Debug)]
    struct SlowWatchSource {
        delay: Duration,
    }

    #[async_trait]
    impl Source for SlowWatchSource {
        fn name(&self) -> &str {
            "slow-watch"
        }

        async fn load(&self) -> ConfigResult<Vec<RawEntry>> {
            Ok(vec![RawEntry::new("slow-watch", "yaml", "a: 1\n")])
        }

        async fn watch(&self) -> ConfigResult<Option<Box<dyn SourceWatcher>>> {
            tokio::time::sleep(self.delay).await;
            Ok(None)
        }
    }

    fn yaml_source(name: &str, body: &str) -> MemorySource {
        MemorySource::document(name, "yaml", body)
    }

    #[test]
    fn test_state_display_and_loaded() {
        assert_eq!(LoaderState::Reloading.to_string(), "reloading");
        assert!(LoaderState::Failed.is_loaded());
        assert!(!LoaderState::Loading.is_loaded());
    }

    #[tokio::test]
    async fn test_value_before_load_is_not_loaded() {
        let config = Config::builder().build().unwrap();
        assert!(matches!(config.value("a"), Err(ConfigError::NotLoaded)));
        assert!(matches!(config.reload().await, Err(ConfigError::NotLoaded)));
        assert_eq!(config.state(), LoaderState::Unloaded);
    }

    #[tokio::test]
    async fn test_load_twice_is_rejected() {
        let config = Config::builder()
            .with_source(yaml_source("a", "a: 1\n"))
            .build()
            .unwrap();
        config.load().await.unwrap();
        assert!(matches!(config.load().await, Err(ConfigError::AlreadyLoaded)));
        assert_eq!(config.version(), Some(1));
    }

    #[tokio::test]
    async fn test_failed_initial_load_returns_to_unloaded() {
        let config = Config::builder()
            .with_source(yaml_source("bad", "a: [1, 2\n"))
            .build()
            .unwrap();

        let error = config.load().await.unwrap_err();
        assert!(matches!(error, ConfigError::DecodeError { .. }));
        assert_eq!(config.state(), LoaderState::Unloaded);
    }

    #[tokio::test]
    async fn test_snapshot_root_value() {
        let config = Config::builder()
            .with_source(yaml_source("a", "a: 1\n"))
            .with_variables(StaticVariables::new())
            .build()
            .unwrap();
        config.load().await.unwrap();

        let root = config.value("").unwrap();
        assert_eq!(root.raw(), &json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_reload_without_changes_keeps_version() {
        let config = Config::builder()
            .with_source(yaml_source("a", "a: 1\n"))
            .build()
            .unwrap();
        config.load().await.unwrap();

        assert_eq!(config.reload().await.unwrap(), 1);
        assert_eq!(config.state(), LoaderState::Ready);
    }

    #[tokio::test]
    async fn test_close_stops_reloads_but_keeps_snapshot() {
        let config = Config::builder()
            .with_source(yaml_source("a", "a: 1\n"))
            .build()
            .unwrap();
        config.load().await.unwrap();
        config.close();

        assert!(config.is_closed());
        assert!(matches!(config.reload().await, Err(ConfigError::Closed)));
        assert_eq!(config.value("a").unwrap().as_i64().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reload_while_watchers_start_is_not_loaded() {
        let config = Config::builder()
            .with_source(SlowWatchSource {
                delay: Duration::from_millis(300),
            })
            .build()
            .unwrap();

        let loading = {
            let config = config.clone();
            tokio::spawn(async move { config.load().await })
        };
        while config.version().is_none() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(config.state(), LoaderState::Loading);
        assert!(matches!(config.reload().await, Err(ConfigError::NotLoaded)));

        loading.await.unwrap().unwrap();
        assert_eq!(config.state(), LoaderState::Ready);
        assert_eq!(config.reload().await.unwrap(), 1);
    }
}
