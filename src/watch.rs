//! # Watch Registry
//!
//! Path-scoped change notification. After every published reload the registry
//! compares the value at each watched path between the previous and the new tree
//! and notifies the registrations whose value changed. An absent value counts as
//! a value, so a key appearing or disappearing is a change.
//!
//! Two delivery forms share the registry:
//!
//! - callbacks registered with [`Config::watch`](crate::Config::watch), invoked
//!   synchronously on the reload worker
//! - channel subscriptions from [`Config::subscribe`](crate::Config::subscribe),
//!   delivered through an unbounded tokio channel
//!
//! Cancellation is synchronous: once [`WatchRegistry::cancel`] returns, the
//! registration never fires again. A cancel racing with a dispatch on another
//! thread waits for the running callback. A callback may cancel its own token.

use crate::path::KeyPath;
use crate::value::Tree;
use dashmap::DashMap;
use parking_lot::ReentrantMutex;
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Watch callback invoked with every change of the watched value
pub type WatchCallback = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// A change of the value at a watched path
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Watched path as registered
    pub path: String,
    /// Value before the reload; `None` when the path did not exist
    pub previous: Option<Value>,
    /// Value after the reload; `None` when the path no longer exists
    pub current: Option<Value>,
    /// Version of the snapshot that produced the change
    pub version: u64,
}

impl ChangeEvent {
    pub fn is_removal(&self) -> bool {
        self.current.is_none()
    }
}

/// Handle identifying one watch registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchToken(u64);

impl WatchToken {
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WatchToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "watch-{}", self.0)
    }
}

#[derive(Clone)]
enum Sink {
    Callback(WatchCallback),
    Channel(mpsc::UnboundedSender<ChangeEvent>),
}

struct Registration {
    path: KeyPath,
    display_path: String,
    /// `None` once cancelled. Held for the duration of every delivery.
    slot: ReentrantMutex<RefCell<Option<Sink>>>,
}

impl Registration {
    fn new(path: &str, sink: Sink) -> Self {
        Self {
            path: KeyPath::parse(path),
            display_path: path.to_string(),
            slot: ReentrantMutex::new(RefCell::new(Some(sink))),
        }
    }

    fn clear(&self) {
        let guard = self.slot.lock();
        guard.borrow_mut().take();
    }
}

/// Registry of active watches
#[derive(Default)]
pub struct WatchRegistry {
    next_id: AtomicU64,
    registrations: DashMap<u64, Arc<Registration>>,
}

impl fmt::Debug for WatchRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchRegistry")
            .field("registrations", &self.registrations.len())
            .finish()
    }
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for changes at `path`
    pub fn register<F>(&self, path: &str, callback: F) -> WatchToken
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.insert(Registration::new(path, Sink::Callback(Arc::new(callback))))
    }

    /// Register a channel subscription for changes at `path`
    pub fn subscribe(self: &Arc<Self>, path: &str) -> WatchSubscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let token = self.insert(Registration::new(path, Sink::Channel(sender)));
        WatchSubscription {
            token,
            registry: Arc::clone(self),
            receiver,
        }
    }

    fn insert(&self, registration: Registration) -> WatchToken {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(token = id, path = %registration.display_path, "Registered watch");
        self.registrations.insert(id, Arc::new(registration));
        WatchToken(id)
    }

    /// Cancel a registration; returns whether it was still active
    pub fn cancel(&self, token: WatchToken) -> bool {
        match self.registrations.remove(&token.0) {
            Some((_, registration)) => {
                registration.clear();
                debug!(token = token.0, path = %registration.display_path, "Cancelled watch");
                true
            }
            None => false,
        }
    }

    /// Drop every registration; subscriptions observe end of stream
    pub fn clear(&self) {
        let ids: Vec<u64> = self.registrations.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Some((_, registration)) = self.registrations.remove(&id) {
                registration.clear();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Notify every registration whose watched value differs between the trees.
    ///
    /// Returns the number of deliveries made.
    pub fn dispatch(&self, previous: Option<&Tree>, current: &Tree, version: u64) -> usize {
        // Snapshot the registrations so callbacks can register or cancel freely
        let mut registrations: Vec<(u64, Arc<Registration>)> = self
            .registrations
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();
        registrations.sort_by_key(|(id, _)| *id);

        let mut delivered = 0;
        for (id, registration) in registrations {
            let before = previous.and_then(|tree| value_at(&registration.path, tree));
            let after = value_at(&registration.path, current);
            if before == after {
                continue;
            }

            let event = ChangeEvent {
                path: registration.display_path.clone(),
                previous: before,
                current: after,
                version,
            };

            let guard = registration.slot.lock();
            let sink = guard.borrow().clone();
            match sink {
                None => {}
                Some(Sink::Callback(callback)) => {
                    delivered += 1;
                    if catch_unwind(AssertUnwindSafe(|| callback(&event))).is_err() {
                        warn!(
                            token = id,
                            path = %registration.display_path,
                            version = version,
                            "Watch callback panicked; registration stays active"
                        );
                    }
                }
                Some(Sink::Channel(sender)) => {
                    if sender.send(event).is_ok() {
                        delivered += 1;
                    } else {
                        guard.borrow_mut().take();
                        drop(guard);
                        self.registrations.remove(&id);
                        debug!(token = id, "Removed watch subscription with closed receiver");
                    }
                }
            }
        }
        delivered
    }
}

fn value_at(path: &KeyPath, tree: &Tree) -> Option<Value> {
    if path.is_root() {
        return Some(Value::Object(tree.clone()));
    }
    path.lookup(tree).cloned()
}

/// Channel form of a watch; dropping it cancels the registration
#[derive(Debug)]
pub struct WatchSubscription {
    token: WatchToken,
    registry: Arc<WatchRegistry>,
    receiver: mpsc::UnboundedReceiver<ChangeEvent>,
}

impl WatchSubscription {
    pub fn token(&self) -> WatchToken {
        self.token
    }

    /// Next change; `None` once the subscription or its loader is closed
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.receiver.recv().await
    }

    /// Next change if one is already queued
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        self.receiver.try_recv().ok()
    }

    /// Cancel explicitly; equivalent to dropping
    pub fn cancel(self) {}
}

impl Drop for WatchSubscription {
    fn drop(&mut self) {
        self.registry.cancel(self.token);
    }
}
