//! Shared filesystem monitor that routes change notifications to tailers.

use crate::cursor::Cursor;
use crate::error::StoreError;
use crate::tailer::{LogTail, TailProgress, Tailer};
use crate::traits::Record;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Identifier of one tailer subscription.
pub type SubscriptionId = u64;

#[derive(Clone)]
struct Subscription {
    id: SubscriptionId,
    tail: Arc<dyn LogTail>,
}

struct Monitor {
    watcher: RecommendedWatcher,
    watched_dirs: HashSet<PathBuf>,
}

struct Shared {
    subscriptions: Mutex<HashMap<PathBuf, Vec<Subscription>>>,
    monitor: Mutex<Option<Monitor>>,
    next_id: AtomicU64,
}

impl Shared {
    fn dispatch(&self, path: &Path) -> usize {
        // Tailers run outside the map lock so a callback may unsubscribe
        let targets = match self.subscriptions.lock().get(path) {
            Some(subs) => subs.clone(),
            None => return 0,
        };
        for sub in &targets {
            if sub.tail.on_change() == TailProgress::Finished {
                self.unsubscribe(sub.id);
            }
        }
        targets.len()
    }

    /// Stops watching directories no subscription points into any more.
    ///
    /// Only called off the monitor's own thread, since unwatching waits on it.
    fn prune_idle_dirs(&self, monitor: &mut Monitor) {
        let subscriptions = self.subscriptions.lock();
        let idle: Vec<PathBuf> = monitor
            .watched_dirs
            .iter()
            .filter(|dir| {
                !subscriptions
                    .keys()
                    .any(|path| path.parent() == Some(dir.as_path()))
            })
            .cloned()
            .collect();
        drop(subscriptions);

        for dir in idle {
            if let Err(e) = monitor.watcher.unwatch(&dir) {
                debug!(dir = %dir.display(), error = %e, "unwatch failed");
            }
            monitor.watched_dirs.remove(&dir);
            debug!(dir = %dir.display(), "stopped watching directory");
        }
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.lock();
        let mut removed = None;
        subscriptions.retain(|_, subs| {
            if let Some(pos) = subs.iter().position(|sub| sub.id == id) {
                removed = Some(subs.remove(pos));
            }
            !subs.is_empty()
        });
        drop(subscriptions);

        match removed {
            Some(sub) => {
                sub.tail.stop();
                debug!(id, path = %sub.tail.path().display(), "unsubscribed tailer");
                true
            }
            None => false,
        }
    }
}

/// Process-wide filesystem monitor shared by all tailers.
///
/// Subscriptions are keyed by the exact path of the log file they follow.
/// Every create or modify notification is routed to the tailers of that one
/// path; notifications for anything else are ignored. Clones share the same
/// monitor and subscriptions.
///
/// A service built with [`WatchService::new`] has no OS monitor attached and
/// only reacts to [`WatchService::dispatch`]; [`WatchService::start`] attaches
/// one. [`WatchService::stop`] detaches it and stops every tailer.
#[derive(Clone)]
pub struct WatchService {
    shared: Arc<Shared>,
}

impl WatchService {
    /// Creates a service with no OS monitor attached.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                subscriptions: Mutex::new(HashMap::new()),
                monitor: Mutex::new(None),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Creates a service backed by the platform's filesystem monitor.
    pub fn start() -> Result<Self, StoreError> {
        let service = Self::new();
        let shared: Weak<Shared> = Arc::downgrade(&service.shared);
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let Some(shared) = shared.upgrade() else {
                return;
            };
            match res {
                Ok(event) => {
                    if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                        for path in &event.paths {
                            shared.dispatch(path);
                        }
                    }
                }
                Err(e) => warn!(error = %e, "filesystem monitor error"),
            }
        })?;

        *service.shared.monitor.lock() = Some(Monitor {
            watcher,
            watched_dirs: HashSet::new(),
        });
        info!("watch service started");
        Ok(service)
    }

    /// Whether an OS monitor is attached.
    pub fn is_running(&self) -> bool {
        self.shared.monitor.lock().is_some()
    }

    /// Registers `tailer` and delivers whatever its run already holds.
    ///
    /// The parent directory of the tailer's path is watched (the file itself
    /// may not exist yet). The returned handle can stop the subscription;
    /// dropping it does not.
    pub fn subscribe<R: Record>(&self, tailer: Tailer<R>) -> Result<TailHandle, StoreError> {
        let tail: Arc<dyn LogTail> = Arc::new(tailer);
        let path = tail.path().to_path_buf();
        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);

        // The monitor lock is held until the subscription is in the map so
        // pruning never drops a directory that is about to gain a tailer
        let mut monitor = self.shared.monitor.lock();
        if let Some(monitor) = monitor.as_mut() {
            self.shared.prune_idle_dirs(monitor);
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            if !monitor.watched_dirs.contains(dir) {
                monitor.watcher.watch(dir, RecursiveMode::NonRecursive)?;
                monitor.watched_dirs.insert(dir.to_path_buf());
                debug!(dir = %dir.display(), "watching directory");
            }
        }
        self.shared
            .subscriptions
            .lock()
            .entry(path.clone())
            .or_default()
            .push(Subscription {
                id,
                tail: Arc::clone(&tail),
            });
        drop(monitor);
        debug!(id, path = %path.display(), "subscribed tailer");

        // Catch up on records written before the subscription existed
        if tail.on_change() == TailProgress::Finished {
            self.shared.unsubscribe(id);
        }

        Ok(TailHandle {
            id,
            service: self.clone(),
            tail,
        })
    }

    /// Routes a change notification for `path`.
    ///
    /// Returns how many tailers were notified; zero for unwatched paths.
    pub fn dispatch(&self, path: &Path) -> usize {
        self.shared.dispatch(path)
    }

    /// Removes a subscription and stops its tailer.
    ///
    /// Returns `false` (and does nothing) if it was already removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.unsubscribe(id)
    }

    /// Stops every tailer following a file directly inside `dir` and stops
    /// watching directories left without tailers.
    ///
    /// Must not be called from inside a tailer callback while an OS monitor
    /// is attached: the monitor's thread is the one running that callback.
    pub fn unsubscribe_dir(&self, dir: &Path) -> usize {
        let mut monitor = self.shared.monitor.lock();
        let mut stopped = Vec::new();
        self.shared.subscriptions.lock().retain(|path, subs| {
            if path.parent() == Some(dir) {
                stopped.append(subs);
                false
            } else {
                true
            }
        });
        if let Some(monitor) = monitor.as_mut() {
            self.shared.prune_idle_dirs(monitor);
        }
        drop(monitor);

        for sub in &stopped {
            sub.tail.stop();
        }
        if !stopped.is_empty() {
            info!(dir = %dir.display(), count = stopped.len(), "stopped tailers");
        }
        stopped.len()
    }

    /// Directories the OS monitor is currently watching.
    pub fn watched_dirs(&self) -> Vec<PathBuf> {
        self.shared
            .monitor
            .lock()
            .as_ref()
            .map(|monitor| monitor.watched_dirs.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.shared.subscriptions.lock().values().map(Vec::len).sum()
    }

    /// Detaches the OS monitor and stops every tailer.
    pub fn stop(&self) {
        let monitor = self.shared.monitor.lock().take();
        let drained: Vec<Subscription> = self
            .shared
            .subscriptions
            .lock()
            .drain()
            .flat_map(|(_, subs)| subs)
            .collect();
        for sub in &drained {
            sub.tail.stop();
        }
        // Released outside both locks
        drop(monitor);
        info!(stopped = drained.len(), "watch service stopped");
    }
}

impl Default for WatchService {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to one tailer subscription.
pub struct TailHandle {
    id: SubscriptionId,
    service: WatchService,
    tail: Arc<dyn LogTail>,
}

impl TailHandle {
    /// Subscription id within its watch service.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Path of the followed log file.
    pub fn path(&self) -> &Path {
        self.tail.path()
    }

    /// Ends the subscription. Safe to call any number of times.
    pub fn stop(&self) {
        self.service.unsubscribe(self.id);
        self.tail.stop();
    }

    /// Whether the tailer has stopped, on request or after a terminal status.
    pub fn is_stopped(&self) -> bool {
        self.tail.is_stopped()
    }

    /// Records the tailer has consumed so far.
    pub fn cursor(&self) -> Cursor {
        self.tail.cursor()
    }
}
