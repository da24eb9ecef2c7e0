//! Reference-counted pool of external worker processes.
//!
//! Entries are keyed by a resource key (a file path, optionally suffixed
//! with a purpose such as `":thumb"`). Acquiring an existing key reuses its
//! process; releasing the last user schedules an idle eviction that any
//! later acquisition cancels.
//!
//! Entry lifecycle:
//!
//! ```text
//!   (none) --acquire--> Starting --spawned--> Running
//!   Running --release to zero--> Draining
//!   Draining --acquire--> Running
//!   Running | Draining --evict / terminate / exit--> Terminated (removed)
//! ```
//!
//! All state lives behind one mutex whose critical sections never await, so
//! check-then-mutate sequences cannot interleave with other requests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::handle::{spawn_supervised, ProcessExit, ProcessHandle, SpawnSpec};
use crate::error::Result;

/// Default idle grace period before an unused process is killed.
pub const DEFAULT_IDLE_GRACE: Duration = Duration::from_millis(5000);

/// Lifecycle state of a pooled entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Starting,
    Running,
    Draining,
    Terminated,
}

struct PoolEntry {
    handle: ProcessHandle,
    usage: usize,
    state: EntryState,
    /// Bumped whenever a scheduled eviction becomes stale.
    epoch: u64,
    eviction: Option<JoinHandle<()>>,
}

impl PoolEntry {
    /// The single place a pooled process is killed.
    fn terminate(&mut self) {
        self.state = EntryState::Terminated;
        if let Some(timer) = self.eviction.take() {
            timer.abort();
        }
        self.handle.kill();
    }
}

#[derive(Default)]
struct PoolState {
    entries: HashMap<String, PoolEntry>,
    /// Connection-bound processes the pool tracks but never shares.
    unpooled: HashMap<u64, ProcessHandle>,
}

struct PoolInner {
    state: Mutex<PoolState>,
    next_id: AtomicU64,
    idle_grace: Duration,
}

/// Pool of supervised external processes.
///
/// Cheap to clone; clones share the same pool.
#[derive(Clone)]
pub struct ProcessPool {
    inner: Arc<PoolInner>,
}

impl Default for ProcessPool {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_GRACE)
    }
}

impl ProcessPool {
    /// Create an empty pool whose [`release`](Self::release) uses `idle_grace`.
    pub fn new(idle_grace: Duration) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                state: Mutex::new(PoolState::default()),
                next_id: AtomicU64::new(1),
                idle_grace,
            }),
        }
    }

    /// Configured default idle grace period.
    pub fn idle_grace(&self) -> Duration {
        self.inner.idle_grace
    }

    /// Acquire the process for `key`, spawning it from `spec` if none is live.
    ///
    /// The spec of the first acquisition wins; later acquisitions of a live
    /// entry ignore theirs. Acquiring a draining entry cancels its eviction.
    ///
    /// # Errors
    ///
    /// Returns a spawn failure if the process could not be started. Spawns
    /// are never retried.
    pub fn acquire(&self, key: &str, spec: &SpawnSpec) -> Result<ProcessHandle> {
        let mut state = self.inner.state.lock();

        if let Some(entry) = state.entries.get_mut(key) {
            if !entry.handle.has_exited() {
                entry.usage += 1;
                if entry.state == EntryState::Draining {
                    entry.state = EntryState::Running;
                    entry.epoch += 1;
                    if let Some(timer) = entry.eviction.take() {
                        timer.abort();
                    }
                    tracing::debug!(key, "pending eviction cancelled");
                }
                tracing::debug!(key, usage = entry.usage, "reusing pooled process");
                return Ok(entry.handle.clone());
            }
            // Exited but the exit observer has not run yet.
            state.entries.remove(key);
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let observer = self.exit_observer(Some(key.to_string()));
        let handle = spawn_supervised(id, key, spec, observer)?;

        let mut entry = PoolEntry {
            handle: handle.clone(),
            usage: 1,
            state: EntryState::Starting,
            epoch: 0,
            eviction: None,
        };
        entry.state = EntryState::Running;
        state.entries.insert(key.to_string(), entry);

        tracing::info!(key, id, pid = handle.pid(), "pooled process started");
        Ok(handle)
    }

    /// Release one usage of `key`, scheduling eviction after the default grace.
    pub fn release(&self, key: &str) {
        self.release_after(key, self.inner.idle_grace);
    }

    /// Release one usage of `key`, scheduling eviction after `grace` once
    /// the usage count reaches zero. Unknown keys are ignored.
    pub fn release_after(&self, key: &str, grace: Duration) {
        let mut state = self.inner.state.lock();
        let Some(entry) = state.entries.get_mut(key) else {
            tracing::trace!(key, "release of unknown key ignored");
            return;
        };

        entry.usage = entry.usage.saturating_sub(1);
        if entry.usage > 0 || entry.state != EntryState::Running {
            return;
        }

        entry.state = EntryState::Draining;
        entry.epoch += 1;
        let epoch = entry.epoch;
        let id = entry.handle.id();
        let pool = Arc::downgrade(&self.inner);
        let owned_key = key.to_string();

        entry.eviction = Some(tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            evict_if_idle(&pool, &owned_key, id, epoch);
        }));

        tracing::debug!(key, grace_ms = grace.as_millis() as u64, "pooled process idle, eviction scheduled");
    }

    /// Spawn a process the pool tracks for shutdown but never shares.
    pub fn spawn_unpooled(&self, label: &str, spec: &SpawnSpec) -> Result<ProcessHandle> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let observer = self.exit_observer(None);

        let mut state = self.inner.state.lock();
        let handle = spawn_supervised(id, label, spec, observer)?;
        state.unpooled.insert(id, handle.clone());
        Ok(handle)
    }

    /// Terminate a process this pool spawned, pooled or not.
    ///
    /// Handles the pool no longer tracks (already exited) are left alone.
    pub fn terminate(&self, handle: &ProcessHandle) {
        let mut state = self.inner.state.lock();

        if let Some(tracked) = state.unpooled.remove(&handle.id()) {
            tracked.kill();
            return;
        }

        let key = state
            .entries
            .iter()
            .find(|(_, entry)| entry.handle.id() == handle.id())
            .map(|(key, _)| key.clone());
        if let Some(mut entry) = key.and_then(|k| state.entries.remove(&k)) {
            entry.terminate();
        }
    }

    /// Force-kill every tracked process and clear the pool.
    ///
    /// Returns the handles that were killed so callers may await their exit.
    pub fn terminate_all(&self) -> Vec<ProcessHandle> {
        let mut state = self.inner.state.lock();
        let mut killed = Vec::with_capacity(state.entries.len() + state.unpooled.len());

        for (_, mut entry) in state.entries.drain() {
            entry.terminate();
            killed.push(entry.handle);
        }
        for (_, handle) in state.unpooled.drain() {
            handle.kill();
            killed.push(handle);
        }

        if !killed.is_empty() {
            tracing::info!(count = killed.len(), "terminated all pooled processes");
        }
        killed
    }

    /// Kill everything and wait (bounded) for the processes to exit.
    pub async fn shutdown(&self, timeout: Duration) {
        let handles = self.terminate_all();
        let all = futures::future::join_all(handles.iter().map(|h| h.wait()));
        if tokio::time::timeout(timeout, all).await.is_err() {
            tracing::warn!("timed out waiting for processes to exit");
        }
    }

    /// Number of pooled entries (unpooled processes excluded).
    pub fn len(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of unpooled processes still tracked.
    pub fn unpooled_len(&self) -> usize {
        self.inner.state.lock().unpooled.len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.state.lock().entries.contains_key(key)
    }

    /// Current state of the entry for `key`.
    pub fn state(&self, key: &str) -> Option<EntryState> {
        self.inner.state.lock().entries.get(key).map(|e| e.state)
    }

    /// Current usage count of the entry for `key`.
    pub fn usage(&self, key: &str) -> Option<usize> {
        self.inner.state.lock().entries.get(key).map(|e| e.usage)
    }

    /// Build the observer that drops the bookkeeping for an exited process.
    fn exit_observer(&self, key: Option<String>) -> impl FnOnce(u64, ProcessExit) + Send + 'static {
        let pool = Arc::downgrade(&self.inner);
        move |id, exit| {
            let Some(inner) = pool.upgrade() else {
                return;
            };
            let mut state = inner.state.lock();
            match key {
                Some(key) => {
                    let same = state.entries.get(&key).is_some_and(|e| e.handle.id() == id);
                    if same {
                        if let Some(mut entry) = state.entries.remove(&key) {
                            entry.state = EntryState::Terminated;
                            if let Some(timer) = entry.eviction.take() {
                                timer.abort();
                            }
                        }
                        tracing::debug!(key = %key, code = ?exit.code, killed = exit.killed, "pooled process exited, entry removed");
                    }
                }
                None => {
                    state.unpooled.remove(&id);
                }
            }
        }
    }
}

/// Eviction timer body: kill the entry only if it is still the same process,
/// still draining, and no acquisition has happened since scheduling.
fn evict_if_idle(pool: &Weak<PoolInner>, key: &str, id: u64, epoch: u64) {
    let Some(inner) = pool.upgrade() else {
        return;
    };
    let mut state = inner.state.lock();

    let idle = state.entries.get(key).is_some_and(|e| {
        e.handle.id() == id && e.state == EntryState::Draining && e.epoch == epoch
    });
    if !idle {
        return;
    }

    if let Some(mut entry) = state.entries.remove(key) {
        // The timer is this task; dropping the JoinHandle detaches it.
        entry.eviction = None;
        entry.terminate();
        tracing::info!(key, id, "idle pooled process evicted");
    }
}
