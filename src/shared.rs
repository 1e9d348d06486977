//! Thread-safe handle and the periodic sweeper.
//!
//! [`SharedMap`] serializes every operation behind one exclusive lock, since a
//! traversal may touch any part of the trie. When the map's policy is
//! `Periodically`, a background thread calls [`CompositeMap::cleanup`] on each
//! tick. That thread holds only a weak handle to the map, so it never keeps the
//! map alive; it exits once the last handle is dropped or when stopped.

use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, trace};

use crate::config::{CleanupPolicy, Config};
use crate::error::{Error, Result};
use crate::key::{IntoKeySeq, Key};
use crate::map::CompositeMap;

/// A [`CompositeMap`] behind a mutex, clonable across threads.
///
/// Reads return cloned values, since no reference can outlive the lock.
pub struct SharedMap<V> {
    inner: Arc<Mutex<CompositeMap<V>>>,
    sweeper: Option<Arc<Sweeper>>,
}

impl<V: Send + 'static> SharedMap<V> {
    /// Create a map from `config`, starting the sweeper for `Periodically`.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Self::from_map(CompositeMap::with_config(config))
    }

    /// Share an existing map, starting the sweeper if its policy needs one.
    pub fn from_map(map: CompositeMap<V>) -> Result<Self> {
        let config = map.config();
        config.validate()?;
        let inner = Arc::new(Mutex::new(map));
        let sweeper = match config.cleanup {
            CleanupPolicy::Periodically(interval) => {
                Some(Arc::new(Sweeper::spawn(Arc::downgrade(&inner), interval)?))
            }
            _ => None,
        };
        Ok(Self { inner, sweeper })
    }
}

impl<V> SharedMap<V> {
    /// Run `f` with the map locked.
    pub fn with<R>(&self, f: impl FnOnce(&CompositeMap<V>) -> R) -> R {
        f(&self.inner.lock())
    }

    /// Run `f` with the map locked for writing.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut CompositeMap<V>) -> R) -> R {
        f(&mut self.inner.lock())
    }

    pub fn insert(&self, keys: impl IntoKeySeq, value: V) -> Result<Option<V>> {
        self.inner.lock().insert(keys, value)
    }

    pub fn contains_key(&self, keys: impl IntoKeySeq) -> Result<bool> {
        self.inner.lock().contains_key(keys)
    }

    pub fn remove(&self, keys: impl IntoKeySeq) -> Result<Option<V>> {
        self.inner.lock().remove(keys)
    }

    /// Manual sweep. Returns the number of nodes detached.
    pub fn cleanup(&self) -> usize {
        self.inner.lock().cleanup()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.inner.lock().node_count()
    }

    /// Whether a periodic sweeper thread is still scheduled.
    pub fn is_sweeping(&self) -> bool {
        self.sweeper.as_ref().is_some_and(|s| !s.is_stopped())
    }

    /// Stop the periodic sweeper for every handle of this map.
    ///
    /// Blocks until the sweeper thread has exited. Manual [`cleanup`](Self::cleanup)
    /// keeps working. May be called while the map is locked (inside
    /// [`with_mut`](Self::with_mut)): the sweeper never blocks on the lock for
    /// longer than one interval before rechecking the stop flag.
    pub fn stop_sweeper(&self) {
        if let Some(sweeper) = &self.sweeper {
            sweeper.stop();
        }
    }
}

impl<V: Clone> SharedMap<V> {
    pub fn get(&self, keys: impl IntoKeySeq) -> Result<Option<V>> {
        Ok(self.inner.lock().get(keys)?.cloned())
    }

    /// Cached value under `keys`, computing it first if absent.
    ///
    /// `f` runs without the lock held, so it may call back into this map
    /// (recursive memoization). Threads racing on the same missing key may
    /// each run `f`; the first value stored wins and every caller gets it.
    pub fn get_or_insert_with(&self, keys: impl IntoKeySeq, f: impl FnOnce() -> V) -> Result<V> {
        let keys = keys.into_key_seq();
        if let Some(value) = self.inner.lock().get(keys.clone())? {
            return Ok(value.clone());
        }
        let value = f();
        Ok(self
            .inner
            .lock()
            .get_or_insert_with(keys, || value)?
            .clone())
    }

    /// Snapshot of every entry. Order carries no meaning.
    pub fn entries(&self) -> Vec<(Vec<Key>, V)> {
        self.inner
            .lock()
            .iter()
            .map(|(k, v)| (k, v.clone()))
            .collect()
    }

    pub fn keys(&self) -> Vec<Vec<Key>> {
        self.inner.lock().keys().collect()
    }

    pub fn values(&self) -> Vec<V> {
        self.inner.lock().values().cloned().collect()
    }
}

impl<V> Clone for SharedMap<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            sweeper: self.sweeper.clone(),
        }
    }
}

// =============================================================================
// Sweeper
// =============================================================================

#[derive(Default)]
struct SweepSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

/// Background thread sweeping a map on a fixed interval.
struct Sweeper {
    signal: Arc<SweepSignal>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Sweeper {
    fn spawn<V: Send + 'static>(
        map: Weak<Mutex<CompositeMap<V>>>,
        interval: Duration,
    ) -> Result<Self> {
        let signal = Arc::new(SweepSignal::default());
        let thread_signal = Arc::clone(&signal);
        let handle = thread::Builder::new()
            .name("composite-map-sweeper".into())
            .spawn(move || run_sweeper(map, interval, &thread_signal))
            .map_err(|e| Error::SweeperSpawn(e.to_string()))?;
        info!(interval_ms = interval.as_millis() as u64, "started periodic sweeper");
        Ok(Self {
            signal,
            handle: Mutex::new(Some(handle)),
        })
    }

    fn is_stopped(&self) -> bool {
        *self.signal.stopped.lock()
    }

    fn stop(&self) {
        {
            let mut stopped = self.signal.stopped.lock();
            *stopped = true;
            self.signal.wake.notify_all();
        }
        let Some(handle) = self.handle.lock().take() else {
            return;
        };
        // Joining ourselves would deadlock; the loop exits on its own.
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            debug!("sweeper thread panicked");
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_sweeper<V>(map: Weak<Mutex<CompositeMap<V>>>, interval: Duration, signal: &SweepSignal) {
    loop {
        {
            let mut stopped = signal.stopped.lock();
            if !*stopped {
                signal.wake.wait_for(&mut stopped, interval);
            }
            if *stopped {
                break;
            }
        }

        let Some(map) = map.upgrade() else {
            break;
        };
        // A bounded wait, so a holder of the lock can stop and join us.
        let Some(mut guard) = map.try_lock_for(interval) else {
            trace!("map busy, skipping periodic sweep");
            continue;
        };
        let removed = guard.cleanup();
        trace!(removed, "periodic sweep");
    }
    debug!("periodic sweeper exited");
}
