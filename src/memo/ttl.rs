//! # Per-key memoization with expiry.
//!
//! [`TtlMemo`] coalesces duplicate calls for the same key:
//!
//! ```text
//! get_or_compute(key)
//!   ├─ Ready, not expired ──► clone value, compute not called
//!   ├─ Pending            ──► join the shared future
//!   └─ missing / expired  ──► insert Pending(compute()) ──► await
//!                                 ├─ Ok  ──► Ready{value, now + ttl}
//!                                 └─ Err ──► entry removed (failures are never cached)
//! ```
//!
//! `clear(key)` drops the entry whatever its state. A pending computation that
//! was cleared still resolves for the callers already awaiting it, but its
//! result is not stored.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::error::BridgeError;
use crate::events::{Bus, Event, EventKind};

type SharedResult<V> = Shared<BoxFuture<'static, Result<V, BridgeError>>>;

enum Entry<V> {
    Pending { id: u64, fut: SharedResult<V> },
    Ready { value: V, expires_at: Instant },
}

/// Cache of async results keyed by `K`, each kept for `ttl` after it resolved.
pub struct TtlMemo<K, V> {
    name: Arc<str>,
    ttl: Duration,
    entries: Mutex<HashMap<K, Entry<V>>>,
    next_id: AtomicU64,
    bus: Bus,
}

impl<K, V> TtlMemo<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Clone + Send + Sync + 'static,
{
    /// Creates an empty memo; `name` tags its events.
    pub fn new(name: impl Into<Arc<str>>, ttl: Duration, bus: Bus) -> Self {
        Self {
            name: name.into(),
            ttl,
            entries: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            bus,
        }
    }

    /// Time a resolved value stays live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached value for `key`, joins its pending computation, or
    /// starts `compute()`.
    pub async fn get_or_compute<F, Fut>(&self, key: K, compute: F) -> Result<V, BridgeError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, BridgeError>> + Send + 'static,
    {
        let (id, fut) = {
            let mut entries = self.entries.lock();
            match entries.get(&key) {
                Some(Entry::Ready { value, expires_at }) if Instant::now() < *expires_at => {
                    return Ok(value.clone());
                }
                Some(Entry::Pending { id, fut }) => (*id, fut.clone()),
                _ => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let fut = compute().boxed().shared();
                    entries.insert(
                        key.clone(),
                        Entry::Pending {
                            id,
                            fut: fut.clone(),
                        },
                    );
                    (id, fut)
                }
            }
        };

        let res = fut.await;
        self.settle(&key, id, &res);
        res
    }

    /// Forcibly evicts `key`. Returns true if an entry was present.
    pub fn clear(&self, key: &K) -> bool {
        let removed = self.entries.lock().remove(key).is_some();
        if removed {
            self.bus.publish(
                Event::new(EventKind::CacheEvicted)
                    .with_subject(Arc::clone(&self.name))
                    .with_reason(format!("{key:?}")),
            );
        }
        removed
    }

    /// True if `key` has a pending computation.
    pub fn is_pending(&self, key: &K) -> bool {
        matches!(self.entries.lock().get(key), Some(Entry::Pending { .. }))
    }

    /// Number of entries, live or expired.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True if no entry is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Replaces the pending entry `id` with its result. No-op if the entry was
    /// cleared or already settled by another waiter.
    fn settle(&self, key: &K, id: u64, res: &Result<V, BridgeError>) {
        let mut entries = self.entries.lock();
        let current = matches!(
            entries.get(key),
            Some(Entry::Pending { id: cur, .. }) if *cur == id
        );
        if !current {
            return;
        }
        match res {
            Ok(value) => {
                entries.insert(
                    key.clone(),
                    Entry::Ready {
                        value: value.clone(),
                        expires_at: Instant::now() + self.ttl,
                    },
                );
            }
            Err(_) => {
                entries.remove(key);
            }
        }
    }
}
