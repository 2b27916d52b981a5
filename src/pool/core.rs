//! # ExecPool: bounded-concurrency admission control.
//!
//! Each pool runs at most `max_concurrent` jobs. A job that arrives while the
//! pool is full (or while others are already waiting) joins a FIFO queue and
//! its caller suspends until a slot is handed over.
//!
//! ```text
//! submit(job) ──► active < cap && queue empty ──► run now
//!        │
//!        └──────► queue.push_back(waiter) ──► wait ──► admitted ──► run
//!                                              │
//!                                              └─ cancel fired while queued ──► Outcome::Cancelled
//!
//! job done ──► slot released ──► queue.pop_front() ──► sleep(admission_delay) ──► hand over slot
//!                                       └─ empty ──► active -= 1
//! ```
//!
//! ## Rules
//! - `active <= capacity` at all times; a handed-over slot stays counted as active.
//! - Waiters are admitted strictly in arrival order.
//! - A waiter leaves the queue only when admitted or withdrawn by its own cancellation.
//! - An admitted job is never aborted by the pool; cancellation after admission is ignored.
//! - A submit future dropped while queued withdraws itself (or passes on a slot it already got).

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::events::{Bus, Event, EventKind};

use super::{config::PoolConfig, outcome::Outcome};

/// Point-in-time view of a pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolStats {
    /// Configured capacity.
    pub capacity: usize,
    /// Jobs currently holding a slot.
    pub active: usize,
    /// Jobs waiting for a slot.
    pub queued: usize,
}

struct Waiter {
    id: u64,
    tx: oneshot::Sender<()>,
}

struct PoolState {
    active: usize,
    queue: VecDeque<Waiter>,
    next_id: u64,
}

struct Inner {
    key: Arc<str>,
    config: PoolConfig,
    state: Mutex<PoolState>,
    bus: Bus,
}

/// Bounded-concurrency pool with a FIFO admission queue.
///
/// Cheap to clone; clones share the same slots and queue.
#[derive(Clone)]
pub struct ExecPool {
    inner: Arc<Inner>,
}

impl ExecPool {
    /// Creates a pool identified by `key`.
    pub fn new(key: impl Into<Arc<str>>, config: PoolConfig, bus: Bus) -> Self {
        Self {
            inner: Arc::new(Inner {
                key: key.into(),
                config,
                state: Mutex::new(PoolState {
                    active: 0,
                    queue: VecDeque::new(),
                    next_id: 0,
                }),
                bus,
            }),
        }
    }

    /// Pool key.
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Pool configuration.
    pub fn config(&self) -> PoolConfig {
        self.inner.config
    }

    /// Current counters.
    pub fn stats(&self) -> PoolStats {
        let st = self.inner.state.lock();
        PoolStats {
            capacity: self.inner.config.capacity(),
            active: st.active,
            queued: st.queue.len(),
        }
    }

    /// Runs `job` under the pool's concurrency cap.
    ///
    /// Returns [`Outcome::Cancelled`] without calling `job` if `cancel` fires
    /// before the job is admitted. Once admitted the job runs to completion.
    pub async fn submit<T, F, Fut>(&self, cancel: &CancellationToken, job: F) -> Outcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let Some(_slot) = self.acquire(cancel).await else {
            return Outcome::Cancelled;
        };
        Outcome::Done(job().await)
    }

    async fn acquire(&self, cancel: &CancellationToken) -> Option<Slot> {
        if cancel.is_cancelled() {
            self.publish(Event::new(EventKind::JobCancelled));
            return None;
        }

        let (mut ticket, queued) = {
            let mut st = self.inner.state.lock();
            if st.active < self.inner.config.capacity() && st.queue.is_empty() {
                st.active += 1;
                return Some(Slot {
                    inner: Arc::clone(&self.inner),
                });
            }
            let id = st.next_id;
            st.next_id += 1;
            let (tx, rx) = oneshot::channel();
            st.queue.push_back(Waiter { id, tx });
            let ticket = Ticket {
                inner: Arc::clone(&self.inner),
                id,
                rx,
                settled: false,
            };
            (ticket, st.queue.len())
        };
        self.publish(Event::new(EventKind::JobQueued).with_queued(queued));
        let queued_at = Instant::now();

        let wake = tokio::select! {
            biased;
            res = &mut ticket.rx => Wake::Admitted(res.is_ok()),
            _ = cancel.cancelled() => Wake::Cancelled,
        };

        let admitted = match wake {
            Wake::Admitted(ok) => ok,
            Wake::Cancelled => {
                if !ticket.withdraw() {
                    // Popped by a pending hand-over: refuse the slot and pass it on.
                    ticket.rx.close();
                    if ticket.rx.try_recv().is_ok() {
                        self.inner.release();
                    }
                    ticket.settled = true;
                }
                self.publish(Event::new(EventKind::JobCancelled));
                return None;
            }
        };
        ticket.settled = true;

        if !admitted {
            return None;
        }
        self.publish(Event::new(EventKind::JobAdmitted).with_delay(queued_at.elapsed()));
        Some(Slot {
            inner: Arc::clone(&self.inner),
        })
    }

    fn publish(&self, ev: Event) {
        self.inner.bus.publish(ev.with_subject(Arc::clone(&self.inner.key)));
    }
}

enum Wake {
    Admitted(bool),
    Cancelled,
}

impl Inner {
    /// Frees one slot: hands it to the oldest live waiter or decrements `active`.
    fn release(self: &Arc<Self>) {
        let next = {
            let mut st = self.state.lock();
            loop {
                match st.queue.pop_front() {
                    Some(w) if w.tx.is_closed() => continue,
                    Some(w) => break Some(w),
                    None => {
                        st.active = st.active.saturating_sub(1);
                        break None;
                    }
                }
            }
        };
        if let Some(waiter) = next {
            self.hand_over(waiter, self.config.admission_delay);
        }
    }

    fn hand_over(self: &Arc<Self>, waiter: Waiter, delay: Duration) {
        if delay.is_zero() {
            self.deliver(waiter);
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let me = Arc::clone(self);
                handle.spawn(async move {
                    time::sleep(delay).await;
                    me.deliver(waiter);
                });
            }
            Err(_) => self.deliver(waiter),
        }
    }

    fn deliver(self: &Arc<Self>, waiter: Waiter) {
        if waiter.tx.send(()).is_err() {
            // Waiter went away between pop and send; pass the slot on.
            self.release();
        }
    }
}

/// Position in the queue; withdraws itself if dropped before admission.
struct Ticket {
    inner: Arc<Inner>,
    id: u64,
    rx: oneshot::Receiver<()>,
    settled: bool,
}

impl Ticket {
    /// Removes the waiter from the queue; false if it was already popped.
    fn withdraw(&mut self) -> bool {
        let mut st = self.inner.state.lock();
        match st.queue.iter().position(|w| w.id == self.id) {
            Some(pos) => {
                st.queue.remove(pos);
                self.settled = true;
                true
            }
            None => false,
        }
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        if self.settled || self.withdraw() {
            return;
        }
        self.rx.close();
        if self.rx.try_recv().is_ok() {
            self.inner.release();
        }
    }
}

/// Held while a job runs; frees the slot on drop.
struct Slot {
    inner: Arc<Inner>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.inner.release();
    }
}
