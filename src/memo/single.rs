use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

use crate::error::BridgeError;

type SharedResult<V> = Shared<BoxFuture<'static, Result<V, BridgeError>>>;

struct Flight<V> {
    id: u64,
    fut: SharedResult<V>,
}

/// At most one in-flight computation; concurrent callers share its result.
///
/// The slot is emptied once the computation resolves (success or failure), so
/// nothing is cached here. Callers that need the value afterwards keep it
/// themselves.
pub struct SingleFlight<V> {
    slot: Mutex<Option<Flight<V>>>,
    next_id: AtomicU64,
}

impl<V> Default for SingleFlight<V> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<V> SingleFlight<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates an idle instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins the in-flight computation, or starts `make()` if none is running.
    pub async fn run<F, Fut>(&self, make: F) -> Result<V, BridgeError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, BridgeError>> + Send + 'static,
    {
        let (id, fut) = {
            let mut slot = self.slot.lock();
            match &*slot {
                Some(flight) => (flight.id, flight.fut.clone()),
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let fut = make().boxed().shared();
                    *slot = Some(Flight {
                        id,
                        fut: fut.clone(),
                    });
                    (id, fut)
                }
            }
        };

        let res = fut.await;
        self.finish(id);
        res
    }

    /// True while a computation is in flight.
    pub fn is_pending(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Forgets the in-flight computation; the next caller starts a new one.
    pub fn clear(&self) {
        *self.slot.lock() = None;
    }

    fn finish(&self, id: u64) {
        let mut slot = self.slot.lock();
        if matches!(&*slot, Some(flight) if flight.id == id) {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_computation() {
        let flight = Arc::new(SingleFlight::<u32>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let flight = Arc::clone(&flight);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                flight
                    .run(move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(11)
                    })
                    .await
            }));
        }
        for h in handles {
            assert_eq!(h.await.unwrap().unwrap(), 11);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!flight.is_pending());
    }

    #[tokio::test]
    async fn test_failure_is_not_kept() {
        let flight = SingleFlight::<u32>::new();
        let err = flight
            .run(|| async { Err(BridgeError::status("login", 500, "")) })
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert_eq!(flight.run(|| async { Ok(3) }).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_clear_starts_fresh_flight() {
        let flight = Arc::new(SingleFlight::<u32>::new());
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let stuck = {
            let flight = Arc::clone(&flight);
            tokio::spawn(async move {
                flight
                    .run(|| async move {
                        let _ = rx.await;
                        Ok(1)
                    })
                    .await
            })
        };
        while !flight.is_pending() {
            tokio::task::yield_now().await;
        }

        flight.clear();
        assert_eq!(flight.run(|| async { Ok(2) }).await.unwrap(), 2);

        let _ = tx.send(());
        assert_eq!(stuck.await.unwrap().unwrap(), 1);
    }
}
