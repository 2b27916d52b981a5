//! # Bridge: the public face of the execution layer.
//!
//! Every operation follows the same path and always ends in a [`Reply`]:
//!
//! ```text
//! op(ctx, ..., cancel)
//!   └─► AuthGuard (token, re-auth on 401/403)
//!         └─► ExecPool::submit(cancel)      (pool per operation name, FIFO)
//!               └─► RetryPolicy             (fixed delay, retryable errors only)
//!                     └─► vendor / capture pipeline
//! ```
//!
//! Object store access only goes through the `store` pool: a missing object
//! or a rejected write is final.
//!
//! Events from every layer travel over the [`Bus`] to a listener that feeds
//! the [`SubscriberSet`].
//!
//! ## Shutdown
//! [`Bridge::shutdown`] cancels the root token (queued jobs of tokens obtained
//! from [`Bridge::cancel_token`] resolve as cancelled), logs out of the vendor
//! and drains the subscribers.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::auth::AuthGuard;
use crate::capture::CapturePipeline;
use crate::config::{Config, POOL_CAPTURE, POOL_STORE};
use crate::error::BridgeError;
use crate::events::Bus;
use crate::pool::{PoolSet, PoolStats};
use crate::reply::{Reply, RequestContext};
use crate::subscribers::SubscriberSet;
use crate::vendor::{Blob, CameraId, ObjectStore, Token};

use super::builder::BridgeBuilder;

/// Resilient gateway to the vendor API, the cameras and the object store.
pub struct Bridge {
    cfg: Config,
    bus: Bus,
    pools: PoolSet,
    guard: AuthGuard,
    capture: Arc<CapturePipeline>,
    store: Arc<dyn ObjectStore>,
    root: CancellationToken,
    listener_stop: CancellationToken,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Bridge {
    /// Returns a builder for `cfg`.
    pub fn builder(cfg: Config) -> BridgeBuilder {
        BridgeBuilder::new(cfg)
    }

    pub(super) fn new_internal(
        cfg: Config,
        bus: Bus,
        pools: PoolSet,
        guard: AuthGuard,
        capture: Arc<CapturePipeline>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            cfg,
            bus,
            pools,
            guard,
            capture,
            store,
            root: CancellationToken::new(),
            listener_stop: CancellationToken::new(),
            listener: Mutex::new(None),
        }
    }

    /// Subscribes to the bus and forwards events to the subscriber set.
    pub(super) fn start_listener(&self, subs: SubscriberSet) {
        let mut rx = self.bus.subscribe();
        let stop = self.listener_stop.clone();
        let handle = tokio::spawn(async move {
            loop {
                let ev = tokio::select! {
                    biased;
                    ev = rx.recv() => ev,
                    _ = stop.cancelled() => break,
                };
                match ev {
                    Ok(ev) => subs.emit(&ev),
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "event listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            while let Ok(ev) = rx.try_recv() {
                subs.emit(&ev);
            }
            subs.shutdown().await;
        });
        *self.listener.lock() = Some(handle);
    }

    /// Configuration the bridge was built with.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Event bus; subscribe to observe runtime events directly.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Token for one request; cancelled by [`shutdown`](Self::shutdown).
    pub fn cancel_token(&self) -> CancellationToken {
        self.root.child_token()
    }

    /// Counters of pool `key`.
    pub fn pool_stats(&self, key: &str) -> PoolStats {
        self.pools.get(key).stats()
    }

    /// Runs a vendor call with pooling, retry and re-authentication.
    ///
    /// `name` is also the pool key: each operation gets its own pool
    /// (`Config::pools`, else `Config::default_pool`), so a burst on one
    /// endpoint never queues another. `op` is called with the current token,
    /// once per attempt.
    pub async fn call<T, F, Fut>(
        &self,
        ctx: &RequestContext,
        name: &str,
        cancel: &CancellationToken,
        op: F,
    ) -> Reply<T>
    where
        F: Fn(Token) -> Fut,
        Fut: Future<Output = Result<T, BridgeError>>,
    {
        let pool = self.pools.get(name);
        let (pool, op, retry, bus) = (&pool, &op, &self.cfg.retry, &self.bus);
        self.guard
            .run(ctx, name, move |token| async move {
                pool.submit(cancel, || retry.run_reported(name, bus, || op(token.clone())))
                    .await
            })
            .await
    }

    /// Takes a screenshot of `camera`, reusing one taken within the screenshot TTL.
    pub async fn capture_screenshot(
        &self,
        ctx: &RequestContext,
        camera: CameraId,
        cancel: &CancellationToken,
    ) -> Reply<Blob> {
        let res = self.screenshot_inner(ctx, camera, cancel).await;
        self.guard.reply(ctx, "capture_screenshot", res)
    }

    /// Records a short clip of `camera`.
    pub async fn capture_video(
        &self,
        ctx: &RequestContext,
        camera: CameraId,
        cancel: &CancellationToken,
    ) -> Reply<Blob> {
        let res = self.video_inner(ctx, camera, cancel).await;
        self.guard.reply(ctx, "capture_video", res)
    }

    /// Records a clip of `camera` and stores it; returns the object id.
    pub async fn capture_video_to_store(
        &self,
        ctx: &RequestContext,
        camera: CameraId,
        cancel: &CancellationToken,
    ) -> Reply<String> {
        let res = match self.video_inner(ctx, camera, cancel).await {
            Ok(clip) => self.put_inner(clip, cancel).await,
            Err(e) => Err(e),
        };
        self.guard.reply(ctx, "capture_video_to_store", res)
    }

    /// Stores `data`; returns the object id.
    pub async fn store_object(
        &self,
        ctx: &RequestContext,
        data: Blob,
        cancel: &CancellationToken,
    ) -> Reply<String> {
        let res = self.put_inner(data, cancel).await;
        self.guard.reply(ctx, "store_object", res)
    }

    /// Reads object `id`.
    pub async fn fetch_object(
        &self,
        ctx: &RequestContext,
        id: &str,
        cancel: &CancellationToken,
    ) -> Reply<Blob> {
        let pool = self.pools.get(POOL_STORE);
        let res = pool
            .submit(cancel, || self.store.get(id))
            .await
            .done()
            .unwrap_or(Err(BridgeError::Canceled));
        self.guard.reply(ctx, "fetch_object", res)
    }

    /// Stops the bridge.
    ///
    /// Cancels queued work, logs out of the vendor (best effort) and waits
    /// until every subscriber has processed the events published so far.
    pub async fn shutdown(&self) {
        self.root.cancel();

        let ctx = RequestContext::new("bridge", "bridge", "-", "shutdown");
        if let Err(e) = self.guard.broker().logout(&ctx).await {
            tracing::warn!(error = %e, "vendor logout failed during shutdown");
        }

        self.listener_stop.cancel();
        let handle = self.listener.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    async fn screenshot_inner(
        &self,
        ctx: &RequestContext,
        camera: CameraId,
        cancel: &CancellationToken,
    ) -> Result<Blob, BridgeError> {
        let pool = self.pools.get(POOL_CAPTURE);
        let (pool, shots) = (&pool, self.capture.screenshots());
        self.guard
            .execute(ctx, "capture_screenshot", move |token| async move {
                pool.submit(cancel, || async { shots.capture(&token, camera, ctx).await })
                    .await
            })
            .await
    }

    async fn video_inner(
        &self,
        ctx: &RequestContext,
        camera: CameraId,
        cancel: &CancellationToken,
    ) -> Result<Blob, BridgeError> {
        let pool = self.pools.get(POOL_CAPTURE);
        let (pool, capture) = (&pool, &self.capture);
        self.guard
            .execute(ctx, "capture_video", move |token| async move {
                pool.submit(cancel, || async { capture.record(&token, camera, ctx).await })
                    .await
            })
            .await
    }

    async fn put_inner(
        &self,
        data: Blob,
        cancel: &CancellationToken,
    ) -> Result<String, BridgeError> {
        let pool = self.pools.get(POOL_STORE);
        pool.submit(cancel, || self.store.put(data))
            .await
            .done()
            .unwrap_or(Err(BridgeError::Canceled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::PoolConfig;
    use crate::testing::{FakeAuth, FakeCamera, FakeEncoder};
    use crate::vendor::{AuthApi, CameraApi, MemoryStore};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn ctx(id: &str) -> RequestContext {
        RequestContext::new("test", "c1", "u1", id)
    }

    fn bridge(cfg: Config, auth: &Arc<FakeAuth>, camera: &Arc<FakeCamera>) -> Arc<Bridge> {
        Bridge::builder(cfg)
            .with_auth_api(Arc::clone(auth) as Arc<dyn AuthApi>)
            .with_camera_api(Arc::clone(camera) as Arc<dyn CameraApi>)
            .with_encoder(Arc::new(FakeEncoder::new()))
            .with_store(Arc::new(MemoryStore::new()))
            .build()
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_reauthenticates_then_succeeds() {
        let auth = Arc::new(FakeAuth::new());
        let b = bridge(Config::default(), &auth, &Arc::new(FakeCamera::ok()));
        let calls = AtomicU32::new(0);

        let reply = b
            .call(&ctx("r1"), "detect_face", &b.cancel_token(), |token| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    match n {
                        0 => Err(BridgeError::status("detect_face", 401, "")),
                        1 => Err(BridgeError::status("detect_face", 503, "")),
                        _ => Ok(token.as_str().to_string()),
                    }
                }
            })
            .await;

        assert_eq!(reply.data().map(String::as_str), Some("tok-2"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(auth.logins.load(Ordering::SeqCst), 2);
        b.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_cancels_queued_calls() {
        let mut cfg = Config::default();
        cfg.pools.insert("detect_face".into(), PoolConfig::new(1, Duration::ZERO));
        let auth = Arc::new(FakeAuth::new());
        let b = bridge(cfg, &auth, &Arc::new(FakeCamera::ok()));
        let (release_tx, release_rx) = tokio::sync::watch::channel(false);

        let running = {
            let b = Arc::clone(&b);
            let cancel = b.cancel_token();
            tokio::spawn(async move {
                b.call(&ctx("slow"), "detect_face", &cancel, |_| {
                    let mut rx = release_rx.clone();
                    async move {
                        let _ = rx.wait_for(|open| *open).await;
                        Ok(1)
                    }
                })
                .await
            })
        };
        while b.pool_stats("detect_face").active < 1 {
            tokio::task::yield_now().await;
        }

        let queued = {
            let b = Arc::clone(&b);
            let cancel = b.cancel_token();
            tokio::spawn(async move {
                b.call(&ctx("queued"), "detect_face", &cancel, |_| async { Ok(2) })
                    .await
            })
        };
        while b.pool_stats("detect_face").queued < 1 {
            tokio::task::yield_now().await;
        }

        b.shutdown().await;
        let queued = queued.await.unwrap();
        assert_eq!(queued.error_message(), Some("operation canceled"));
        assert_eq!(auth.logouts.load(Ordering::SeqCst), 1);

        release_tx.send_replace(true);
        assert_eq!(running.await.unwrap().data(), Some(&1));
    }

    #[tokio::test]
    async fn test_operations_do_not_share_a_pool() {
        let mut cfg = Config::default();
        cfg.default_pool = PoolConfig::new(1, Duration::ZERO);
        let auth = Arc::new(FakeAuth::new());
        let b = bridge(cfg, &auth, &Arc::new(FakeCamera::ok()));
        let (release_tx, release_rx) = tokio::sync::watch::channel(false);

        let busy = {
            let b = Arc::clone(&b);
            let cancel = b.cancel_token();
            tokio::spawn(async move {
                b.call(&ctx("r1"), "detect_face", &cancel, |_| {
                    let mut rx = release_rx.clone();
                    async move {
                        let _ = rx.wait_for(|open| *open).await;
                        Ok(1)
                    }
                })
                .await
            })
        };
        while b.pool_stats("detect_face").active < 1 {
            tokio::task::yield_now().await;
        }

        let cards = b
            .call(&ctx("r2"), "list_cards", &b.cancel_token(), |_| async { Ok(2) })
            .await;
        assert_eq!(cards.data(), Some(&2));
        assert_eq!(b.pool_stats("detect_face").active, 1);
        assert_eq!(b.pool_stats("list_cards").active, 0);

        release_tx.send_replace(true);
        assert_eq!(busy.await.unwrap().data(), Some(&1));
        b.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_object_is_not_retried() {
        let auth = Arc::new(FakeAuth::new());
        let b = bridge(Config::default(), &auth, &Arc::new(FakeCamera::ok()));
        let started = tokio::time::Instant::now();

        let reply = b.fetch_object(&ctx("r1"), "obj-404", &b.cancel_token()).await;

        assert!(reply.error_message().unwrap().contains("obj-404"));
        assert_eq!(started.elapsed(), Duration::ZERO);
        b.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_screenshot_and_store_roundtrip() {
        let auth = Arc::new(FakeAuth::new());
        let b = bridge(Config::default(), &auth, &Arc::new(FakeCamera::ok()));
        let cancel = b.cancel_token();

        let shot = b.capture_screenshot(&ctx("r1"), 5, &cancel).await.into_result().unwrap();
        let id = b.store_object(&ctx("r2"), shot.clone(), &cancel).await.into_result().unwrap();
        let back = b.fetch_object(&ctx("r3"), &id, &cancel).await.into_result().unwrap();

        assert_eq!(back, shot);
        b.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_video_to_store() {
        let auth = Arc::new(FakeAuth::new());
        let camera = Arc::new(FakeCamera::ok());
        let b = bridge(Config::default(), &auth, &camera);
        let cancel = b.cancel_token();

        let id = b
            .capture_video_to_store(&ctx("r1"), 8, &cancel)
            .await
            .into_result()
            .unwrap();
        let clip = b.fetch_object(&ctx("r2"), &id, &cancel).await.into_result().unwrap();

        assert_eq!(clip.len(), 45);
        assert_eq!(camera.calls(), 15);
        b.shutdown().await;
    }
}
