use std::sync::Arc;
use std::time::Duration;

use crate::error::BridgeError;
use crate::events::Bus;
use crate::memo::TtlMemo;
use crate::policies::RetryPolicy;
use crate::reply::RequestContext;
use crate::vendor::{Blob, CameraApi, CameraId, Token};

/// Memoized, retried camera screenshots.
///
/// Concurrent requests for the same camera within the TTL share one vendor
/// call; each vendor call is retried by the [`RetryPolicy`].
pub struct Screenshots {
    camera: Arc<dyn CameraApi>,
    memo: TtlMemo<CameraId, Blob>,
    retry: RetryPolicy,
    bus: Bus,
}

impl Screenshots {
    /// Creates the service; a screenshot stays cached for `ttl`.
    pub fn new(camera: Arc<dyn CameraApi>, ttl: Duration, retry: RetryPolicy, bus: Bus) -> Self {
        Self {
            camera,
            memo: TtlMemo::new("screenshots", ttl, bus.clone()),
            retry,
            bus,
        }
    }

    /// Returns a screenshot of `camera`, fresh or at most `ttl` old.
    pub async fn capture(
        &self,
        token: &Token,
        camera: CameraId,
        ctx: &RequestContext,
    ) -> Result<Blob, BridgeError> {
        let api = Arc::clone(&self.camera);
        let retry = self.retry.clone();
        let bus = self.bus.clone();
        let token = token.clone();
        let ctx = ctx.clone();

        self.memo
            .get_or_compute(camera, move || async move {
                retry
                    .run_reported("screenshot", &bus, || api.screenshot(&token, camera, &ctx))
                    .await
            })
            .await
    }

    /// Drops the cached screenshot of `camera`, pending or ready.
    pub fn clear(&self, camera: CameraId) -> bool {
        self.memo.clear(&camera)
    }

    /// True if a screenshot of `camera` is being fetched.
    pub fn is_pending(&self, camera: CameraId) -> bool {
        self.memo.is_pending(&camera)
    }
}
