use std::sync::Arc;

use crate::auth::{AuthGuard, TokenBroker};
use crate::capture::{CapturePipeline, Encoder, FfmpegEncoder, Screenshots};
use crate::config::Config;
use crate::error::BridgeError;
use crate::events::Bus;
use crate::pool::PoolSet;
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::vendor::{AuthApi, CameraApi, HttpVendor, MemoryStore, ObjectStore};

use super::service::Bridge;

/// Builder wiring a [`Bridge`] from its collaborators.
///
/// Collaborators that are not provided get the bundled implementations:
/// [`HttpVendor`] for the vendor API, [`FfmpegEncoder`] for clips and
/// [`MemoryStore`] for objects.
pub struct BridgeBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    auth: Option<Arc<dyn AuthApi>>,
    camera: Option<Arc<dyn CameraApi>>,
    encoder: Option<Arc<dyn Encoder>>,
    store: Option<Arc<dyn ObjectStore>>,
}

impl BridgeBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            auth: None,
            camera: None,
            encoder: None,
            store: None,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events through dedicated workers with
    /// bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Uses `vendor` for both authentication and camera endpoints.
    pub fn with_vendor<V>(mut self, vendor: Arc<V>) -> Self
    where
        V: AuthApi + CameraApi + 'static,
    {
        self.auth = Some(Arc::clone(&vendor) as Arc<dyn AuthApi>);
        self.camera = Some(vendor as Arc<dyn CameraApi>);
        self
    }

    /// Sets the authentication endpoints.
    pub fn with_auth_api(mut self, auth: Arc<dyn AuthApi>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Sets the camera endpoints.
    pub fn with_camera_api(mut self, camera: Arc<dyn CameraApi>) -> Self {
        self.camera = Some(camera);
        self
    }

    /// Sets the video encoder.
    pub fn with_encoder(mut self, encoder: Arc<dyn Encoder>) -> Self {
        self.encoder = Some(encoder);
        self
    }

    /// Sets the object store.
    pub fn with_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Builds the bridge and starts event delivery.
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Fails only if the default HTTP client cannot be built.
    pub fn build(self) -> Result<Arc<Bridge>, BridgeError> {
        let cfg = self.cfg;
        let bus = Bus::new(cfg.bus_capacity);
        let subs = SubscriberSet::new(self.subscribers, bus.clone());

        let (auth, camera) = match (self.auth, self.camera) {
            (Some(auth), Some(camera)) => (auth, camera),
            (auth, camera) => {
                let http = Arc::new(
                    HttpVendor::new(cfg.vendor_url.clone(), cfg.request_timeout)?
                        .with_capture_width(cfg.capture.capture_width),
                );
                (
                    auth.unwrap_or_else(|| Arc::clone(&http) as Arc<dyn AuthApi>),
                    camera.unwrap_or_else(|| http as Arc<dyn CameraApi>),
                )
            }
        };
        let encoder = self
            .encoder
            .unwrap_or_else(|| Arc::new(FfmpegEncoder::new(cfg.capture.ffmpeg_path.clone())));
        let store = self.store.unwrap_or_else(|| Arc::new(MemoryStore::new()));

        let broker = Arc::new(TokenBroker::new(
            auth,
            cfg.credentials.clone(),
            cfg.terminate_sessions,
            bus.clone(),
        ));
        let guard = AuthGuard::new(broker, bus.clone());
        let screenshots = Arc::new(Screenshots::new(
            camera,
            cfg.capture.screenshot_ttl,
            cfg.retry.clone(),
            bus.clone(),
        ));
        let capture = Arc::new(CapturePipeline::new(
            screenshots,
            encoder,
            &cfg.capture,
            bus.clone(),
        ));
        let pools = PoolSet::new(cfg.pools.clone(), cfg.default_pool, bus.clone());

        let bridge = Bridge::new_internal(cfg, bus, pools, guard, capture, store);
        bridge.start_listener(subs);
        Ok(Arc::new(bridge))
    }
}
