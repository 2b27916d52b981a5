use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use facebridge::{
    AuthApi, Blob, Bridge, BridgeError, CameraApi, CameraId, Config, Credentials, Encoder,
    EncoderSession, Event, EventKind, MemoryStore, RequestContext, Subscribe, Token, VideoSettings,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct Vendor {
    logins: AtomicUsize,
    shots: AtomicUsize,
    shot_times: Mutex<Vec<Instant>>,
    reject_screenshots: AtomicBool,
    fail_from_frame: Option<usize>,
}

#[async_trait]
impl AuthApi for Vendor {
    async fn login(&self, _c: &Credentials, _ctx: &RequestContext) -> Result<Token, BridgeError> {
        let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Token::new(format!("session-{n}")))
    }

    async fn logout(&self, _t: &Token, _ctx: &RequestContext) -> Result<(), BridgeError> {
        Ok(())
    }

    async fn terminate_offline_sessions(
        &self,
        _t: &Token,
        _u: &str,
        _ctx: &RequestContext,
    ) -> Result<usize, BridgeError> {
        Ok(0)
    }
}

#[async_trait]
impl CameraApi for Vendor {
    async fn screenshot(
        &self,
        _t: &Token,
        _camera: CameraId,
        _ctx: &RequestContext,
    ) -> Result<Blob, BridgeError> {
        let n = self.shots.fetch_add(1, Ordering::SeqCst) + 1;
        self.shot_times.lock().push(Instant::now());
        if self.reject_screenshots.load(Ordering::SeqCst) {
            return Err(BridgeError::status("screenshot", 401, "token expired"));
        }
        if self.fail_from_frame.is_some_and(|from| n >= from) {
            return Err(BridgeError::status("screenshot", 500, "camera offline"));
        }
        Ok(Blob::from(vec![0xff, 0xd8, n as u8, 0xff, 0xd9]))
    }
}

#[derive(Clone, Default)]
struct ConcatEncoder {
    finalized: Arc<AtomicBool>,
}

impl Encoder for ConcatEncoder {
    fn start(
        &self,
        _s: &VideoSettings,
        cancel: CancellationToken,
    ) -> Result<EncoderSession, BridgeError> {
        let (in_tx, mut in_rx) = mpsc::channel::<Blob>(8);
        let (out_tx, out_rx) = mpsc::channel(8);
        let finalized = Arc::clone(&self.finalized);
        tokio::spawn(async move {
            let mut clip = Vec::new();
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return,
                    frame = in_rx.recv() => match frame {
                        Some(frame) => clip.extend_from_slice(&frame),
                        None => break,
                    },
                }
            }
            finalized.store(true, Ordering::SeqCst);
            let _ = out_tx.send(Ok(clip)).await;
        });
        Ok(EncoderSession::new(in_tx, out_rx))
    }
}

struct Recorder(Arc<Mutex<Vec<EventKind>>>);

#[async_trait]
impl Subscribe for Recorder {
    async fn on_event(&self, event: &Event) {
        self.0.lock().push(event.kind);
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

fn ctx(id: &str) -> RequestContext {
    RequestContext::new("capture", "client-1", "user-1", id)
}

fn build(
    vendor: &Arc<Vendor>,
    encoder: &ConcatEncoder,
    seen: &Arc<Mutex<Vec<EventKind>>>,
) -> Arc<Bridge> {
    let mut cfg = Config::default();
    cfg.retry.delay = Duration::from_millis(10);
    Bridge::builder(cfg)
        .with_vendor(Arc::clone(vendor))
        .with_encoder(Arc::new(encoder.clone()))
        .with_store(Arc::new(MemoryStore::new()))
        .with_subscribers(vec![Arc::new(Recorder(Arc::clone(seen))) as Arc<dyn Subscribe>])
        .build()
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_video_capture_end_to_end() {
    let vendor = Arc::new(Vendor::default());
    let encoder = ConcatEncoder::default();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let bridge = build(&vendor, &encoder, &seen);

    let reply = bridge.capture_video(&ctx("req-1"), 2, &bridge.cancel_token()).await;

    assert!(reply.is_ok());
    let clip = reply.data().unwrap();
    assert_eq!(clip.len(), 15 * 5);
    assert_eq!(vendor.shots.load(Ordering::SeqCst), 15);
    assert_eq!(vendor.logins.load(Ordering::SeqCst), 1);
    assert!(encoder.finalized.load(Ordering::SeqCst));

    let times = vendor.shot_times.lock().clone();
    for pair in times.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap >= Duration::from_millis(1000) && gap < Duration::from_millis(1100));
    }

    let json = serde_json::to_value(reply.map(|clip| clip.len())).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["requestId"], "req-1");
    assert_eq!(json["data"], 75);

    bridge.shutdown().await;
    let seen = seen.lock();
    assert!(seen.contains(&EventKind::CaptureStarted));
    assert!(seen.contains(&EventKind::CaptureDone));
    assert_eq!(seen.iter().filter(|k| **k == EventKind::FrameCaptured).count(), 15);
}

#[tokio::test(start_paused = true)]
async fn test_failed_frame_yields_error_reply() {
    let vendor = Arc::new(Vendor {
        fail_from_frame: Some(7),
        ..Vendor::default()
    });
    let encoder = ConcatEncoder::default();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let bridge = build(&vendor, &encoder, &seen);

    let reply = bridge.capture_video(&ctx("req-2"), 4, &bridge.cancel_token()).await;

    assert!(!reply.is_ok());
    assert!(reply.error_message().unwrap().contains("camera offline"));
    assert!(!encoder.finalized.load(Ordering::SeqCst));
    // frame 7: first try plus five retries
    assert_eq!(vendor.shots.load(Ordering::SeqCst), 6 + 6);

    bridge.shutdown().await;
    assert!(seen.lock().contains(&EventKind::CaptureFailed));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_screenshots_share_one_vendor_call() {
    let vendor = Arc::new(Vendor::default());
    let bridge = build(&vendor, &ConcatEncoder::default(), &Arc::new(Mutex::new(Vec::new())));

    let mut handles = Vec::new();
    for i in 0..10 {
        let bridge = Arc::clone(&bridge);
        handles.push(tokio::spawn(async move {
            let cancel = bridge.cancel_token();
            bridge.capture_screenshot(&ctx(&format!("req-{i}")), 1, &cancel).await
        }));
    }
    for h in handles {
        assert!(h.await.unwrap().is_ok());
    }

    assert_eq!(vendor.shots.load(Ordering::SeqCst), 1);
    assert_eq!(vendor.logins.load(Ordering::SeqCst), 1);
    bridge.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_rejected_token_surfaces_after_three_reauths() {
    let vendor = Arc::new(Vendor::default());
    vendor.reject_screenshots.store(true, Ordering::SeqCst);
    let bridge = build(&vendor, &ConcatEncoder::default(), &Arc::new(Mutex::new(Vec::new())));

    let reply = bridge.capture_screenshot(&ctx("req-3"), 1, &bridge.cancel_token()).await;

    assert!(reply.error_message().unwrap().contains("401"));
    assert_eq!(vendor.shots.load(Ordering::SeqCst), 4);
    assert_eq!(vendor.logins.load(Ordering::SeqCst), 4);
    bridge.shutdown().await;
}
