//! # Video capture pipeline.
//!
//! Turns a series of camera screenshots into one encoded clip.
//!
//! ```text
//! Idle ──► Capturing ──────────────────────────────► Encoding ──► Done
//!             │ for i in 0..frames:                      │ drop(input) = end of input
//!             │   frame = screenshots.capture()          │ collect output chunks
//!             │   input.send(frame)                      │ until the encoder closes it
//!             │   sleep(frame_delay)                     │
//!             ▼                                          ▼
//!           Failed ◄──── frame error / encoder error / deadline
//!                        (encoder cancelled, screenshot entry evicted)
//! ```
//!
//! ## Rules
//! - The whole run is bounded by `timeout`; on expiry the encoder is cancelled
//!   before its input is dropped, so it never finalizes a partial clip.
//! - Any failure evicts the camera's cached screenshot.
//! - Overlapping recordings for the same camera share one run (video memo).

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::CaptureConfig;
use crate::error::BridgeError;
use crate::events::{Bus, Event, EventKind};
use crate::memo::TtlMemo;
use crate::reply::RequestContext;
use crate::vendor::{Blob, CameraId, Token};

use super::encoder::{Encoder, VideoSettings};
use super::screenshot::Screenshots;

/// Lifecycle of one recording.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureState {
    /// Not started.
    Idle,
    /// Fetching frames and feeding the encoder.
    Capturing,
    /// All frames submitted; waiting for the clip.
    Encoding,
    /// Clip produced.
    Done,
    /// Aborted.
    Failed,
}

/// State of one recording run.
#[derive(Debug)]
pub struct CaptureSession {
    /// Camera being recorded.
    pub camera: CameraId,
    /// Frames submitted so far, in order.
    pub frames: Vec<Blob>,
    /// Start of the run.
    pub started_at: Instant,
    /// Hard deadline of the run.
    pub deadline: Instant,
    /// Current state.
    pub state: CaptureState,
}

impl CaptureSession {
    fn new(camera: CameraId, timeout: Duration) -> Self {
        let started_at = Instant::now();
        Self {
            camera,
            frames: Vec::new(),
            started_at,
            deadline: started_at + timeout,
            state: CaptureState::Idle,
        }
    }
}

/// Records clips from camera screenshots.
pub struct CapturePipeline {
    screenshots: Arc<Screenshots>,
    encoder: Arc<dyn Encoder>,
    settings: VideoSettings,
    frame_delay: Duration,
    timeout: Duration,
    videos: TtlMemo<CameraId, Blob>,
    bus: Bus,
}

impl CapturePipeline {
    /// Creates a pipeline reading frames from `screenshots`.
    pub fn new(
        screenshots: Arc<Screenshots>,
        encoder: Arc<dyn Encoder>,
        config: &CaptureConfig,
        bus: Bus,
    ) -> Self {
        Self {
            screenshots,
            encoder,
            settings: config.video_settings(),
            frame_delay: config.frame_delay,
            timeout: config.video_timeout,
            videos: TtlMemo::new("videos", config.video_ttl, bus.clone()),
            bus,
        }
    }

    /// Screenshot service used for frames.
    pub fn screenshots(&self) -> &Arc<Screenshots> {
        &self.screenshots
    }

    /// Records a clip of `camera`, joining a recording already running for it.
    pub async fn record(
        self: &Arc<Self>,
        token: &Token,
        camera: CameraId,
        ctx: &RequestContext,
    ) -> Result<Blob, BridgeError> {
        let me = Arc::clone(self);
        let token = token.clone();
        let ctx = ctx.clone();
        self.videos
            .get_or_compute(camera, move || async move {
                me.record_once(&token, camera, &ctx).await
            })
            .await
    }

    /// Records a clip without coalescing.
    pub async fn record_once(
        &self,
        token: &Token,
        camera: CameraId,
        ctx: &RequestContext,
    ) -> Result<Blob, BridgeError> {
        let cancel = CancellationToken::new();
        let _teardown = cancel.clone().drop_guard();
        let mut session = CaptureSession::new(camera, self.timeout);
        let deadline = session.deadline;

        let res = {
            let run = self.run(token, ctx, &mut session, &cancel);
            tokio::pin!(run);
            tokio::select! {
                res = &mut run => res,
                _ = time::sleep_until(deadline) => {
                    cancel.cancel();
                    Err(BridgeError::Timeout { timeout: self.timeout })
                }
            }
        };

        match res {
            Ok(clip) => {
                session.state = CaptureState::Done;
                self.publish(
                    Event::new(EventKind::CaptureDone)
                        .with_camera(camera)
                        .with_request(ctx.request_id.as_str())
                        .with_bytes(clip.len()),
                );
                Ok(clip)
            }
            Err(e) => {
                cancel.cancel();
                session.state = CaptureState::Failed;
                self.screenshots.clear(camera);
                self.publish(
                    Event::new(EventKind::CaptureFailed)
                        .with_camera(camera)
                        .with_request(ctx.request_id.as_str())
                        .with_attempt(session.frames.len() as u32)
                        .with_reason(e.to_string()),
                );
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        token: &Token,
        ctx: &RequestContext,
        session: &mut CaptureSession,
        cancel: &CancellationToken,
    ) -> Result<Blob, BridgeError> {
        let camera = session.camera;
        let (input, mut output) = self.encoder.start(&self.settings, cancel.clone())?.into_parts();

        session.state = CaptureState::Capturing;
        self.publish(
            Event::new(EventKind::CaptureStarted)
                .with_camera(camera)
                .with_request(ctx.request_id.as_str())
                .with_timeout(session.deadline - session.started_at),
        );

        for i in 0..self.settings.total_frames() {
            let frame = match self.screenshots.capture(token, camera, ctx).await {
                Ok(frame) => frame,
                Err(e) => {
                    cancel.cancel();
                    return Err(e);
                }
            };
            self.publish(
                Event::new(EventKind::FrameCaptured)
                    .with_camera(camera)
                    .with_attempt(i)
                    .with_bytes(frame.len()),
            );
            if input.send(frame.clone()).await.is_err() {
                cancel.cancel();
                return Err(BridgeError::encoder("encoder stopped accepting frames"));
            }
            session.frames.push(frame);
            time::sleep(self.frame_delay).await;
        }

        drop(input);
        session.state = CaptureState::Encoding;
        self.publish(Event::new(EventKind::CaptureEncoding).with_camera(camera));

        let mut clip = Vec::new();
        while let Some(chunk) = output.recv().await {
            match chunk {
                Ok(bytes) => clip.extend_from_slice(&bytes),
                Err(e) => {
                    cancel.cancel();
                    return Err(e);
                }
            }
        }
        if clip.is_empty() {
            return Err(BridgeError::encoder("encoder produced no output"));
        }
        Ok(Blob::from(clip))
    }

    fn publish(&self, ev: Event) {
        self.bus.publish(ev);
    }
}
