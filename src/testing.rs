//! In-memory collaborators shared by unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::capture::{Encoder, EncoderSession, VideoSettings};
use crate::error::BridgeError;
use crate::reply::RequestContext;
use crate::vendor::{AuthApi, Blob, CameraApi, CameraId, Credentials, Token};

/// Auth endpoints that hand out `tok-N` tokens.
#[derive(Default)]
pub(crate) struct FakeAuth {
    pub logins: AtomicUsize,
    pub logouts: AtomicUsize,
    pub cleanups: AtomicUsize,
    /// Number of upcoming logins rejected with 401.
    pub fail_logins: AtomicUsize,
    login_delay: Duration,
    fail_cleanup: bool,
}

impl FakeAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_login_delay(mut self, delay: Duration) -> Self {
        self.login_delay = delay;
        self
    }

    pub fn with_failing_cleanup(mut self) -> Self {
        self.fail_cleanup = true;
        self
    }
}

#[async_trait]
impl AuthApi for FakeAuth {
    async fn login(
        &self,
        _credentials: &Credentials,
        _ctx: &RequestContext,
    ) -> Result<Token, BridgeError> {
        let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.login_delay.is_zero() {
            tokio::time::sleep(self.login_delay).await;
        }
        let rejected = self
            .fail_logins
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if rejected {
            return Err(BridgeError::status("login", 401, "bad credentials"));
        }
        Ok(Token::new(format!("tok-{n}")))
    }

    async fn logout(&self, _token: &Token, _ctx: &RequestContext) -> Result<(), BridgeError> {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn terminate_offline_sessions(
        &self,
        _token: &Token,
        _user: &str,
        _ctx: &RequestContext,
    ) -> Result<usize, BridgeError> {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        if self.fail_cleanup {
            return Err(BridgeError::status("sessions list", 500, ""));
        }
        Ok(0)
    }
}

type Script = Box<dyn Fn(usize) -> Result<Blob, BridgeError> + Send + Sync>;

/// Camera whose n-th screenshot (1-based) is decided by a script.
pub(crate) struct FakeCamera {
    pub calls: AtomicUsize,
    pub times: Mutex<Vec<Instant>>,
    latency: Duration,
    script: Script,
}

impl FakeCamera {
    pub fn new<S>(script: S) -> Self
    where
        S: Fn(usize) -> Result<Blob, BridgeError> + Send + Sync + 'static,
    {
        Self {
            calls: AtomicUsize::new(0),
            times: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
            script: Box::new(script),
        }
    }

    /// Every call returns a 3-byte frame tagged with the call number.
    pub fn ok() -> Self {
        Self::new(|n| Ok(Blob::from(vec![0xff, 0xd8, n as u8])))
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CameraApi for FakeCamera {
    async fn screenshot(
        &self,
        _token: &Token,
        _camera: CameraId,
        _ctx: &RequestContext,
    ) -> Result<Blob, BridgeError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.times.lock().push(Instant::now());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        (self.script)(n)
    }
}

/// Encoder that concatenates its frames into the clip.
#[derive(Clone, Default)]
pub(crate) struct FakeEncoder {
    pub started: Arc<AtomicUsize>,
    pub finalized: Arc<AtomicBool>,
    pub frames: Arc<AtomicUsize>,
}

impl FakeEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finalized(&self) -> bool {
        self.finalized.load(Ordering::SeqCst)
    }
}

impl Encoder for FakeEncoder {
    fn start(
        &self,
        _settings: &VideoSettings,
        cancel: CancellationToken,
    ) -> Result<EncoderSession, BridgeError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let (in_tx, mut in_rx) = mpsc::channel::<Blob>(4);
        let (out_tx, out_rx) = mpsc::channel(4);
        let finalized = Arc::clone(&self.finalized);
        let frames = Arc::clone(&self.frames);

        tokio::spawn(async move {
            let mut clip = Vec::new();
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return,
                    frame = in_rx.recv() => match frame {
                        Some(frame) => {
                            frames.fetch_add(1, Ordering::SeqCst);
                            clip.extend_from_slice(&frame);
                        }
                        None => break,
                    },
                }
            }
            finalized.store(true, Ordering::SeqCst);
            let half = clip.len() / 2;
            let _ = out_tx.send(Ok(clip[..half].to_vec())).await;
            let _ = out_tx.send(Ok(clip[half..].to_vec())).await;
        });

        Ok(EncoderSession::new(in_tx, out_rx))
    }
}
