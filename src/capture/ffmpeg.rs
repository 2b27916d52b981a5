//! ffmpeg-backed [`Encoder`]: JPEG frames on stdin, VP9/WebM on stdout.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::BridgeError;
use crate::vendor::Blob;

use super::encoder::{Encoder, EncoderSession, VideoSettings};

const FRAME_QUEUE: usize = 32;
const CHUNK_SIZE: usize = 64 * 1024;

/// Runs one `ffmpeg` child process per clip.
///
/// The child is killed when the run is cancelled or its handle is dropped.
#[derive(Clone, Debug)]
pub struct FfmpegEncoder {
    binary: PathBuf,
}

impl FfmpegEncoder {
    /// Uses the ffmpeg executable at `binary` (a bare name is looked up in `PATH`).
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

/// Command line for one run.
pub(crate) fn ffmpeg_args(settings: &VideoSettings) -> Vec<String> {
    let fps = settings.frame_rate.to_string();
    let bitrate = settings.bitrate.to_string();
    let duration = settings.duration_secs.to_string();
    [
        "-hide_banner",
        "-loglevel",
        "error",
        "-f",
        "image2pipe",
        "-framerate",
        fps.as_str(),
        "-i",
        "pipe:0",
        "-c:v",
        "libvpx-vp9",
        "-b:v",
        bitrate.as_str(),
        "-pix_fmt",
        "yuv420p",
        "-r",
        fps.as_str(),
        "-t",
        duration.as_str(),
        "-f",
        "webm",
        "pipe:1",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Encoder for FfmpegEncoder {
    fn start(
        &self,
        settings: &VideoSettings,
        cancel: CancellationToken,
    ) -> Result<EncoderSession, BridgeError> {
        let mut child = Command::new(&self.binary)
            .args(ffmpeg_args(settings))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BridgeError::encoder(format!("spawn {}: {e}", self.binary.display())))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| BridgeError::encoder("ffmpeg stdin not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::encoder("ffmpeg stdout not captured"))?;

        let (in_tx, mut in_rx) = mpsc::channel::<Blob>(FRAME_QUEUE);
        let (out_tx, out_rx) = mpsc::channel(FRAME_QUEUE);

        let writer_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                let frame = tokio::select! {
                    biased;
                    _ = writer_cancel.cancelled() => return,
                    frame = in_rx.recv() => frame,
                };
                let Some(frame) = frame else { break };
                if let Err(e) = stdin.write_all(&frame).await {
                    warn!(error = %e, "ffmpeg stdin closed early");
                    return;
                }
            }
            // Closing stdin is end-of-input for ffmpeg.
            let _ = stdin.shutdown().await;
        });

        tokio::spawn(pump_output(child, stdout, out_tx, cancel));

        Ok(EncoderSession::new(in_tx, out_rx))
    }
}

async fn pump_output(
    mut child: Child,
    mut stdout: ChildStdout,
    out_tx: mpsc::Sender<Result<Vec<u8>, BridgeError>>,
    cancel: CancellationToken,
) {
    let mut stderr = child.stderr.take();
    let stderr_task = tokio::spawn(async move {
        let mut buf = String::new();
        if let Some(stderr) = stderr.as_mut() {
            let _ = stderr.read_to_string(&mut buf).await;
        }
        buf
    });

    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("ffmpeg run cancelled");
                let _ = child.kill().await;
                return;
            }
            read = stdout.read(&mut buf) => read,
        };
        match read {
            Ok(0) => break,
            Ok(n) => {
                if out_tx.send(Ok(buf[..n].to_vec())).await.is_err() {
                    let _ = child.kill().await;
                    return;
                }
            }
            Err(e) => {
                let err = BridgeError::encoder(format!("read ffmpeg output: {e}"));
                let _ = out_tx.send(Err(err)).await;
                let _ = child.kill().await;
                return;
            }
        }
    }

    let status = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            let _ = child.kill().await;
            return;
        }
        status = child.wait() => status,
    };
    let stderr = stderr_task.await.unwrap_or_default();
    match status {
        Ok(status) if status.success() => {}
        Ok(status) => {
            let err =
                BridgeError::encoder(format!("ffmpeg exited with {status}: {}", stderr.trim()));
            let _ = out_tx.send(Err(err)).await;
        }
        Err(e) => {
            let _ = out_tx.send(Err(BridgeError::encoder(format!("wait for ffmpeg: {e}")))).await;
        }
    }
}
