//! # Streaming video encoder contract.
//!
//! An encoder is driven through two channels:
//!
//! ```text
//! pipeline ──frames──► [input: mpsc<Blob>] ──► encoder task ──► [output: mpsc<Result<chunk>>] ──► pipeline
//! ```
//!
//! - Dropping the input sender is end-of-input; the encoder finalizes, emits the
//!   remaining chunks and closes the output.
//! - Cancelling the token passed to [`Encoder::start`] stops the encoder without
//!   finalizing; the output may close without a clip.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::BridgeError;
use crate::vendor::Blob;

/// Output parameters of a clip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VideoSettings {
    /// Frames per second, both for input and output.
    pub frame_rate: u32,
    /// Clip length in seconds.
    pub duration_secs: u32,
    /// Target bitrate in bits per second.
    pub bitrate: u64,
}

impl VideoSettings {
    /// Number of frames captured for one clip.
    pub fn total_frames(&self) -> u32 {
        self.frame_rate.saturating_mul(self.duration_secs)
    }
}

impl Default for VideoSettings {
    /// 15 fps, 1 s, 1 Mbit/s.
    fn default() -> Self {
        Self {
            frame_rate: 15,
            duration_secs: 1,
            bitrate: 1_000_000,
        }
    }
}

/// Channel ends of a running encoder.
#[derive(Debug)]
pub struct EncoderSession {
    input: mpsc::Sender<Blob>,
    output: mpsc::Receiver<Result<Vec<u8>, BridgeError>>,
}

impl EncoderSession {
    /// Bundles the frame sender and the chunk receiver.
    pub fn new(
        input: mpsc::Sender<Blob>,
        output: mpsc::Receiver<Result<Vec<u8>, BridgeError>>,
    ) -> Self {
        Self { input, output }
    }

    /// Splits into `(input, output)`.
    pub fn into_parts(self) -> (mpsc::Sender<Blob>, mpsc::Receiver<Result<Vec<u8>, BridgeError>>) {
        (self.input, self.output)
    }
}

/// Starts encoder runs. Must be called from within a tokio runtime.
pub trait Encoder: Send + Sync {
    /// Starts one encoding run; `cancel` aborts it without finalizing.
    fn start(
        &self,
        settings: &VideoSettings,
        cancel: CancellationToken,
    ) -> Result<EncoderSession, BridgeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_frames() {
        assert_eq!(VideoSettings::default().total_frames(), 15);
        let s = VideoSettings {
            frame_rate: 10,
            duration_secs: 3,
            bitrate: 1,
        };
        assert_eq!(s.total_frames(), 30);
    }
}
