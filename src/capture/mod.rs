//! Camera capture: memoized screenshots and the screenshot-to-video pipeline.
//!
//! ```text
//! Bridge::capture_screenshot ──► Screenshots::capture ──► TtlMemo ──► RetryPolicy ──► CameraApi
//! Bridge::capture_video      ──► CapturePipeline::record ──► Screenshots (×frames) ──► Encoder
//! ```

mod encoder;
mod ffmpeg;
mod pipeline;
mod screenshot;

pub use encoder::{Encoder, EncoderSession, VideoSettings};
pub use ffmpeg::FfmpegEncoder;
pub use pipeline::{CapturePipeline, CaptureSession, CaptureState};
pub use screenshot::Screenshots;
