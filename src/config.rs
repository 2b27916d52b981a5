//! # Global runtime configuration.
//!
//! [`Config`] collects everything the [`Bridge`](crate::Bridge) needs: vendor
//! endpoint and credentials, per-pool concurrency limits, the retry policy,
//! capture timings and the event bus capacity.
//!
//! Defaults match the production deployment; [`Config::from_env`] overrides
//! them from `CC_FINDFACE_*` variables.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use facebridge::{Config, PoolConfig};
//!
//! let mut cfg = Config::default();
//! cfg.vendor_url = "http://vendor.local".into();
//! cfg.pools.insert("detect_face".into(), PoolConfig::new(35, Duration::from_millis(10)));
//!
//! assert_eq!(cfg.pool("detect_face").capacity(), 35);
//! assert_eq!(cfg.pool("list_cards").capacity(), 50);
//! assert_eq!(cfg.capture.video_settings().total_frames(), 15);
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::capture::VideoSettings;
use crate::error::ConfigError;
use crate::policies::RetryPolicy;
use crate::pool::PoolConfig;
use crate::vendor::Credentials;

/// Pool used for screenshot and video capture.
pub const POOL_CAPTURE: &str = "capture";
/// Pool used for object store access.
pub const POOL_STORE: &str = "store";

/// Timings and encoding parameters of camera capture.
#[derive(Clone, Debug)]
pub struct CaptureConfig {
    /// Frames per second of a clip.
    pub frame_rate: u32,
    /// Clip length in seconds.
    pub duration_secs: u32,
    /// Clip bitrate in bits per second.
    pub bitrate: u64,
    /// Pause between two frame captures.
    pub frame_delay: Duration,
    /// How long a screenshot is reused for the same camera.
    pub screenshot_ttl: Duration,
    /// How long a clip is reused for the same camera.
    pub video_ttl: Duration,
    /// Hard deadline of one recording.
    pub video_timeout: Duration,
    /// Screenshot width requested from the vendor (0 = native).
    pub capture_width: u32,
    /// ffmpeg executable.
    pub ffmpeg_path: PathBuf,
}

impl CaptureConfig {
    /// Encoder parameters.
    pub fn video_settings(&self) -> VideoSettings {
        VideoSettings {
            frame_rate: self.frame_rate,
            duration_secs: self.duration_secs,
            bitrate: self.bitrate,
        }
    }

    /// Expected wall time of one recording: every frame plus one extra delay.
    pub fn expected_duration(&self) -> Duration {
        self.frame_delay * self.video_settings().total_frames() + self.frame_delay
    }
}

impl Default for CaptureConfig {
    /// Provides:
    /// - 15 fps × 1 s at 1 Mbit/s;
    /// - `frame_delay = 1s`, `screenshot_ttl = 1s`;
    /// - `video_ttl = 16s` (expected duration), `video_timeout = 32s` (twice that);
    /// - `ffmpeg` from `PATH`.
    fn default() -> Self {
        let mut cfg = Self {
            frame_rate: 15,
            duration_secs: 1,
            bitrate: 1_000_000,
            frame_delay: Duration::from_millis(1000),
            screenshot_ttl: Duration::from_millis(1000),
            video_ttl: Duration::ZERO,
            video_timeout: Duration::ZERO,
            capture_width: 0,
            ffmpeg_path: PathBuf::from("ffmpeg"),
        };
        cfg.video_ttl = cfg.expected_duration();
        cfg.video_timeout = cfg.expected_duration() * 2;
        cfg
    }
}

/// Global configuration of the bridge.
#[derive(Clone, Debug)]
pub struct Config {
    /// Vendor API base URL.
    pub vendor_url: String,
    /// Service account.
    pub credentials: Credentials,
    /// Delete the account's offline sessions after each login.
    pub terminate_sessions: bool,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    /// Pool configuration by pool key.
    pub pools: HashMap<String, PoolConfig>,
    /// Configuration for pool keys missing from `pools`.
    pub default_pool: PoolConfig,
    /// Retry policy wrapped around every vendor call.
    pub retry: RetryPolicy,
    /// Capture timings.
    pub capture: CaptureConfig,
    /// Capacity of the event bus channel.
    pub bus_capacity: usize,
}

impl Default for Config {
    /// Provides:
    /// - vendor at `http://192.168.14.55`, user `services_node`;
    /// - `capture` pool and every `Bridge::call` operation: 50 concurrent, no admission delay;
    /// - `store` pool: 20 concurrent, 1s admission delay;
    /// - retry: 5 × 1s, only retryable errors;
    /// - `request_timeout = 30s`, `bus_capacity = 1024`.
    fn default() -> Self {
        let mut pools = HashMap::new();
        pools.insert(POOL_CAPTURE.to_string(), PoolConfig::new(50, Duration::ZERO));
        pools.insert(POOL_STORE.to_string(), PoolConfig::new(20, Duration::from_millis(1000)));
        Self {
            vendor_url: "http://192.168.14.55".to_string(),
            credentials: Credentials::new("services_node", "node9000"),
            terminate_sessions: false,
            request_timeout: Duration::from_secs(30),
            pools,
            default_pool: PoolConfig::default(),
            retry: RetryPolicy::default(),
            capture: CaptureConfig::default(),
            bus_capacity: 1024,
        }
    }
}

impl Config {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by `lookup` (variable name → value).
    ///
    /// Reads `CC_FINDFACE_URL`, `CC_FINDFACE_USER`, `CC_FINDFACE_PASSWORD`,
    /// `CC_ENABLE_TERMINATE_SESSIONS` and `CC_FINDFACE_REQUEST_TIMEOUT_MS`.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(url) = lookup("CC_FINDFACE_URL") {
            cfg.vendor_url = url;
        }
        if let Some(user) = lookup("CC_FINDFACE_USER") {
            cfg.credentials.user = user;
        }
        if let Some(password) = lookup("CC_FINDFACE_PASSWORD") {
            cfg.credentials.password = password;
        }
        if let Some(raw) = lookup("CC_ENABLE_TERMINATE_SESSIONS") {
            cfg.terminate_sessions = parse_flag("CC_ENABLE_TERMINATE_SESSIONS", &raw)?;
        }
        if let Some(raw) = lookup("CC_FINDFACE_REQUEST_TIMEOUT_MS") {
            let ms: u64 = raw
                .trim()
                .parse()
                .map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
                    key: "CC_FINDFACE_REQUEST_TIMEOUT_MS",
                    value: raw.clone(),
                    reason: e.to_string(),
                })?;
            cfg.request_timeout = Duration::from_millis(ms);
        }
        Ok(cfg)
    }

    /// Configuration of pool `key`, falling back to `default_pool`.
    pub fn pool(&self, key: &str) -> PoolConfig {
        self.pools.get(key).copied().unwrap_or(self.default_pool)
    }
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}
