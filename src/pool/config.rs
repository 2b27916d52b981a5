use std::time::Duration;

/// Configuration of one execution pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum number of jobs running at the same time (min 1).
    pub max_concurrent: usize,

    /// Pause before a freed slot is handed to the next queued job.
    ///
    /// Smooths bursts toward the upstream vendor; `0` hands over immediately.
    pub admission_delay: Duration,
}

impl PoolConfig {
    /// Creates a pool configuration.
    pub const fn new(max_concurrent: usize, admission_delay: Duration) -> Self {
        Self {
            max_concurrent,
            admission_delay,
        }
    }

    /// Capacity clamped to a minimum of 1.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.max_concurrent.max(1)
    }
}

impl Default for PoolConfig {
    /// 50 concurrent jobs, no admission delay.
    fn default() -> Self {
        Self::new(50, Duration::ZERO)
    }
}
