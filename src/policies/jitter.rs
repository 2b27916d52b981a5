//! # Jitter policy for retry delays.
//!
//! [`JitterPolicy`] randomizes the fixed retry delay so that a burst of failed
//! vendor calls does not retry in lockstep.
//!
//! - [`JitterPolicy::None`]: exact delay (default)
//! - [`JitterPolicy::Full`]: random delay in `[0, delay]`
//! - [`JitterPolicy::Equal`]: `delay/2 + random[0, delay/2]`

use std::time::Duration;

use rand::Rng;

/// Policy controlling randomization of retry delays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// No jitter: use exact delay.
    #[default]
    None,
    /// Full jitter: random delay in `[0, delay]`.
    Full,
    /// Equal jitter: `delay/2 + random[0, delay/2]`.
    Equal,
}

impl JitterPolicy {
    /// Applies jitter to the given delay.
    pub fn apply(&self, delay: Duration) -> Duration {
        let ms = delay.as_millis().min(u128::from(u64::MAX)) as u64;
        if ms == 0 {
            return delay;
        }
        let mut rng = rand::rng();
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full => Duration::from_millis(rng.random_range(0..=ms)),
            JitterPolicy::Equal => {
                let half = ms / 2;
                let jitter = if half == 0 { 0 } else { rng.random_range(0..=half) };
                Duration::from_millis(half + jitter)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_is_exact() {
        assert_eq!(
            JitterPolicy::None.apply(Duration::from_millis(1000)),
            Duration::from_millis(1000)
        );
    }

    #[test]
    fn test_full_jitter_bounds() {
        for _ in 0..50 {
            assert!(
                JitterPolicy::Full.apply(Duration::from_millis(1000)) <= Duration::from_millis(1000)
            );
        }
    }

    #[test]
    fn test_equal_jitter_bounds() {
        for _ in 0..50 {
            let d = JitterPolicy::Equal.apply(Duration::from_millis(1000));
            assert!(d >= Duration::from_millis(500));
            assert!(d <= Duration::from_millis(1000));
        }
    }

    #[test]
    fn test_zero_delay_stays_zero() {
        assert_eq!(JitterPolicy::Full.apply(Duration::ZERO), Duration::ZERO);
    }
}
