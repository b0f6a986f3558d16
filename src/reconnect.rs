use std::time::Duration;

use rand::Rng;

use crate::config::ReconnectConfig;

/// Delay before the next attempt, without jitter.
///
/// `attempt` is the 1-based number of the attempt that just failed.
pub(crate) fn base_delay(config: &ReconnectConfig, attempt: u32) -> Duration {
    let exponent = attempt.min(config.max_exponent).min(31);
    config
        .initial_delay
        .saturating_mul(1u32 << exponent)
        .min(config.max_delay)
}

pub(crate) fn calculate_backoff(config: &ReconnectConfig, attempt: u32) -> Duration {
    let base = base_delay(config, attempt);
    let max_jitter_ms = config.max_jitter.as_millis() as u64;
    if max_jitter_ms == 0 {
        return base;
    }

    let mut rng = rand::rng();
    let jitter_ms = rng.random_range(0..max_jitter_ms);
    base + Duration::from_millis(jitter_ms)
}
