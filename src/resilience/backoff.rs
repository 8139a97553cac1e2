//! Exponential backoff with optional jitter.

use rand::Rng;
use std::time::Duration;

/// Delay before the retry that follows failed attempt `attempt` (1-indexed).
///
/// `min(max, base * factor^(attempt - 1))`, so the first retry waits `base`.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration, factor: f64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
    let delay_ms = base.as_millis() as f64 * factor.max(1.0).powi(exponent);
    let max_ms = max.as_millis() as f64;

    // Infinity and overflow both clamp to the cap.
    if !delay_ms.is_finite() || delay_ms >= max_ms {
        return max;
    }
    Duration::from_millis(delay_ms as u64)
}

/// Widen `delay` by a random amount in `[0, delay * ratio)`.
pub fn apply_jitter(delay: Duration, ratio: f64) -> Duration {
    if ratio <= 0.0 {
        return delay;
    }

    let jitter_range = (delay.as_millis() as f64 * ratio.min(1.0)) as u64;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    delay + Duration::from_millis(jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_from_base() {
        let base = Duration::from_millis(1000);
        let max = Duration::from_secs(30);

        assert_eq!(calculate_backoff(1, base, max, 2.0), Duration::from_millis(1000));
        assert_eq!(calculate_backoff(2, base, max, 2.0), Duration::from_millis(2000));
        assert_eq!(calculate_backoff(3, base, max, 2.0), Duration::from_millis(4000));
    }

    #[test]
    fn test_backoff_capped_at_max() {
        let base = Duration::from_millis(1000);
        let max = Duration::from_millis(3000);

        assert_eq!(calculate_backoff(3, base, max, 2.0), max);
        assert_eq!(calculate_backoff(200, base, max, 2.0), max);
    }

    #[test]
    fn test_factor_below_one_is_flat() {
        let base = Duration::from_millis(250);
        assert_eq!(
            calculate_backoff(4, base, Duration::from_secs(5), 0.5),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let delay = Duration::from_millis(1000);
        for _ in 0..50 {
            let jittered = apply_jitter(delay, 0.1);
            assert!(jittered >= delay);
            assert!(jittered < Duration::from_millis(1100));
        }
        assert_eq!(apply_jitter(delay, 0.0), delay);
    }
}
