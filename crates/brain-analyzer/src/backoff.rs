use rand::Rng;
use std::time::Duration;

/// Exponential backoff with full jitter (§4.4): `delay = random(0,
/// min(max_delay, base * 2^attempt))`. `attempt` is zero-based; the
/// first retry (attempt 0) is drawn from `[0, base]`.
pub fn backoff(attempt: u32, base: Duration, max_delay: Duration) -> Duration {
    let exp = 2f64.powi(attempt as i32);
    let capped_ms = (base.as_millis() as f64 * exp).min(max_delay.as_millis() as f64);
    let jittered_ms = rand::thread_rng().gen_range(0.0..=capped_ms);
    Duration::from_millis(jittered_ms as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_exceeds_max_delay() {
        let max = Duration::from_secs(30);
        for attempt in 0..10 {
            let d = backoff(attempt, Duration::from_millis(500), max);
            assert!(d <= max);
        }
    }

    #[test]
    fn first_attempt_is_bounded_by_base() {
        for _ in 0..50 {
            let d = backoff(0, Duration::from_millis(500), Duration::from_secs(30));
            assert!(d <= Duration::from_millis(500));
        }
    }
}
