//! Exponential backoff with jitter for task-level retries (spec §4.1
//! "Failure semantics", supplement #2).
//!
//! Grounded on `kernel/ai_matching.rs`'s `RETRY_DELAY_MS * retries` retry
//! helper, generalized from linear to `base * 2^retry_count + jitter`,
//! capped at `retry_backoff_cap_ms`.

use chrono::{DateTime, Duration as ChronoDuration, Utc};

/// Computes the delay in milliseconds before a task at `retry_count` may be
/// retried. `retry_count` is the count *after* this failure (1 on the first
/// retry). Jitter is `[0, base_ms)` added on top of the exponential term, so
/// two tasks failing at the same instant don't retry in lockstep.
pub fn backoff_delay_ms(retry_count: u32, base_ms: u64, cap_ms: u64) -> u64 {
    let exp = base_ms.saturating_mul(1u64 << retry_count.min(20));
    let jitter = if base_ms == 0 { 0 } else { fastrand::u64(0..base_ms) };
    exp.saturating_add(jitter).min(cap_ms)
}

/// Convenience wrapper returning the not-before timestamp for a retry,
/// given `now`.
pub fn not_before(now: DateTime<Utc>, retry_count: u32, base_ms: u64, cap_ms: u64) -> DateTime<Utc> {
    now + ChronoDuration::milliseconds(backoff_delay_ms(retry_count, base_ms, cap_ms) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_with_retry_count() {
        let d1 = backoff_delay_ms(1, 1000, 300_000);
        let d3 = backoff_delay_ms(3, 1000, 300_000);
        assert!(d3 >= d1);
    }

    #[test]
    fn delay_never_exceeds_cap() {
        let d = backoff_delay_ms(20, 1000, 5_000);
        assert!(d <= 5_000);
    }

    #[test]
    fn not_before_is_after_now() {
        let now = Utc::now();
        let nb = not_before(now, 2, 1000, 60_000);
        assert!(nb > now);
    }
}
