//! Explicit backoff schedule for refresh retries.
//!
//! The schedule is a pure attempt → delay function consumed by the health
//! loop; nothing in the request path ever sleeps on it.

use std::time::Duration;

/// Delay before retry number `attempt` (1-based): base doubled per attempt,
/// capped.
pub(crate) fn delay_for_attempt(attempt: u32, base_ms: u64, cap_ms: u64) -> Duration {
    let exponent = attempt.saturating_sub(1).min(20);
    let ms = base_ms.saturating_mul(1u64 << exponent).min(cap_ms.max(base_ms));
    Duration::from_millis(ms)
}

/// Add up to 25% random jitter so a batch of failed accounts does not retry
/// in lockstep.
pub(crate) fn with_jitter(delay: Duration) -> Duration {
    use rand::Rng;
    let ms = delay.as_millis() as u64;
    let jitter = if ms == 0 { 0 } else { rand::thread_rng().gen_range(0..=ms / 4) };
    Duration::from_millis(ms + jitter)
}
