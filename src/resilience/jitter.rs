//! Jitter utility for retry backoff
//!
//! Uses `fastrand` rather than hand-rolled system-time mixing so the jitter
//! distribution is actually uniform.

/// Apply +/- `fraction` jitter to a base duration, e.g. `fraction = 0.25`
/// returns something in `[base * 0.75, base * 1.25]`.
pub fn jittered(base: std::time::Duration, fraction: f64) -> std::time::Duration {
    let base_secs = base.as_secs_f64();
    let span = base_secs * fraction;
    let delta = fastrand::f64() * 2.0 * span - span;
    std::time::Duration::from_secs_f64((base_secs + delta).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn jitter_stays_in_bounds() {
        for _ in 0..200 {
            let d = jittered(Duration::from_secs(10), 0.25);
            assert!(d.as_secs_f64() >= 7.5 && d.as_secs_f64() <= 12.5);
        }
    }
}
