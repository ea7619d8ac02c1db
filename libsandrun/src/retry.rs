//! Generic "retry until deadline" helper, used for gofer teardown and
//! post-root-wait stabilization.

use std::time::{Duration, Instant};

/// Calls `step` repeatedly, sleeping `backoff` between attempts, until it
/// returns `true` or `deadline` elapses. Returns whether it succeeded.
pub fn retry_until<F: FnMut() -> bool>(mut step: F, backoff: Duration, deadline: Duration) -> bool {
    let start = Instant::now();
    loop {
        if step() {
            return true;
        }
        if start.elapsed() >= deadline {
            return false;
        }
        std::thread::sleep(backoff);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn succeeds_once_condition_is_true() {
        let mut calls = 0;
        let ok = retry_until(
            || {
                calls += 1;
                calls >= 3
            },
            Duration::from_millis(1),
            Duration::from_millis(100),
        );
        assert!(ok);
        assert_eq!(calls, 3);
    }

    #[test]
    fn gives_up_after_deadline() {
        let ok = retry_until(|| false, Duration::from_millis(1), Duration::from_millis(10));
        assert!(!ok);
    }
}
