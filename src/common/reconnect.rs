//! Reconnect pacing for the MQTT event loops.

use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};

/// Upper bound on the reconnect delay, also used if the backoff iterator
/// is ever exhausted.
pub const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

/// Create an exponential backoff iterator for MQTT reconnection.
/// 1s initial, 60s max, factor 2, with jitter, unlimited retries.
pub fn mqtt_backoff() -> impl Iterator<Item = Duration> {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(MAX_RECONNECT_DELAY)
        .with_factor(2.0)
        .with_jitter()
        .without_max_times()
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_never_runs_dry() {
        let delays: Vec<_> = mqtt_backoff().take(50).collect();
        assert_eq!(delays.len(), 50);
    }

    #[test]
    fn backoff_stays_within_bounds() {
        for delay in mqtt_backoff().take(50) {
            assert!(delay >= Duration::from_secs(1));
            // Jitter may add up to one extra step on top of the cap.
            assert!(delay <= MAX_RECONNECT_DELAY * 2);
        }
    }
}
