use tokio::task::JoinHandle;

use crate::config::ProgressConfig;

pub const PROGRESS_CEILING: u8 = 99;

/// Next value of the simulated progress curve: close `fraction` of the
/// remaining gap to 100, never passing [`PROGRESS_CEILING`].
pub fn next_progress(current: f32, fraction: f32) -> f32 {
    let next = current + (100.0 - current) * fraction;
    next.min(PROGRESS_CEILING as f32)
}

/// Cosmetic progress animation for one pipeline stage.
///
/// The background task lives exactly as long as this value: dropping it (on
/// success, failure or teardown) aborts the task.
pub struct ProgressTicker {
    handle: JoinHandle<()>,
}

impl ProgressTicker {
    pub fn start<F>(config: &ProgressConfig, mut report: F) -> Self
    where
        F: FnMut(u8) + Send + 'static,
    {
        let tick = config.tick;
        let fraction = config.fraction.clamp(0.0, 1.0);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            // the first tick completes immediately
            interval.tick().await;

            let mut current = 0.0_f32;
            loop {
                interval.tick().await;
                current = next_progress(current, fraction);
                report(current as u8);
            }
        });

        Self { handle }
    }

    pub fn stop(self) {}
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<u8>>>, impl FnMut(u8) + Send + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |p| sink.lock().unwrap().push(p))
    }

    #[test]
    fn curve_is_capped_below_completion() {
        let mut p = 0.0;
        for _ in 0..1_000 {
            let next = next_progress(p, 0.3);
            assert!(next >= p);
            p = next;
        }
        assert_eq!(p, PROGRESS_CEILING as f32);
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_advances_monotonically_and_stops_at_ceiling() {
        let config = ProgressConfig {
            tick: Duration::from_millis(100),
            fraction: 0.5,
        };
        let (seen, sink) = recorder();
        let ticker = ProgressTicker::start(&config, sink);

        tokio::time::sleep(Duration::from_secs(5)).await;
        ticker.stop();

        let seen = seen.lock().unwrap();
        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*seen.last().unwrap(), PROGRESS_CEILING);
        assert_eq!(seen[0], 50);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_ticker_stops_updates() {
        let config = ProgressConfig {
            tick: Duration::from_millis(100),
            fraction: 0.1,
        };
        let (seen, sink) = recorder();
        let ticker = ProgressTicker::start(&config, sink);

        tokio::time::sleep(Duration::from_millis(350)).await;
        drop(ticker);
        let count = seen.lock().unwrap().len();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(seen.lock().unwrap().len(), count);
    }
}
