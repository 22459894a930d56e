//! Interval-driven metrics provider.

use crate::error::{Result, SystemError};
use crate::metrics::traits::{MetricsProvider, ProviderEvent, SampleReader};
use futures_util::stream::{self, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{self, JoinHandle};
use tokio::time::{self, MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, warn};

const EVENT_BUFFER: usize = 16;

/// Runs a [`SampleReader`] once per tick on the blocking pool and emits each
/// reading as a [`ProviderEvent`]. The first tick fires immediately.
pub struct PeriodicProvider<R: SampleReader> {
    reader: Option<R>,
    interval: Duration,
    task: Option<JoinHandle<()>>,
}

impl<R: SampleReader> PeriodicProvider<R> {
    pub fn new(reader: R, interval: Duration) -> Self {
        Self {
            reader: Some(reader),
            interval,
            task: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl<R: SampleReader> MetricsProvider for PeriodicProvider<R> {
    type Sample = R::Sample;

    fn start(&mut self) -> Result<mpsc::Receiver<ProviderEvent<R::Sample>>> {
        if self.interval.is_zero() {
            return Err(SystemError::config_error(
                "provider interval must be greater than zero",
            ));
        }
        let reader = self
            .reader
            .take()
            .ok_or_else(|| SystemError::provider_error("provider was already started"))?;

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Reads run on the blocking pool. The reader moves into the blocking
        // task and back; a panic there ends the stream.
        let readings = stream::unfold(
            (Some(reader), IntervalStream::new(ticker)),
            |(reader, mut ticks)| async move {
                let mut reader = reader?;
                ticks.next().await?;
                let joined = task::spawn_blocking(move || {
                    let reading = reader.read();
                    (reader, reading)
                })
                .await;
                match joined {
                    Ok((reader, reading)) => Some((reading, (Some(reader), ticks))),
                    Err(err) => {
                        let message = format!("reader task failed: {}", err);
                        Some((Err(SystemError::provider_error(message)), (None, ticks)))
                    }
                }
            },
        );

        self.task = Some(tokio::spawn(async move {
            tokio::pin!(readings);
            while let Some(reading) = readings.next().await {
                match reading {
                    Ok(sample) => {
                        if tx.send(ProviderEvent::Sample(sample)).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!("Metrics provider read failed: {}", err);
                        let _ = tx.send(ProviderEvent::Error(err.to_string())).await;
                        break;
                    }
                }
            }
        }));
        debug!(interval_ms = self.interval.as_millis() as u64, "Metrics provider started");

        Ok(rx)
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Metrics provider stopped");
        }
    }
}

impl<R: SampleReader> Drop for PeriodicProvider<R> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        next: u32,
        fail_at: Option<u32>,
    }

    impl SampleReader for Counter {
        type Sample = u32;

        fn read(&mut self) -> Result<u32> {
            if Some(self.next) == self.fail_at {
                return Err(SystemError::system_error("sensor unplugged"));
            }
            self.next += 1;
            Ok(self.next)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_emits_samples_in_order() {
        let mut provider = PeriodicProvider::new(
            Counter { next: 0, fail_at: None },
            Duration::from_millis(500),
        );
        let mut rx = provider.start().unwrap();

        for expected in 1..=3 {
            assert_eq!(rx.recv().await, Some(ProviderEvent::Sample(expected)));
        }
        provider.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_failure_is_terminal() {
        let mut provider = PeriodicProvider::new(
            Counter { next: 0, fail_at: Some(1) },
            Duration::from_millis(100),
        );
        let mut rx = provider.start().unwrap();

        assert_eq!(rx.recv().await, Some(ProviderEvent::Sample(1)));
        match rx.recv().await {
            Some(ProviderEvent::Error(msg)) => assert!(msg.contains("sensor unplugged")),
            other => panic!("expected error event, got {:?}", other),
        }
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_is_rejected() {
        let mut provider = PeriodicProvider::new(
            Counter { next: 0, fail_at: None },
            Duration::from_millis(100),
        );
        let _rx = provider.start().unwrap();
        assert!(provider.start().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_closes_channel_and_is_idempotent() {
        let mut provider = PeriodicProvider::new(
            Counter { next: 0, fail_at: None },
            Duration::from_millis(100),
        );
        let mut rx = provider.start().unwrap();
        assert!(matches!(rx.recv().await, Some(ProviderEvent::Sample(1))));

        provider.stop();
        provider.stop();
        while let Some(event) = rx.recv().await {
            assert!(matches!(event, ProviderEvent::Sample(_)));
        }
    }

    struct Faulty;

    impl SampleReader for Faulty {
        type Sample = u32;

        fn read(&mut self) -> Result<u32> {
            panic!("driver crashed");
        }
    }

    #[tokio::test]
    async fn test_panicking_reader_ends_stream() {
        let mut provider = PeriodicProvider::new(Faulty, Duration::from_millis(10));
        let mut rx = provider.start().unwrap();

        match rx.recv().await {
            Some(ProviderEvent::Error(msg)) => assert!(msg.contains("reader task failed")),
            other => panic!("expected error event, got {:?}", other),
        }
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_zero_interval_is_rejected() {
        let mut provider =
            PeriodicProvider::new(Counter { next: 0, fail_at: None }, Duration::ZERO);
        assert!(matches!(provider.start(), Err(SystemError::Config(_))));
    }
}
