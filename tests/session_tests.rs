use hostpulse::{
    collect,
    error::{Result, SessionError, SystemError},
    metrics::{Formatter, MetricsProvider, PeriodicProvider, ProviderEvent, SampleReader},
    session::start_or_attach,
    SessionConfig, SessionKind, SessionRegistry, SessionState,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_test::{assert_err, assert_ok};

/// Counts provider lifecycle calls across clones.
#[derive(Clone, Default)]
struct Calls {
    created: Arc<AtomicUsize>,
    starts: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
}

impl Calls {
    fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

enum Step {
    Wait(Duration),
    Emit(ProviderEvent<u32>),
    /// Drop the sender without an error event
    Close,
}

/// Plays back a fixed script of events, then stays silent with the channel open.
struct ScriptedProvider {
    script: Vec<Step>,
    calls: Calls,
    fail_start: bool,
    task: Option<JoinHandle<()>>,
}

impl ScriptedProvider {
    fn new(script: Vec<Step>, calls: &Calls) -> Self {
        calls.created.fetch_add(1, Ordering::SeqCst);
        Self {
            script,
            calls: calls.clone(),
            fail_start: false,
            task: None,
        }
    }

    fn failing_start(calls: &Calls) -> Self {
        let mut provider = Self::new(Vec::new(), calls);
        provider.fail_start = true;
        provider
    }
}

impl MetricsProvider for ScriptedProvider {
    type Sample = u32;

    fn start(&mut self) -> Result<mpsc::Receiver<ProviderEvent<u32>>> {
        self.calls.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            return Err(SystemError::provider_error("device busy"));
        }

        let (tx, rx) = mpsc::channel(16);
        let script = std::mem::take(&mut self.script);
        self.task = Some(tokio::spawn(async move {
            for step in script {
                match step {
                    Step::Wait(delay) => time::sleep(delay).await,
                    Step::Emit(event) => {
                        if tx.send(event).await.is_err() {
                            return;
                        }
                    }
                    Step::Close => return,
                }
            }
            std::future::pending::<()>().await;
        }));
        Ok(rx)
    }

    fn stop(&mut self) {
        self.calls.stops.fetch_add(1, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// `count` samples numbered from zero, the first after `offset`, then one per `interval`.
fn emit_every(offset: Duration, interval: Duration, count: u32) -> Vec<Step> {
    let mut script = vec![Step::Wait(offset)];
    for n in 0..count {
        if n > 0 {
            script.push(Step::Wait(interval));
        }
        script.push(Step::Emit(ProviderEvent::Sample(n)));
    }
    script
}

struct Tagged;

impl Formatter for Tagged {
    type Input = u32;
    type Output = String;

    fn format(&self, sample: &u32) -> String {
        format!("sample-{}", sample)
    }
}

fn tags(range: std::ops::Range<u32>) -> Vec<String> {
    range.map(|n| format!("sample-{}", n)).collect()
}

struct Counter {
    next: u32,
}

impl SampleReader for Counter {
    type Sample = u32;

    fn read(&mut self) -> Result<u32> {
        let value = self.next;
        self.next += 1;
        Ok(value)
    }
}

#[tokio::test(start_paused = true)]
async fn test_periodic_provider_reaches_target_in_order() {
    let registry = SessionRegistry::new();
    let started = Instant::now();

    let samples = assert_ok!(
        collect(
            &registry,
            SessionKind::SYSTEM,
            SessionConfig::new(5, Duration::from_millis(10_000)),
            || Ok(PeriodicProvider::new(Counter { next: 0 }, Duration::from_millis(2_000))),
            Tagged,
        )
        .await
    );

    assert_eq!(samples.to_vec(), tags(0..5));
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(8_000), "finished after {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(10_000), "finished after {:?}", elapsed);
    assert_eq!(registry.state(&SessionKind::SYSTEM), SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_with_partial_data_succeeds() {
    let registry = SessionRegistry::new();
    let calls = Calls::default();
    let script = emit_every(Duration::from_millis(100), Duration::from_millis(100), 3);
    let provider_calls = calls.clone();
    let started = Instant::now();

    let samples = assert_ok!(
        collect(
            &registry,
            SessionKind::NETWORK,
            SessionConfig::new(10, Duration::from_millis(5_000)),
            move || Ok(ScriptedProvider::new(script, &provider_calls)),
            Tagged,
        )
        .await
    );

    assert_eq!(samples.to_vec(), tags(0..3));
    assert!(started.elapsed() >= Duration::from_millis(5_000));
    assert_eq!(calls.starts(), 1);
    assert_eq!(calls.stops(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_without_data_is_no_data() {
    let registry = SessionRegistry::new();
    let calls = Calls::default();
    let provider_calls = calls.clone();

    let err = assert_err!(
        collect(
            &registry,
            SessionKind::SYSTEM,
            SessionConfig::new(3, Duration::from_millis(2_000)),
            move || Ok(ScriptedProvider::new(Vec::new(), &provider_calls)),
            Tagged,
        )
        .await
    );

    assert_eq!(err, SessionError::NoData { elapsed_ms: 2_000 });
    assert_eq!(
        err.to_string(),
        "No data: session ended after 2000ms without collecting a sample"
    );
    assert_eq!(calls.stops(), 1);
    assert_eq!(registry.state(&SessionKind::SYSTEM), SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_provider_error_fails_immediately_without_partial_data() {
    let registry = SessionRegistry::new();
    let calls = Calls::default();
    let provider_calls = calls.clone();
    let script = vec![
        Step::Wait(Duration::from_millis(1_000)),
        Step::Emit(ProviderEvent::Sample(1)),
        Step::Wait(Duration::from_millis(500)),
        Step::Emit(ProviderEvent::Error("disk vanished".to_string())),
    ];
    let started = Instant::now();

    let err = assert_err!(
        collect(
            &registry,
            SessionKind::SYSTEM,
            SessionConfig::new(5, Duration::from_millis(10_000)),
            move || Ok(ScriptedProvider::new(script, &provider_calls)),
            Tagged,
        )
        .await
    );

    assert_eq!(err, SessionError::ProviderStream("disk vanished".to_string()));
    assert!(started.elapsed() < Duration::from_millis(10_000));
    assert_eq!(calls.stops(), 1);
    assert_eq!(registry.state(&SessionKind::SYSTEM), SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_closed_channel_is_a_provider_failure() {
    let registry = SessionRegistry::new();
    let calls = Calls::default();
    let provider_calls = calls.clone();
    let script = vec![Step::Emit(ProviderEvent::Sample(7)), Step::Close];

    let err = assert_err!(
        collect(
            &registry,
            SessionKind::SYSTEM,
            SessionConfig::new(5, Duration::from_millis(10_000)),
            move || Ok(ScriptedProvider::new(script, &provider_calls)),
            Tagged,
        )
        .await
    );

    assert!(matches!(err, SessionError::ProviderStream(_)));
    assert_eq!(calls.stops(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_config_never_starts_provider() {
    let registry: SessionRegistry<String> = SessionRegistry::new();
    let calls = Calls::default();

    for config in [
        SessionConfig::new(0, Duration::from_millis(1_000)),
        SessionConfig::new(5, Duration::ZERO),
    ] {
        let provider_calls = calls.clone();
        let err = assert_err!(
            collect(
                &registry,
                SessionKind::SYSTEM,
                config,
                move || Ok(ScriptedProvider::new(Vec::new(), &provider_calls)),
                Tagged,
            )
            .await
        );
        assert!(matches!(err, SessionError::InvalidConfig(_)));
    }

    assert_eq!(calls.created(), 0);
    assert_eq!(calls.starts(), 0);
    assert_eq!(registry.active_sessions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_provider_construction_failure() {
    let registry: SessionRegistry<String> = SessionRegistry::new();

    let err = assert_err!(
        collect(
            &registry,
            SessionKind::NETWORK,
            SessionConfig::new(5, Duration::from_millis(1_000)),
            || -> Result<ScriptedProvider> { Err(SystemError::system_error("no interfaces")) },
            Tagged,
        )
        .await
    );

    assert!(matches!(err, SessionError::ProviderInit(_)));
    assert_eq!(registry.state(&SessionKind::NETWORK), SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_provider_start_failure_still_stops_once() {
    let registry = SessionRegistry::new();
    let calls = Calls::default();
    let provider_calls = calls.clone();

    let err = assert_err!(
        collect(
            &registry,
            SessionKind::SYSTEM,
            SessionConfig::new(5, Duration::from_millis(1_000)),
            move || Ok(ScriptedProvider::failing_start(&provider_calls)),
            Tagged,
        )
        .await
    );

    assert!(matches!(
        err,
        SessionError::ProviderInit(ref message) if message.contains("device busy")
    ));
    assert_eq!(calls.starts(), 1);
    assert_eq!(calls.stops(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_callers_share_one_session() {
    let registry = SessionRegistry::new();
    let calls = Calls::default();
    let config = SessionConfig::new(3, Duration::from_millis(10_000));

    let first_calls = calls.clone();
    let second_calls = calls.clone();
    let (first, second) = tokio::join!(
        collect(
            &registry,
            SessionKind::SYSTEM,
            config,
            move || {
                Ok(ScriptedProvider::new(
                    emit_every(Duration::from_millis(500), Duration::from_millis(500), 3),
                    &first_calls,
                ))
            },
            Tagged,
        ),
        collect(
            &registry,
            SessionKind::SYSTEM,
            config,
            move || {
                Ok(ScriptedProvider::new(
                    emit_every(Duration::from_millis(500), Duration::from_millis(500), 3),
                    &second_calls,
                ))
            },
            Tagged,
        ),
    );

    let first = assert_ok!(first);
    let second = assert_ok!(second);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.to_vec(), tags(0..3));
    assert_eq!(calls.created(), 1);
    assert_eq!(calls.starts(), 1);
    assert_eq!(calls.stops(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_kinds_run_independently() {
    let registry = SessionRegistry::new();
    let calls = Calls::default();
    let config = SessionConfig::new(2, Duration::from_millis(5_000));

    let system_calls = calls.clone();
    let network_calls = calls.clone();
    let (system, network) = tokio::join!(
        collect(
            &registry,
            SessionKind::SYSTEM,
            config,
            move || {
                Ok(ScriptedProvider::new(
                    emit_every(Duration::from_millis(100), Duration::from_millis(100), 2),
                    &system_calls,
                ))
            },
            Tagged,
        ),
        collect(
            &registry,
            SessionKind::NETWORK,
            config,
            move || {
                Ok(ScriptedProvider::new(
                    emit_every(Duration::from_millis(200), Duration::from_millis(200), 2),
                    &network_calls,
                ))
            },
            Tagged,
        ),
    );

    assert_eq!(assert_ok!(system).len(), 2);
    assert_eq!(assert_ok!(network).len(), 2);
    assert_eq!(calls.starts(), 2);
    assert_eq!(calls.stops(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_completed_session_is_not_reused() {
    let registry = SessionRegistry::new();
    let calls = Calls::default();
    let config = SessionConfig::new(1, Duration::from_millis(1_000));

    for _ in 0..2 {
        let provider_calls = calls.clone();
        assert_ok!(
            collect(
                &registry,
                SessionKind::SYSTEM,
                config,
                move || {
                    Ok(ScriptedProvider::new(
                        vec![Step::Emit(ProviderEvent::Sample(0))],
                        &provider_calls,
                    ))
                },
                Tagged,
            )
            .await
        );
    }

    assert_eq!(calls.starts(), 2);
    assert_eq!(calls.stops(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_returns_samples_collected_so_far() {
    let registry = SessionRegistry::new();
    let calls = Calls::default();
    let provider_calls = calls.clone();

    let handle = start_or_attach(
        &registry,
        SessionKind::HISTORY,
        SessionConfig::sliding(10, Duration::from_millis(60_000)),
        move || {
            Ok(ScriptedProvider::new(
                emit_every(Duration::from_millis(1_000), Duration::from_millis(1_000), 100),
                &provider_calls,
            ))
        },
        Tagged,
    );
    assert_eq!(handle.state(), SessionState::Running);

    time::sleep(Duration::from_millis(3_500)).await;
    assert!(registry.cancel(&SessionKind::HISTORY));

    let samples = assert_ok!(handle.wait().await);
    assert_eq!(samples.to_vec(), tags(0..3));
    assert_eq!(handle.state(), SessionState::Completed);
    assert_eq!(calls.stops(), 1);
    assert!(!registry.cancel(&SessionKind::HISTORY));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_first_sample_reports_elapsed_time() {
    let registry = SessionRegistry::new();
    let calls = Calls::default();
    let provider_calls = calls.clone();

    let handle = start_or_attach(
        &registry,
        SessionKind::HISTORY,
        SessionConfig::sliding(10, Duration::from_millis(60_000)),
        move || {
            Ok(ScriptedProvider::new(
                emit_every(Duration::from_millis(10_000), Duration::from_millis(1_000), 5),
                &provider_calls,
            ))
        },
        Tagged,
    );

    time::sleep(Duration::from_millis(2_000)).await;
    assert!(registry.cancel(&SessionKind::HISTORY));

    let err = assert_err!(handle.wait().await);
    assert_eq!(err, SessionError::NoData { elapsed_ms: 2_000 });
    assert!(!err.to_string().contains("60000"));
    assert_eq!(calls.stops(), 1);
}

/// Blocks the calling thread for `delay` on every read.
struct SlowReader {
    delay: Duration,
}

impl SampleReader for SlowReader {
    type Sample = u32;

    fn read(&mut self) -> Result<u32> {
        std::thread::sleep(self.delay);
        Ok(1)
    }
}

// Real clock on the single-threaded runtime: a read that blocked the runtime
// would hold the deadline back until it returned.
#[tokio::test]
async fn test_blocking_reader_does_not_overrun_deadline() {
    let registry = SessionRegistry::new();
    let started = Instant::now();

    let err = assert_err!(
        collect(
            &registry,
            SessionKind::SYSTEM,
            SessionConfig::new(10, Duration::from_millis(200)),
            || {
                Ok(PeriodicProvider::new(
                    SlowReader { delay: Duration::from_millis(1_500) },
                    Duration::from_millis(10),
                ))
            },
            Tagged,
        )
        .await
    );

    let elapsed = started.elapsed();
    assert!(elapsed < Duration::from_millis(700), "finished after {:?}", elapsed);
    // The first read only completes after the deadline and must not count
    assert!(matches!(err, SessionError::NoData { elapsed_ms } if elapsed_ms >= 200));
    assert_eq!(registry.state(&SessionKind::SYSTEM), SessionState::Idle);
}

#[tokio::test]
async fn test_slow_provider_construction_counts_against_deadline() {
    let registry = SessionRegistry::new();
    let calls = Calls::default();
    let provider_calls = calls.clone();
    let started = Instant::now();

    let err = assert_err!(
        collect(
            &registry,
            SessionKind::NETWORK,
            SessionConfig::new(3, Duration::from_millis(200)),
            move || {
                std::thread::sleep(Duration::from_millis(1_500));
                Ok(ScriptedProvider::new(Vec::new(), &provider_calls))
            },
            Tagged,
        )
        .await
    );

    let elapsed = started.elapsed();
    assert!(elapsed < Duration::from_millis(700), "finished after {:?}", elapsed);
    assert!(matches!(err, SessionError::NoData { .. }));
    assert_eq!(calls.starts(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_slide_mode_keeps_latest_samples() {
    let registry = SessionRegistry::new();
    let calls = Calls::default();
    let provider_calls = calls.clone();

    let samples = assert_ok!(
        collect(
            &registry,
            SessionKind::HISTORY,
            SessionConfig::sliding(3, Duration::from_millis(10_000)),
            move || {
                Ok(ScriptedProvider::new(
                    emit_every(Duration::from_millis(300), Duration::from_millis(1_000), 50),
                    &provider_calls,
                ))
            },
            Tagged,
        )
        .await
    );

    // Samples arrive at 0.3s, 1.3s, ..., 9.3s
    assert_eq!(samples.to_vec(), tags(7..10));
}

struct PanicsOnTwo;

impl Formatter for PanicsOnTwo {
    type Input = u32;
    type Output = u32;

    fn format(&self, sample: &u32) -> u32 {
        assert_ne!(*sample, 2, "formatter rejected sample");
        *sample
    }
}

#[tokio::test(start_paused = true)]
async fn test_panicking_session_aborts_waiters() {
    let registry = SessionRegistry::new();
    let calls = Calls::default();
    let provider_calls = calls.clone();

    let err = assert_err!(
        collect(
            &registry,
            SessionKind::SYSTEM,
            SessionConfig::new(5, Duration::from_millis(10_000)),
            move || {
                Ok(ScriptedProvider::new(
                    emit_every(Duration::from_millis(100), Duration::from_millis(100), 5),
                    &provider_calls,
                ))
            },
            PanicsOnTwo,
        )
        .await
    );

    assert_eq!(err, SessionError::Aborted);
    assert_eq!(registry.state(&SessionKind::SYSTEM), SessionState::Idle);
}
