//! Integration tests for the sampling scheduler and replay semantics.
//!
//! These run on tokio's paused clock so interval behavior is exercised
//! deterministically without real waiting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sysvitals::config::PollConfig;
use sysvitals::error::CollectorError;
use sysvitals::sampler::{start_sampling, SamplerOptions, StreamStatus};

fn poll_config(history_depth: usize, interval_ms: u64) -> PollConfig {
    PollConfig {
        enabled: true,
        history_depth,
        interval_ms,
    }
}

/// Measurement returning 1, 2, 3, ... across invocations.
fn counting_measure() -> (
    Arc<AtomicU64>,
    impl FnMut() -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<u64, CollectorError>> + Send>,
    > + Send
        + 'static,
) {
    let calls = Arc::new(AtomicU64::new(0));
    let counter = calls.clone();
    let measure = move || {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        Box::pin(async move { Ok(n) })
            as std::pin::Pin<
                Box<dyn std::future::Future<Output = Result<u64, CollectorError>> + Send>,
            >
    };
    (calls, measure)
}

#[tokio::test(start_paused = true)]
async fn test_eager_first_sample_arrives_before_first_interval() {
    let (_, measure) = counting_measure();
    let start = tokio::time::Instant::now();

    let stream = start_sampling(
        "eager",
        &poll_config(5, 60_000),
        SamplerOptions::default(),
        measure,
    );
    let mut sub = stream.subscribe();

    let first = sub.next().await.expect("stream open").expect("sample");
    assert_eq!(first, 1);
    assert!(start.elapsed() < Duration::from_millis(60_000));
}

#[tokio::test(start_paused = true)]
async fn test_bounded_history_replayed_to_late_subscriber() {
    let (_, measure) = counting_measure();
    let stream = start_sampling(
        "bounded",
        &poll_config(3, 100),
        SamplerOptions::default(),
        measure,
    );

    // Drain six samples (eager + five ticks) through a live subscriber.
    let mut live = stream.subscribe();
    for expected in 1..=6u64 {
        let got = live.next().await.expect("stream open").expect("sample");
        assert_eq!(got, expected);
    }

    // A new subscriber receives exactly the three most recent samples,
    // oldest first, and nothing else until the next tick.
    let mut late = stream.subscribe();
    for expected in 4..=6u64 {
        let got = late.next().await.expect("stream open").expect("sample");
        assert_eq!(got, expected);
    }
    assert!(late.try_next().is_none());
    assert_eq!(stream.backlog_len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_failure_terminates_stream_permanently() {
    let calls = Arc::new(AtomicU64::new(0));
    let counter = calls.clone();
    let measure = move || {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            if n < 3 {
                Ok(n)
            } else {
                Err(CollectorError::probe("sensor gone"))
            }
        }
    };

    let stream = start_sampling(
        "fatal",
        &poll_config(5, 100),
        SamplerOptions::default(),
        measure,
    );
    let mut sub = stream.subscribe();

    assert_eq!(sub.next().await, Some(Ok(1)));
    assert_eq!(sub.next().await, Some(Ok(2)));
    assert_eq!(
        sub.next().await,
        Some(Err(CollectorError::probe("sensor gone")))
    );
    // The failure is delivered exactly once; afterwards the stream ends.
    assert_eq!(sub.next().await, None);
    assert_eq!(stream.status(), StreamStatus::Failed);

    // Subscribers joining after the failure receive only the failure.
    let mut late = stream.subscribe();
    assert_eq!(
        late.next().await,
        Some(Err(CollectorError::probe("sensor gone")))
    );
    assert_eq!(late.next().await, None);

    // The scheduler stops: no further measurements are attempted.
    let calls_at_failure = calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert_eq!(calls.load(Ordering::SeqCst), calls_at_failure);
}

#[tokio::test(start_paused = true)]
async fn test_eager_failure_is_never_retried() {
    let calls = Arc::new(AtomicU64::new(0));
    let counter = calls.clone();
    let measure = move || {
        counter.fetch_add(1, Ordering::SeqCst);
        async move { Err::<u64, _>(CollectorError::probe("broken")) }
    };

    let stream = start_sampling(
        "broken",
        &poll_config(5, 100),
        SamplerOptions::default(),
        measure,
    );
    let mut sub = stream.subscribe();
    assert_eq!(sub.next().await, Some(Err(CollectorError::probe("broken"))));

    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_disabled_metric_never_emits_and_never_fails() {
    let (calls, measure) = counting_measure();
    let config = PollConfig {
        enabled: false,
        history_depth: 5,
        interval_ms: 100,
    };

    let stream = start_sampling("disabled", &config, SamplerOptions::default(), measure);
    let mut sub = stream.subscribe();

    tokio::time::sleep(Duration::from_millis(10_000)).await;

    assert!(sub.try_next().is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(stream.status(), StreamStatus::Disabled);
}

#[tokio::test(start_paused = true)]
async fn test_failed_metric_does_not_affect_others() {
    let failing = move || async move { Err::<u64, _>(CollectorError::probe("dead")) };
    let (_, healthy) = counting_measure();

    let dead = start_sampling(
        "dead",
        &poll_config(5, 100),
        SamplerOptions::default(),
        failing,
    );
    let alive = start_sampling(
        "alive",
        &poll_config(5, 100),
        SamplerOptions::default(),
        healthy,
    );

    let mut dead_sub = dead.subscribe();
    assert_eq!(
        dead_sub.next().await,
        Some(Err(CollectorError::probe("dead")))
    );

    // The healthy stream keeps emitting on schedule.
    let mut alive_sub = alive.subscribe();
    for expected in 1..=4u64 {
        let got = alive_sub.next().await.expect("stream open").expect("sample");
        assert_eq!(got, expected);
    }
    assert_eq!(alive.status(), StreamStatus::Active);
    assert_eq!(dead.status(), StreamStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_hung_measurement_does_not_block_later_polls() {
    // The first (eager) measurement never resolves; interval polls must
    // keep producing results regardless.
    let calls = Arc::new(AtomicU64::new(0));
    let counter = calls.clone();
    let measure = move || {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            if n == 1 {
                std::future::pending::<()>().await;
                unreachable!();
            }
            Ok(n)
        }
    };

    let stream = start_sampling(
        "hung",
        &poll_config(5, 100),
        SamplerOptions::default(),
        measure,
    );
    let mut sub = stream.subscribe();

    // First delivered sample comes from the second invocation.
    assert_eq!(sub.next().await, Some(Ok(2)));
    assert_eq!(sub.next().await, Some(Ok(3)));
}

#[tokio::test(start_paused = true)]
async fn test_deferred_start_waits_for_first_tick() {
    let (calls, measure) = counting_measure();
    let options = SamplerOptions {
        eager_first_sample: false,
        ..SamplerOptions::default()
    };

    let stream = start_sampling("deferred", &poll_config(1, 1_000), options, measure);
    let mut sub = stream.subscribe();

    // Nothing is measured until the first interval elapses.
    assert!(sub.try_next().is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let start = tokio::time::Instant::now();
    assert_eq!(sub.next().await, Some(Ok(1)));
    assert!(start.elapsed() >= Duration::from_millis(1_000));
}
