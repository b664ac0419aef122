//! Interval-driven sampling scheduler feeding replay buffers.
//!
//! `start_sampling` turns an asynchronous measurement function into a
//! shared, bounded-history broadcast stream: one eager measurement at
//! startup, then one per interval tick. Results enter the buffer in
//! completion order. A measurement failure is fatal for that one stream;
//! the scheduler stops and every subscriber observes the failure once.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::config::PollConfig;
use crate::error::CollectorError;
use crate::replay::{ReplayBuffer, Subscription};

/// How the scheduler treats a tick that fires while a measurement is
/// still in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapPolicy {
    /// Start a new measurement regardless; results arrive in completion
    /// order. This is the default.
    Concurrent,
    /// Await each measurement before honoring the next tick. Required for
    /// collectors that own mutable baseline state (network), where two
    /// in-flight measurements of the same metric would race.
    SingleFlight,
}

/// Scheduler behavior knobs.
#[derive(Debug, Clone, Copy)]
pub struct SamplerOptions {
    pub policy: OverlapPolicy,
    /// Run one measurement immediately at startup instead of waiting for
    /// the first interval tick. Disabled for expensive measurements such
    /// as speed tests.
    pub eager_first_sample: bool,
}

impl Default for SamplerOptions {
    fn default() -> Self {
        Self {
            policy: OverlapPolicy::Concurrent,
            eager_first_sample: true,
        }
    }
}

/// Lifecycle state of a metric stream, as reported by the health surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// The metric is disabled; the stream never emits and never fails.
    Disabled,
    /// The stream is live and accepting samples.
    Active,
    /// A measurement failed; the stream is terminally dead.
    Failed,
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamStatus::Disabled => write!(f, "disabled"),
            StreamStatus::Active => write!(f, "active"),
            StreamStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Handle to one metric's sampled stream.
///
/// Cheap to share; every subscription is served from the same underlying
/// buffer, so adding consumers never re-triggers measurement work.
pub struct MetricStream<T> {
    name: String,
    enabled: bool,
    buffer: Arc<ReplayBuffer<T>>,
}

impl<T: Clone> MetricStream<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Subscribes to the stream: current backlog first, live updates after.
    pub fn subscribe(&self) -> Subscription<T> {
        self.buffer.subscribe()
    }

    pub fn status(&self) -> StreamStatus {
        if !self.enabled {
            StreamStatus::Disabled
        } else if self.buffer.is_failed() {
            StreamStatus::Failed
        } else {
            StreamStatus::Active
        }
    }

    /// Number of samples currently held for replay.
    pub fn backlog_len(&self) -> usize {
        self.buffer.len()
    }
}

/// Starts the sampling loop for one metric and returns its stream handle.
///
/// A disabled config yields an inert stream that never emits and never
/// completes. Otherwise `measure` is invoked once immediately (unless
/// `eager_first_sample` is off) and then once per `interval_ms`. The
/// first successful sample is logged; the first failure terminates the
/// stream.
pub fn start_sampling<T, F, Fut>(
    name: &str,
    config: &PollConfig,
    options: SamplerOptions,
    mut measure: F,
) -> MetricStream<T>
where
    T: Clone + fmt::Debug + Send + Sync + 'static,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, CollectorError>> + Send + 'static,
{
    let buffer = Arc::new(ReplayBuffer::new(config.history_depth));
    let stream = MetricStream {
        name: name.to_string(),
        enabled: config.enabled,
        buffer: buffer.clone(),
    };

    if !config.enabled {
        debug!("metric [{}] disabled, stream stays inert", name);
        return stream;
    }

    let interval = Duration::from_millis(config.interval_ms.max(1));
    let name = name.to_string();

    tokio::spawn(async move {
        if options.eager_first_sample {
            match options.policy {
                // The eager sample must not delay the interval timer, so it
                // runs as its own task while the loop below starts ticking.
                OverlapPolicy::Concurrent => {
                    let fut = measure();
                    let buffer = buffer.clone();
                    let name = name.clone();
                    tokio::spawn(async move {
                        settle(&name, &buffer, fut.await, true);
                    });
                }
                OverlapPolicy::SingleFlight => {
                    settle(&name, &buffer, measure().await, true);
                    if buffer.is_failed() {
                        return;
                    }
                }
            }
        }

        // First tick one full interval from now; the eager sample already
        // covered t=0.
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if buffer.is_failed() {
                break;
            }

            match options.policy {
                OverlapPolicy::Concurrent => {
                    let fut = measure();
                    let buffer = buffer.clone();
                    let name = name.clone();
                    tokio::spawn(async move {
                        settle(&name, &buffer, fut.await, false);
                    });
                }
                OverlapPolicy::SingleFlight => {
                    settle(&name, &buffer, measure().await, false);
                    if buffer.is_failed() {
                        break;
                    }
                }
            }
        }
    });

    stream
}

/// Routes one measurement result into the buffer.
fn settle<T: Clone + fmt::Debug>(
    name: &str,
    buffer: &ReplayBuffer<T>,
    result: Result<T, CollectorError>,
    first: bool,
) {
    match result {
        Ok(sample) => {
            if first {
                info!("first measurement [{}]: {:?}", name, sample);
            } else {
                debug!("measurement [{}]: {:?}", name, sample);
            }
            buffer.push(sample);
        }
        Err(err) => {
            error!("measurement failed [{}], stream terminated: {}", name, err);
            buffer.fail(err);
        }
    }
}
