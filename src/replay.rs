//! Bounded replay buffer broadcasting samples to multiple subscribers.
//!
//! Each metric stream owns one `ReplayBuffer`. The buffer keeps the most
//! recent `capacity` samples in a ring and fans every accepted sample out
//! to all live subscribers. A subscriber joining later first receives the
//! full backlog in oldest-to-newest order, then live updates, so all
//! subscribers of one buffer observe the same sequence.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll};

use tokio::sync::mpsc;
use tokio_stream::Stream;

use crate::error::CollectorError;

/// One delivery to a subscriber: a sample, or the stream's terminal error.
pub type SampleResult<T> = Result<T, CollectorError>;

struct Inner<T> {
    ring: VecDeque<T>,
    subscribers: Vec<mpsc::UnboundedSender<SampleResult<T>>>,
    failure: Option<CollectorError>,
}

/// Bounded-history broadcast buffer.
///
/// Invariants: the ring never holds more than `capacity` samples (oldest
/// evicted first), and once `fail` has been called no further samples are
/// accepted. Every subscriber observes the failure exactly once;
/// subscribers joining after the failure receive only the failure.
pub struct ReplayBuffer<T> {
    capacity: usize,
    inner: Mutex<Inner<T>>,
}

impl<T: Clone> ReplayBuffer<T> {
    /// Creates a buffer retaining up to `capacity` samples (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner {
                ring: VecDeque::with_capacity(capacity.max(1)),
                subscribers: Vec::new(),
                failure: None,
            }),
        }
    }

    /// Appends a sample, evicting the oldest entry when full, and delivers
    /// it to every live subscriber. Ignored once the buffer has failed.
    pub fn push(&self, sample: T) {
        let mut inner = self.inner.lock().expect("replay buffer lock poisoned");
        if inner.failure.is_some() {
            return;
        }

        if inner.ring.len() == self.capacity {
            inner.ring.pop_front();
        }
        inner.ring.push_back(sample.clone());

        inner
            .subscribers
            .retain(|tx| tx.send(Ok(sample.clone())).is_ok());
    }

    /// Puts the buffer into its terminal failure state.
    ///
    /// Every live subscriber receives the error once and is then
    /// disconnected. Only the first failure is recorded; later calls are
    /// no-ops.
    pub fn fail(&self, err: CollectorError) {
        let mut inner = self.inner.lock().expect("replay buffer lock poisoned");
        if inner.failure.is_some() {
            return;
        }

        for tx in inner.subscribers.drain(..) {
            let _ = tx.send(Err(err.clone()));
        }
        inner.ring.clear();
        inner.failure = Some(err);
    }

    /// Returns true once a measurement failure has terminated the buffer.
    pub fn is_failed(&self) -> bool {
        self.inner
            .lock()
            .expect("replay buffer lock poisoned")
            .failure
            .is_some()
    }

    /// Current number of retained samples.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .expect("replay buffer lock poisoned")
            .ring
            .len()
    }

    /// Returns true if no samples are retained.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registers a new subscriber.
    ///
    /// The subscription immediately holds the current backlog in
    /// oldest-to-newest order (or the terminal error, if the buffer has
    /// already failed) and receives every subsequent delivery.
    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().expect("replay buffer lock poisoned");

        if let Some(err) = &inner.failure {
            let _ = tx.send(Err(err.clone()));
            // Sender dropped here: the subscription yields the error, then ends.
        } else {
            for sample in &inner.ring {
                let _ = tx.send(Ok(sample.clone()));
            }
            inner.subscribers.push(tx);
        }

        Subscription { rx }
    }
}

/// A single subscriber's view of a replay buffer.
///
/// Yields `Ok(sample)` items followed by at most one `Err` (the stream's
/// terminal failure). The stream ends after the error, or when the owning
/// buffer is dropped; a healthy stream of an enabled metric never ends for
/// the lifetime of the process.
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<SampleResult<T>>,
}

impl<T> Subscription<T> {
    /// Waits for the next delivery.
    pub async fn next(&mut self) -> Option<SampleResult<T>> {
        self.rx.recv().await
    }

    /// Non-blocking variant of [`next`](Self::next); `None` when no
    /// delivery is currently queued.
    pub fn try_next(&mut self) -> Option<SampleResult<T>> {
        self.rx.try_recv().ok()
    }
}

impl<T> Stream for Subscription<T> {
    type Item = SampleResult<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(sub: &mut Subscription<u32>) -> Vec<SampleResult<u32>> {
        let mut out = Vec::new();
        while let Some(item) = sub.try_next() {
            out.push(item);
        }
        out
    }

    #[test]
    fn test_backlog_in_order() {
        let buffer = ReplayBuffer::new(5);
        for i in 1..=3 {
            buffer.push(i);
        }

        let mut sub = buffer.subscribe();
        let got: Vec<u32> = drain(&mut sub).into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(got, vec![1, 2, 3]);
    }

    #[test]
    fn test_bounded_history_evicts_oldest() {
        let buffer = ReplayBuffer::new(3);
        for i in 1..=5 {
            buffer.push(i);
        }

        assert_eq!(buffer.len(), 3);
        let mut sub = buffer.subscribe();
        let got: Vec<u32> = drain(&mut sub).into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(got, vec![3, 4, 5]);
    }

    #[test]
    fn test_live_delivery_after_backlog() {
        let buffer = ReplayBuffer::new(3);
        buffer.push(1);

        let mut sub = buffer.subscribe();
        buffer.push(2);

        let got: Vec<u32> = drain(&mut sub).into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(got, vec![1, 2]);
    }

    #[test]
    fn test_all_subscribers_observe_same_sequence() {
        let buffer = ReplayBuffer::new(4);
        buffer.push(1);
        let mut early = buffer.subscribe();
        buffer.push(2);
        let mut late = buffer.subscribe();
        buffer.push(3);

        let early_seq: Vec<u32> = drain(&mut early).into_iter().map(|r| r.unwrap()).collect();
        let late_seq: Vec<u32> = drain(&mut late).into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(early_seq, vec![1, 2, 3]);
        assert_eq!(late_seq, vec![1, 2, 3]);
    }

    #[test]
    fn test_failure_is_terminal() {
        let buffer = ReplayBuffer::new(3);
        buffer.push(1);
        let mut sub = buffer.subscribe();

        buffer.fail(CollectorError::probe("boom"));
        buffer.push(2); // must be ignored
        buffer.fail(CollectorError::probe("second")); // must not overwrite

        let got = drain(&mut sub);
        assert_eq!(got.len(), 2);
        assert_eq!(got[0], Ok(1));
        assert_eq!(got[1], Err(CollectorError::probe("boom")));
        assert!(buffer.is_failed());
    }

    #[test]
    fn test_late_subscriber_receives_only_failure() {
        let buffer = ReplayBuffer::new(3);
        buffer.push(1);
        buffer.fail(CollectorError::probe("boom"));

        let mut sub = buffer.subscribe();
        let got = drain(&mut sub);
        assert_eq!(got, vec![Err(CollectorError::probe("boom"))]);
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let buffer = ReplayBuffer::new(3);
        let sub = buffer.subscribe();
        drop(sub);

        // Next push must not fail and must drop the dead sender.
        buffer.push(1);
        let mut fresh = buffer.subscribe();
        assert_eq!(drain(&mut fresh), vec![Ok(1)]);
    }
}
