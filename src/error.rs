//! Error types shared across collectors and streams.
//!
//! Collector errors travel through replay buffers to every subscriber, so
//! they must be cheap to clone. Underlying IO/parse errors are flattened
//! to strings at the point of failure.

use thiserror::Error;

/// Failure raised by a metric measurement.
///
/// A collector failure is fatal for its own stream: the replay buffer
/// transitions to a terminal state and the scheduler stops polling that
/// metric. Other metrics are unaffected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollectorError {
    /// The system probe could not produce the requested facts.
    #[error("probe error: {0}")]
    Probe(String),

    /// A kernel counter file could not be read or parsed.
    #[error("counter file {path}: {reason}")]
    CounterFile { path: String, reason: String },

    /// The external speed test command failed or produced unusable output.
    #[error("speed test: {0}")]
    SpeedTest(String),
}

impl CollectorError {
    /// Shorthand for probe failures carrying a formatted message.
    pub fn probe(msg: impl Into<String>) -> Self {
        Self::Probe(msg.into())
    }
}
