//! sysvitals — live system telemetry streams with bounded replay history.
//!
//! The crate samples hardware/OS resource metrics (CPU, memory, storage,
//! network, GPU) on configurable intervals and exposes each metric as a
//! continuously-updated, multi-subscriber stream: new subscribers first
//! receive the retained history, then live samples, without re-triggering
//! any measurement work.
//!
//! # Architecture
//!
//! - [`replay`]: bounded ring buffer broadcasting backlog + live samples
//!   to all subscribers of one metric.
//! - [`sampler`]: interval scheduler driving an async measurement
//!   function into a replay buffer, with an eager first sample.
//! - [`collectors`]: per-metric measurement shaping (CPU, RAM, storage,
//!   network, GPU, speed test).
//! - [`topology`]: maps mount usage onto physical drives, folding
//!   overlay/remote mounts into the host drive.
//! - [`netrate`]: derives throughput from cumulative byte counters.
//! - [`probe`]: the /proc and /sys reading boundary behind a trait.
//! - [`streams`]: wires configured metrics into the named stream set.
//! - [`handlers`]: axum handlers serving the streams over SSE.

pub mod cli;
pub mod collectors;
pub mod config;
pub mod error;
pub mod handlers;
pub mod netrate;
pub mod probe;
pub mod replay;
pub mod sampler;
pub mod state;
pub mod streams;
pub mod topology;

// Re-export main types for convenience
pub use config::{Config, PollConfig};
pub use error::CollectorError;
pub use replay::{ReplayBuffer, Subscription};
pub use sampler::{start_sampling, MetricStream, OverlapPolicy, SamplerOptions, StreamStatus};
pub use streams::{start_streams, MetricStreams};
