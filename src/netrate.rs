//! Network throughput derivation from cumulative byte counters.
//!
//! The kernel exposes received/sent bytes as monotonically growing
//! counters; instantaneous throughput is the counter delta divided by
//! elapsed time. The baseline is owned by a single collector and
//! advanced once per poll.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::error::CollectorError;

/// Counter snapshot from the previous poll. Single-writer: mutated only
/// from within the owning metric's scheduling loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterBaseline {
    last_rx_bytes: u64,
    last_tx_bytes: u64,
    last_poll_ms: Option<u64>,
}

/// Instantaneous throughput in bytes per second.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NetworkRate {
    pub up: f64,
    pub down: f64,
}

impl NetworkRate {
    const ZERO: NetworkRate = NetworkRate { up: 0.0, down: 0.0 };
}

/// Folds the current counter readings into the baseline and returns the
/// rate since the previous poll.
///
/// The first poll reports zero for both directions: a rate against a
/// zero baseline would be an unbounded spike. A decreasing counter is
/// treated as a counter reset; the affected poll reports zero and the
/// baseline is re-armed from the current readings.
pub fn compute_rate(
    baseline: &mut CounterBaseline,
    rx_bytes: u64,
    tx_bytes: u64,
    now_ms: u64,
) -> NetworkRate {
    let rate = match baseline.last_poll_ms {
        None => NetworkRate::ZERO,
        Some(last_ms) => {
            let elapsed_secs = now_ms.saturating_sub(last_ms) as f64 / 1000.0;
            if elapsed_secs <= 0.0 {
                NetworkRate::ZERO
            } else {
                NetworkRate {
                    up: counter_delta(baseline.last_tx_bytes, tx_bytes) as f64 / elapsed_secs,
                    down: counter_delta(baseline.last_rx_bytes, rx_bytes) as f64 / elapsed_secs,
                }
            }
        }
    };

    baseline.last_rx_bytes = rx_bytes;
    baseline.last_tx_bytes = tx_bytes;
    baseline.last_poll_ms = Some(now_ms);

    rate
}

/// Delta between two cumulative readings; zero when the counter went
/// backwards (reset).
fn counter_delta(last: u64, current: u64) -> u64 {
    current.saturating_sub(last)
}

/// Reads the cumulative (received, sent) byte counters of one network
/// interface from its `statistics` directory, e.g.
/// `/sys/class/net/eth0/statistics/{rx_bytes,tx_bytes}`.
pub fn read_interface_counters(iface_dir: &Path) -> Result<(u64, u64), CollectorError> {
    let rx = read_counter_file(&iface_dir.join("statistics/rx_bytes"))?;
    let tx = read_counter_file(&iface_dir.join("statistics/tx_bytes"))?;
    Ok((rx, tx))
}

fn read_counter_file(path: &Path) -> Result<u64, CollectorError> {
    let content = fs::read_to_string(path).map_err(|e| CollectorError::CounterFile {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    content
        .trim()
        .parse::<u64>()
        .map_err(|e| CollectorError::CounterFile {
            path: path.display().to_string(),
            reason: format!("invalid counter value: {}", e),
        })
}
