//! Network collector: instantaneous throughput from cumulative counters.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::time::Instant;

use crate::error::CollectorError;
use crate::netrate::{compute_rate, read_interface_counters, CounterBaseline, NetworkRate};
use crate::probe::SystemProbe;

/// One network sample.
pub type NetworkLoad = NetworkRate;

/// Stateful network measurement.
///
/// Owns the counter baseline between polls. The sampler runs this
/// collector single-flight, so the baseline has exactly one writer; the
/// mutex only satisfies the ownership rules for the spawned futures and
/// is never contended.
pub struct NetworkSampler {
    probe: Arc<dyn SystemProbe>,
    /// Interface statistics directory to read counters from; when unset,
    /// counters come from the probe's primary-interface aggregate.
    interface_path: Option<PathBuf>,
    /// Monotonic anchor for poll timestamps.
    started: Instant,
    baseline: Mutex<CounterBaseline>,
}

impl NetworkSampler {
    pub fn new(probe: Arc<dyn SystemProbe>, interface_path: Option<PathBuf>) -> Self {
        Self {
            probe,
            interface_path,
            started: Instant::now(),
            baseline: Mutex::new(CounterBaseline::default()),
        }
    }

    /// Reads the current counters and folds them into the baseline. The
    /// first poll after startup reports zero rates.
    pub fn measure(&self) -> Result<NetworkLoad, CollectorError> {
        let (rx_bytes, tx_bytes) = match &self.interface_path {
            Some(path) => read_interface_counters(path)?,
            None => self.probe.network_counters()?,
        };

        let mut baseline = self
            .baseline
            .lock()
            .map_err(|e| CollectorError::probe(format!("network baseline lock: {}", e)))?;

        Ok(compute_rate(
            &mut baseline,
            rx_bytes,
            tx_bytes,
            self.started.elapsed().as_millis() as u64,
        ))
    }
}
