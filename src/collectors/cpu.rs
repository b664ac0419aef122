//! CPU load collector: per-logical-core load with optional temperatures.

use serde::Serialize;

use crate::error::CollectorError;
use crate::probe::{HardwareLayout, SystemProbe};

/// Load and temperature of one logical core.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoreLoad {
    pub core: usize,
    /// Load percentage, 0..=100.
    pub load: f64,
    /// Temperature in degrees Celsius; 0 when collection is disabled or
    /// no sensor is available.
    pub temp: f64,
}

/// One CPU sample: all logical cores, ordered by core index.
pub type CpuLoad = Vec<CoreLoad>;

/// Shapes one CPU sample.
///
/// Temperature sensors usually report per physical core; each reading is
/// duplicated across that core's logical siblings. When only an
/// aggregate reading exists it is broadcast to every core.
pub fn measure(
    probe: &dyn SystemProbe,
    layout: &HardwareLayout,
    temps_enabled: bool,
) -> Result<CpuLoad, CollectorError> {
    let loads = probe.cpu_loads()?;

    let mut temps: Vec<f64> = Vec::new();
    let mut main_temp = 0.0;
    if temps_enabled {
        let readings = probe.cpu_temperatures()?;
        let threads_per_core = layout.threads_per_core();
        temps = readings
            .cores
            .iter()
            .flat_map(|&celsius| std::iter::repeat(celsius).take(threads_per_core))
            .collect();
        main_temp = readings.main;
    }

    Ok(loads
        .into_iter()
        .enumerate()
        .map(|(core, load)| CoreLoad {
            core,
            load,
            temp: temps.get(core).copied().unwrap_or(main_temp),
        })
        .collect())
}
