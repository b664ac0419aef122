//! GPU collector: utilization per graphics controller.

use serde::Serialize;

use crate::error::CollectorError;
use crate::probe::SystemProbe;

/// Utilization of one graphics controller, percentages 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GpuUtilization {
    pub load: f64,
    pub memory: f64,
}

/// One GPU sample: all controllers in enumeration order.
pub type GpuLoad = Vec<GpuUtilization>;

/// Shapes one GPU sample; readings the hardware does not expose
/// default to 0.
pub fn measure(probe: &dyn SystemProbe) -> Result<GpuLoad, CollectorError> {
    let controllers = probe.gpu_controllers()?;

    Ok(controllers
        .into_iter()
        .map(|c| GpuUtilization {
            load: c.load_percent.unwrap_or(0.0),
            memory: c.memory_percent.unwrap_or(0.0),
        })
        .collect())
}
