//! RAM collector: bytes of memory actively in use.

use crate::error::CollectorError;
use crate::probe::SystemProbe;

/// One RAM sample.
pub type RamLoad = u64;

pub fn measure(probe: &dyn SystemProbe) -> Result<RamLoad, CollectorError> {
    probe.active_memory_bytes()
}
