//! Storage collector: per-physical-drive used bytes.

use crate::error::CollectorError;
use crate::probe::{HardwareLayout, SystemProbe};
use crate::topology::{resolve_drive_usage, DriveUsage, TopologyOptions};

/// One storage sample: used bytes per physical drive, in layout order.
pub type StorageLoad = Vec<DriveUsage>;

/// Shapes one storage sample by reconciling the current mount and block
/// device listings against the static drive layout.
pub fn measure(
    probe: &dyn SystemProbe,
    layout: &HardwareLayout,
    opts: &TopologyOptions,
) -> Result<StorageLoad, CollectorError> {
    let mounts = probe.mount_usage()?;
    let blocks = probe.block_devices()?;

    Ok(resolve_drive_usage(&layout.drives, &mounts, &blocks, opts))
}
