//! System information probe boundary.
//!
//! Collectors depend on the [`SystemProbe`] trait rather than on the
//! operating system directly; the production implementation
//! ([`procfs::ProcfsProbe`]) reads `/proc` and `/sys`, and tests
//! substitute hand-rolled fakes.

pub mod procfs;

use serde::Serialize;

use crate::error::CollectorError;
use crate::topology::{BlockDevice, MountUsage};

/// Static hardware facts gathered once at startup.
#[derive(Debug, Clone, Serialize)]
pub struct HardwareLayout {
    /// Physical core count.
    pub cores: usize,
    /// Logical core (thread) count.
    pub threads: usize,
    /// Physical drive device names in stable enumeration order.
    pub drives: Vec<String>,
}

impl HardwareLayout {
    /// Logical cores per physical core, at least 1.
    pub fn threads_per_core(&self) -> usize {
        if self.cores == 0 {
            1
        } else {
            (self.threads / self.cores).max(1)
        }
    }
}

/// CPU temperature readings in degrees Celsius.
#[derive(Debug, Clone, Default)]
pub struct CpuTemperatures {
    /// Aggregate (package) temperature, used when no per-core data exists.
    pub main: f64,
    /// Per-physical-core readings, possibly empty.
    pub cores: Vec<f64>,
}

/// Utilization of one graphics controller; absent readings stay `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GpuControllerStats {
    pub load_percent: Option<f64>,
    pub memory_percent: Option<f64>,
}

/// Raw hardware/OS facts consumed by the metric collectors.
///
/// Every query is independent and may fail; a failure propagates as the
/// calling collector's failure and terminates that metric's stream.
pub trait SystemProbe: Send + Sync {
    /// Current load percentage per logical core, ordered by core index.
    fn cpu_loads(&self) -> Result<Vec<f64>, CollectorError>;

    /// Current CPU temperature readings.
    fn cpu_temperatures(&self) -> Result<CpuTemperatures, CollectorError>;

    /// Bytes of memory actively in use.
    fn active_memory_bytes(&self) -> Result<u64, CollectorError>;

    /// Usage of currently mounted filesystems.
    fn mount_usage(&self) -> Result<Vec<MountUsage>, CollectorError>;

    /// Current block device listing, partitions included.
    fn block_devices(&self) -> Result<Vec<BlockDevice>, CollectorError>;

    /// Cumulative (received, sent) byte counters of the primary network
    /// interface.
    fn network_counters(&self) -> Result<(u64, u64), CollectorError>;

    /// Utilization of each graphics controller.
    fn gpu_controllers(&self) -> Result<Vec<GpuControllerStats>, CollectorError>;

    /// Static hardware layout; queried once at startup.
    fn hardware_layout(&self) -> Result<HardwareLayout, CollectorError>;
}
