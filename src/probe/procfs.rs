//! Linux implementation of the system probe, reading /proc and /sys.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use ahash::AHashMap as HashMap;
use tracing::debug;

use crate::error::CollectorError;
use crate::probe::{CpuTemperatures, GpuControllerStats, HardwareLayout, SystemProbe};
use crate::topology::{BlockDevice, DeviceKind, MountUsage};

/// Pseudo/virtual filesystems never reported as mounts.
const SKIP_FS_TYPES: &[&str] = &[
    "proc",
    "sysfs",
    "devpts",
    "devtmpfs",
    "tmpfs",
    "cgroup",
    "cgroup2",
    "pstore",
    "bpf",
    "debugfs",
    "tracefs",
    "fusectl",
    "configfs",
    "securityfs",
    "hugetlbfs",
    "mqueue",
    "autofs",
    "binfmt_misc",
];

/// hwmon device names known to report CPU temperatures.
const CPU_SENSOR_NAMES: &[&str] = &["coretemp", "k10temp", "zenpower", "cpu_thermal"];

/// CPU time counters for one core, in clock ticks.
#[derive(Debug, Clone, Copy)]
struct CpuTimes {
    user: u64,
    nice: u64,
    system: u64,
    idle: u64,
    iowait: u64,
    irq: u64,
    softirq: u64,
    steal: u64,
}

impl CpuTimes {
    fn total(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }

    /// Idle plus iowait: time the core did no useful work.
    fn idle_total(&self) -> u64 {
        self.idle + self.iowait
    }
}

/// Probe reading live facts from the /proc and /sys virtual filesystems.
///
/// Holds the previous per-core CPU counter snapshot so that load can be
/// derived as a delta between consecutive polls.
pub struct ProcfsProbe {
    proc_root: PathBuf,
    sys_root: PathBuf,
    cpu_prev: RwLock<Option<HashMap<String, CpuTimes>>>,
}

impl Default for ProcfsProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcfsProbe {
    pub fn new() -> Self {
        Self::with_roots("/proc", "/sys")
    }

    /// Probe rooted at alternate paths; used by tests with synthetic
    /// filesystem trees.
    pub fn with_roots(proc_root: impl Into<PathBuf>, sys_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
            sys_root: sys_root.into(),
            cpu_prev: RwLock::new(None),
        }
    }

    fn read_proc(&self, rel: &str) -> Result<String, CollectorError> {
        let path = self.proc_root.join(rel);
        fs::read_to_string(&path)
            .map_err(|e| CollectorError::probe(format!("failed to read {}: {}", path.display(), e)))
    }

    fn read_cpu_times(&self) -> Result<HashMap<String, CpuTimes>, CollectorError> {
        let content = self.read_proc("stat")?;
        let mut stats = HashMap::new();

        for line in content.lines() {
            if !line.starts_with("cpu") {
                continue;
            }
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 8 {
                continue;
            }

            stats.insert(
                parts[0].to_string(),
                CpuTimes {
                    user: parts[1].parse().unwrap_or(0),
                    nice: parts[2].parse().unwrap_or(0),
                    system: parts[3].parse().unwrap_or(0),
                    idle: parts[4].parse().unwrap_or(0),
                    iowait: parts[5].parse().unwrap_or(0),
                    irq: parts[6].parse().unwrap_or(0),
                    softirq: parts[7].parse().unwrap_or(0),
                    steal: if parts.len() > 8 {
                        parts[8].parse().unwrap_or(0)
                    } else {
                        0
                    },
                },
            );
        }

        if stats.is_empty() {
            return Err(CollectorError::probe("no CPU statistics in /proc/stat"));
        }

        Ok(stats)
    }

    /// Mounted filesystems with device and type, keyed by device path.
    fn mount_table(&self) -> Result<HashMap<String, (String, String)>, CollectorError> {
        let content = self.read_proc("mounts")?;
        let mut table = HashMap::new();

        for line in content.lines() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 3 {
                continue;
            }
            table.insert(
                parts[0].to_string(),
                (parts[2].to_string(), parts[1].to_string()),
            );
        }

        Ok(table)
    }
}

impl SystemProbe for ProcfsProbe {
    fn cpu_loads(&self) -> Result<Vec<f64>, CollectorError> {
        let current = self.read_cpu_times()?;

        let previous = {
            let guard = self
                .cpu_prev
                .read()
                .map_err(|e| CollectorError::probe(format!("cpu snapshot lock: {}", e)))?;
            guard.clone()
        };

        let mut loads: Vec<(usize, f64)> = Vec::new();
        for (name, times) in &current {
            let Some(index) = name.strip_prefix("cpu").and_then(|s| s.parse::<usize>().ok())
            else {
                continue; // aggregate "cpu" line
            };

            // Against the previous snapshot when one exists, otherwise
            // since boot (first poll).
            let (delta_total, delta_idle) = match previous.as_ref().and_then(|p| p.get(name)) {
                Some(prev) => (
                    times.total().saturating_sub(prev.total()),
                    times.idle_total().saturating_sub(prev.idle_total()),
                ),
                None => (times.total(), times.idle_total()),
            };

            let load = if delta_total > 0 {
                (delta_total - delta_idle.min(delta_total)) as f64 / delta_total as f64 * 100.0
            } else {
                0.0
            };
            loads.push((index, load));
        }

        let mut guard = self
            .cpu_prev
            .write()
            .map_err(|e| CollectorError::probe(format!("cpu snapshot lock: {}", e)))?;
        *guard = Some(current);

        loads.sort_by_key(|(index, _)| *index);
        Ok(loads.into_iter().map(|(_, load)| load).collect())
    }

    fn cpu_temperatures(&self) -> Result<CpuTemperatures, CollectorError> {
        let hwmon_base = self.sys_root.join("class/hwmon");
        if !hwmon_base.exists() {
            return Ok(CpuTemperatures::default());
        }

        let entries = fs::read_dir(&hwmon_base)
            .map_err(|e| CollectorError::probe(format!("failed to read hwmon: {}", e)))?;

        let mut cores: Vec<(u32, f64)> = Vec::new();
        let mut package: Option<f64> = None;
        let mut any: Vec<f64> = Vec::new();

        for entry in entries.flatten() {
            let path = entry.path();
            let device_name = fs::read_to_string(path.join("name"))
                .map(|s| s.trim().to_string())
                .unwrap_or_default();
            if !CPU_SENSOR_NAMES.contains(&device_name.as_str()) {
                continue;
            }

            let Ok(dir_entries) = fs::read_dir(&path) else {
                continue;
            };
            for temp_entry in dir_entries.flatten() {
                let file_name = temp_entry.file_name().to_string_lossy().to_string();
                if !file_name.starts_with("temp") || !file_name.ends_with("_input") {
                    continue;
                }

                let Ok(raw) = fs::read_to_string(temp_entry.path()) else {
                    continue;
                };
                let Ok(millidegrees) = raw.trim().parse::<i64>() else {
                    continue;
                };
                let celsius = millidegrees as f64 / 1000.0;
                any.push(celsius);

                let label_file = file_name.replace("_input", "_label");
                let label = fs::read_to_string(path.join(label_file))
                    .map(|s| s.trim().to_string())
                    .unwrap_or_default();

                if let Some(core_index) = label.strip_prefix("Core ") {
                    if let Ok(index) = core_index.parse::<u32>() {
                        cores.push((index, celsius));
                    }
                } else if label.starts_with("Package") || label == "Tctl" || label == "Tdie" {
                    package.get_or_insert(celsius);
                }
            }
        }

        cores.sort_by_key(|(index, _)| *index);
        let main = package.unwrap_or_else(|| {
            if any.is_empty() {
                0.0
            } else {
                any.iter().sum::<f64>() / any.len() as f64
            }
        });

        Ok(CpuTemperatures {
            main,
            cores: cores.into_iter().map(|(_, celsius)| celsius).collect(),
        })
    }

    fn active_memory_bytes(&self) -> Result<u64, CollectorError> {
        let content = self.read_proc("meminfo")?;
        parse_meminfo_active(&content)
    }

    fn mount_usage(&self) -> Result<Vec<MountUsage>, CollectorError> {
        let content = self.read_proc("mounts")?;
        let mut usage = Vec::new();

        for line in content.lines() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 3 {
                continue;
            }

            let device = parts[0];
            let mount_point = parts[1];
            let fs_type = parts[2];

            if should_skip_filesystem(fs_type, mount_point) {
                continue;
            }

            // Filesystems we cannot stat are skipped, not fatal.
            match statvfs_used_bytes(mount_point) {
                Ok(used_bytes) => usage.push(MountUsage {
                    fs: device.to_string(),
                    fs_type: fs_type.to_string(),
                    mount: mount_point.to_string(),
                    used_bytes,
                }),
                Err(e) => debug!("skipping mount {}: {}", mount_point, e),
            }
        }

        Ok(usage)
    }

    fn block_devices(&self) -> Result<Vec<BlockDevice>, CollectorError> {
        let block_base = self.sys_root.join("block");
        let entries = fs::read_dir(&block_base).map_err(|e| {
            CollectorError::probe(format!("failed to read {}: {}", block_base.display(), e))
        })?;

        let mounts = self.mount_table()?;
        let mut names: Vec<String> = entries
            .flatten()
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();

        let mut devices = Vec::new();
        for name in names {
            let device_dir = block_base.join(&name);
            let kind = if name.starts_with("loop") {
                DeviceKind::Loop
            } else if name.starts_with("sr") {
                DeviceKind::Rom
            } else {
                DeviceKind::Disk
            };

            devices.push(block_device_entry(&name, kind, &device_dir, &mounts));

            // Partitions are subdirectories carrying a `partition` file.
            let Ok(children) = fs::read_dir(&device_dir) else {
                continue;
            };
            let mut part_names: Vec<String> = children
                .flatten()
                .filter(|c| c.path().join("partition").exists())
                .map(|c| c.file_name().to_string_lossy().to_string())
                .collect();
            part_names.sort();

            for part_name in part_names {
                let part_dir = device_dir.join(&part_name);
                devices.push(block_device_entry(
                    &part_name,
                    DeviceKind::Part,
                    &part_dir,
                    &mounts,
                ));
            }
        }

        Ok(devices)
    }

    fn network_counters(&self) -> Result<(u64, u64), CollectorError> {
        let content = self.read_proc("net/dev")?;
        parse_netdev_primary(&content)
    }

    fn gpu_controllers(&self) -> Result<Vec<GpuControllerStats>, CollectorError> {
        let drm_base = self.sys_root.join("class/drm");
        if !drm_base.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&drm_base)
            .map_err(|e| CollectorError::probe(format!("failed to read drm: {}", e)))?;

        let mut card_names: Vec<String> = entries
            .flatten()
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|name| {
                // card0, card1, ... but not connector entries like card0-HDMI-A-1
                name.strip_prefix("card")
                    .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
            })
            .collect();
        card_names.sort();

        let mut controllers = Vec::new();
        for name in card_names {
            let device_dir = drm_base.join(&name).join("device");

            let load_percent = fs::read_to_string(device_dir.join("gpu_busy_percent"))
                .ok()
                .and_then(|s| s.trim().parse::<f64>().ok());

            let vram_used = fs::read_to_string(device_dir.join("mem_info_vram_used"))
                .ok()
                .and_then(|s| s.trim().parse::<f64>().ok());
            let vram_total = fs::read_to_string(device_dir.join("mem_info_vram_total"))
                .ok()
                .and_then(|s| s.trim().parse::<f64>().ok());
            let memory_percent = match (vram_used, vram_total) {
                (Some(used), Some(total)) if total > 0.0 => Some(used / total * 100.0),
                _ => None,
            };

            controllers.push(GpuControllerStats {
                load_percent,
                memory_percent,
            });
        }

        Ok(controllers)
    }

    fn hardware_layout(&self) -> Result<HardwareLayout, CollectorError> {
        let cpuinfo = self.read_proc("cpuinfo")?;
        let (cores, threads) = parse_cpuinfo_topology(&cpuinfo);

        let block_base = self.sys_root.join("block");
        let entries = fs::read_dir(&block_base).map_err(|e| {
            CollectorError::probe(format!("failed to read {}: {}", block_base.display(), e))
        })?;

        let mut drives: Vec<String> = entries
            .flatten()
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|name| is_physical_drive(name))
            .collect();
        // readdir order is arbitrary; sort for a stable enumeration order
        // across polls and restarts.
        drives.sort();

        Ok(HardwareLayout {
            cores,
            threads,
            drives,
        })
    }
}

fn block_device_entry(
    name: &str,
    kind: DeviceKind,
    device_dir: &Path,
    mounts: &HashMap<String, (String, String)>,
) -> BlockDevice {
    let size_bytes = fs::read_to_string(device_dir.join("size"))
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(|sectors| sectors * 512)
        .unwrap_or(0);

    let (fs_type, mount) = mounts
        .get(&format!("/dev/{}", name))
        .cloned()
        .unwrap_or_default();

    BlockDevice {
        name: name.to_string(),
        kind,
        fs_type,
        mount,
        size_bytes,
    }
}

/// Drives that represent physical storage rather than virtual or
/// removable-media devices.
fn is_physical_drive(name: &str) -> bool {
    const VIRTUAL_PREFIXES: &[&str] = &["loop", "ram", "zram", "sr", "dm-", "md", "fd"];
    !VIRTUAL_PREFIXES.iter().any(|p| name.starts_with(p))
}

fn should_skip_filesystem(fs_type: &str, mount_point: &str) -> bool {
    if SKIP_FS_TYPES.contains(&fs_type) {
        return true;
    }

    mount_point.starts_with("/proc")
        || mount_point.starts_with("/sys")
        || mount_point.starts_with("/dev")
        || mount_point.starts_with("/run")
}

/// Used bytes of a mounted filesystem via libc statvfs.
fn statvfs_used_bytes(path: &str) -> Result<u64, String> {
    use std::ffi::CString;
    use std::mem;

    let c_path = CString::new(path).map_err(|e| format!("invalid path: {}", e))?;

    unsafe {
        let mut stat: libc::statvfs = mem::zeroed();
        if libc::statvfs(c_path.as_ptr(), &mut stat) != 0 {
            return Err(format!("statvfs failed for {}", path));
        }

        let block_size = stat.f_frsize as u64;
        let size_bytes = block_size * stat.f_blocks;
        Ok(size_bytes - block_size * stat.f_bfree)
    }
}

/// Parses the `Active:` line of /proc/meminfo, in bytes.
fn parse_meminfo_active(content: &str) -> Result<u64, CollectorError> {
    for line in content.lines() {
        if let Some(value) = line.strip_prefix("Active:") {
            return value
                .split_whitespace()
                .next()
                .and_then(|kb| kb.parse::<u64>().ok())
                .map(|kb| kb * 1024)
                .ok_or_else(|| CollectorError::probe("malformed Active line in /proc/meminfo"));
        }
    }
    Err(CollectorError::probe("no Active line in /proc/meminfo"))
}

/// Cumulative (rx, tx) bytes of the first non-loopback interface in
/// /proc/net/dev. Interface order within the file is stable per boot.
fn parse_netdev_primary(content: &str) -> Result<(u64, u64), CollectorError> {
    for (idx, line) in content.lines().enumerate() {
        // Two header lines precede the interface table.
        if idx < 2 {
            continue;
        }

        let parts: Vec<&str> = line.split(':').collect();
        if parts.len() != 2 {
            continue;
        }

        let interface = parts[0].trim();
        if interface == "lo" {
            continue;
        }

        let values: Vec<&str> = parts[1].split_whitespace().collect();
        if values.len() < 16 {
            continue;
        }

        let rx = values[0]
            .parse::<u64>()
            .map_err(|e| CollectorError::probe(format!("bad rx_bytes for {}: {}", interface, e)))?;
        let tx = values[8]
            .parse::<u64>()
            .map_err(|e| CollectorError::probe(format!("bad tx_bytes for {}: {}", interface, e)))?;
        return Ok((rx, tx));
    }

    Err(CollectorError::probe(
        "no non-loopback interface in /proc/net/dev",
    ))
}

/// (physical cores, logical threads) from /proc/cpuinfo.
fn parse_cpuinfo_topology(content: &str) -> (usize, usize) {
    let mut threads = 0usize;
    let mut core_ids: Vec<(String, String)> = Vec::new();
    let mut physical_id = String::new();

    for line in content.lines() {
        let mut split = line.splitn(2, ':');
        let key = split.next().unwrap_or("").trim();
        let value = split.next().unwrap_or("").trim();

        match key {
            "processor" => threads += 1,
            "physical id" => physical_id = value.to_string(),
            "core id" => {
                let pair = (physical_id.clone(), value.to_string());
                if !core_ids.contains(&pair) {
                    core_ids.push(pair);
                }
            }
            _ => {}
        }
    }

    let cores = if core_ids.is_empty() {
        threads
    } else {
        core_ids.len()
    };

    (cores, threads)
}
