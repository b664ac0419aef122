//! Storage topology resolution.
//!
//! Mounted filesystems report usage and block devices report
//! partition-to-mount associations, but nothing links a mount's used
//! bytes to the physical drive backing it. This module reconciles the
//! two listings: every used byte is assigned to exactly one physical
//! drive, and mounts with no visible backing partition (overlay,
//! remote and union filesystems) are folded into the host drive.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Filesystem types excluded from per-drive attribution by default:
/// network and union filesystems whose usage does not live on a local
/// partition.
pub static DEFAULT_INVALID_FS_TYPES: Lazy<Vec<String>> = Lazy::new(|| {
    ["cifs", "9p", "fuse.rclone", "fuse.mergerfs", "overlay"]
        .iter()
        .map(|s| s.to_string())
        .collect()
});

/// Block device class as enumerated by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Disk,
    Part,
    Loop,
    Rom,
}

/// One entry of the block device listing, re-read every poll cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockDevice {
    /// Kernel device name, e.g. `sdb2`.
    pub name: String,
    pub kind: DeviceKind,
    pub fs_type: String,
    /// Mount path, empty when the device is not mounted.
    pub mount: String,
    pub size_bytes: u64,
}

/// Usage of one mounted filesystem, re-read every poll cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountUsage {
    /// Filesystem identifier, e.g. `/dev/sdb2` or `overlay`.
    pub fs: String,
    pub fs_type: String,
    pub mount: String,
    pub used_bytes: u64,
}

/// Used bytes attributed to one physical drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DriveUsage {
    pub used_bytes: u64,
}

/// Resolution parameters.
#[derive(Debug, Clone)]
pub struct TopologyOptions {
    /// Path under which the host filesystem is visible. `/` on bare
    /// metal; a prefix such as `/mnt/host` in containerized deployments.
    pub host_root: String,
    /// Filesystem types never attributed to a drive's partitions. The
    /// defaults plus any user-configured additions.
    pub invalid_fs_types: Vec<String>,
}

impl Default for TopologyOptions {
    fn default() -> Self {
        Self {
            host_root: "/".to_string(),
            invalid_fs_types: DEFAULT_INVALID_FS_TYPES.clone(),
        }
    }
}

impl TopologyOptions {
    /// Prefix matching mounts strictly below the host root.
    fn under_prefix(&self) -> String {
        if self.host_root == "/" {
            "/".to_string()
        } else {
            format!("{}/", self.host_root.trim_end_matches('/'))
        }
    }

    /// Prefix matching boot partition mounts of the host.
    fn boot_prefix(&self) -> String {
        format!("{}boot/", self.under_prefix())
    }

    fn is_under_host(&self, mount: &str) -> bool {
        !mount.is_empty() && mount != self.host_root && mount.starts_with(&self.under_prefix())
    }

    fn is_host_mount(&self, mount: &str) -> bool {
        mount == self.host_root || mount == "/"
    }
}

/// Maps mount usage onto physical drives.
///
/// `drives` is the ordered physical-drive list from the static hardware
/// layout; the output preserves that order, one entry per drive.
///
/// The first drive (in enumeration order) that either has no partition
/// mounted under the host root, or has a partition mounted at the host
/// root or under the host boot prefix, is bound as the host drive. The
/// host drive receives the root mount's usage plus the usage of every
/// valid mount claimed by no partition of any drive. Every other drive
/// sums the usage of the mounts backing its own partitions; once the
/// host is bound, later drives are never considered for the role even
/// when they would qualify. When no drive qualifies as host, unclaimed
/// usage is silently dropped.
pub fn resolve_drive_usage(
    drives: &[String],
    mounts: &[MountUsage],
    blocks: &[BlockDevice],
    opts: &TopologyOptions,
) -> Vec<DriveUsage> {
    let valid_mounts: Vec<&MountUsage> = mounts
        .iter()
        .filter(|m| opts.is_under_host(&m.mount) && !opts.invalid_fs_types.contains(&m.fs_type))
        .collect();

    // The root mount itself is looked up across all mounts: on overlay
    // and similar setups its filesystem type is one of the excluded ones.
    let host_mount_used = mounts
        .iter()
        .find(|m| opts.is_host_mount(&m.mount))
        .map(|m| m.used_bytes)
        .unwrap_or(0);

    let parts: Vec<&BlockDevice> = blocks
        .iter()
        .filter(|b| b.kind == DeviceKind::Part)
        .collect();

    let boot_prefix = opts.boot_prefix();
    let mut host_found = false;

    drives
        .iter()
        .map(|device| {
            let drive_parts: Vec<&&BlockDevice> = parts
                .iter()
                .filter(|p| p.name.starts_with(device.as_str()))
                .collect();

            // Host candidacy: all partitions unmounted under the host
            // root (vacuously true for a partitionless drive), or some
            // partition at the host root / under the boot prefix.
            let potential_host = drive_parts
                .iter()
                .all(|p| !opts.is_under_host(&p.mount))
                || drive_parts
                    .iter()
                    .any(|p| opts.is_host_mount(&p.mount) || p.mount.starts_with(&boot_prefix));

            if potential_host && !host_found {
                host_found = true;
                let unclaimed: u64 = valid_mounts
                    .iter()
                    .filter(|m| !parts.iter().any(|p| p.mount == m.mount))
                    .map(|m| m.used_bytes)
                    .sum();

                return DriveUsage {
                    used_bytes: host_mount_used + unclaimed,
                };
            }

            // Only the first candidate is bound as host; every other
            // drive is attributed its own partitions' mounts.
            let used_bytes = drive_parts
                .iter()
                .map(|p| {
                    valid_mounts
                        .iter()
                        .find(|m| m.mount == p.mount)
                        .map(|m| m.used_bytes)
                        .unwrap_or(0)
                })
                .sum();

            DriveUsage { used_bytes }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(name: &str, fs_type: &str, mount: &str) -> BlockDevice {
        BlockDevice {
            name: name.to_string(),
            kind: DeviceKind::Part,
            fs_type: fs_type.to_string(),
            mount: mount.to_string(),
            size_bytes: 0,
        }
    }

    fn mount(fs: &str, fs_type: &str, mount: &str, used: u64) -> MountUsage {
        MountUsage {
            fs: fs.to_string(),
            fs_type: fs_type.to_string(),
            mount: mount.to_string(),
            used_bytes: used,
        }
    }

    #[test]
    fn test_first_candidate_wins_host_role() {
        // sda has no partitions mounted under the host prefix, sdb holds
        // the boot partitions. Both qualify; sda is enumerated first and
        // takes the host role, sdb keeps its own partitions' usage.
        let drives = vec!["sda".to_string(), "sdb".to_string()];
        let mounts = vec![
            mount("/dev/sdb1", "vfat", "/boot/efi", 5_484_544),
            mount("/dev/sdb2", "ext4", "/boot", 220_078_080),
            mount("/dev/mapper/vg-lv", "ext4", "/", 211_411_542_016),
        ];
        let blocks = vec![
            part("sdb1", "vfat", "/boot/efi"),
            part("sdb2", "ext4", "/boot"),
            part("sdb3", "LVM2_member", ""),
        ];

        let usage = resolve_drive_usage(&drives, &mounts, &blocks, &TopologyOptions::default());

        assert_eq!(usage.len(), 2);
        assert_eq!(usage[0].used_bytes, 211_411_542_016);
        assert_eq!(usage[1].used_bytes, 5_484_544 + 220_078_080);
    }

    #[test]
    fn test_unclaimed_mounts_fold_into_host() {
        let drives = vec!["sda".to_string()];
        let mounts = vec![
            mount("/dev/sda2", "ext4", "/", 100),
            // No partition claims these two.
            mount("tmpvol", "ext4", "/scratch", 40),
            mount("remote:/share", "cifs", "/mnt/share", 1_000),
        ];
        let blocks = vec![part("sda1", "vfat", "/boot/efi"), part("sda2", "ext4", "/")];

        let usage = resolve_drive_usage(&drives, &mounts, &blocks, &TopologyOptions::default());

        // Host root usage plus the unclaimed local mount; the cifs mount
        // is filtered out by type.
        assert_eq!(usage[0].used_bytes, 100 + 40);
    }

    #[test]
    fn test_non_host_drive_sums_its_partitions() {
        let drives = vec!["sda".to_string(), "sdb".to_string()];
        let mounts = vec![
            mount("/dev/sda1", "ext4", "/", 500),
            mount("/dev/sdb1", "xfs", "/data", 300),
            mount("/dev/sdb2", "xfs", "/archive", 200),
        ];
        let blocks = vec![
            part("sda1", "ext4", "/"),
            part("sdb1", "xfs", "/data"),
            part("sdb2", "xfs", "/archive"),
        ];

        let usage = resolve_drive_usage(&drives, &mounts, &blocks, &TopologyOptions::default());

        assert_eq!(usage[0].used_bytes, 500);
        assert_eq!(usage[1].used_bytes, 300 + 200);
    }

    #[test]
    fn test_drive_without_partitions_after_host_reports_zero() {
        // Both drives are candidates (no partitions at all); only the
        // first becomes host, the second reports zero.
        let drives = vec!["sda".to_string(), "sdb".to_string()];
        let mounts = vec![mount("overlay", "overlay", "/", 750)];
        let blocks: Vec<BlockDevice> = Vec::new();

        let usage = resolve_drive_usage(&drives, &mounts, &blocks, &TopologyOptions::default());

        assert_eq!(usage[0].used_bytes, 750);
        assert_eq!(usage[1].used_bytes, 0);
    }

    #[test]
    fn test_unmounted_partition_contributes_zero() {
        let drives = vec!["sda".to_string(), "sdb".to_string()];
        let mounts = vec![mount("/dev/sda1", "ext4", "/", 500)];
        let blocks = vec![part("sda1", "ext4", "/"), part("sdb1", "ext4", "")];

        let usage = resolve_drive_usage(&drives, &mounts, &blocks, &TopologyOptions::default());

        // The host slot is taken by sda; sdb's only partition is
        // unmounted and contributes nothing.
        assert_eq!(usage[1].used_bytes, 0);
    }

    #[test]
    fn test_no_host_candidate_drops_unclaimed_usage() {
        // Every drive has partitions mounted under the host prefix but
        // none at root or boot: unclaimed usage has nowhere to go.
        let drives = vec!["sda".to_string()];
        let mounts = vec![
            mount("/dev/sda1", "xfs", "/data", 300),
            mount("tmpvol", "ext4", "/scratch", 40),
        ];
        let blocks = vec![part("sda1", "xfs", "/data")];

        let usage = resolve_drive_usage(&drives, &mounts, &blocks, &TopologyOptions::default());

        assert_eq!(usage[0].used_bytes, 300);
    }

    #[test]
    fn test_containerized_host_prefix() {
        let opts = TopologyOptions {
            host_root: "/mnt/host".to_string(),
            ..TopologyOptions::default()
        };
        let drives = vec!["sdb".to_string()];
        let mounts = vec![
            mount("overlay", "overlay", "/", 999),
            mount("/dev/mapper/vg-lv", "ext4", "/mnt/host", 999),
            mount("/dev/sdb1", "vfat", "/mnt/host/boot/efi", 7),
            mount("/dev/sdb2", "ext4", "/mnt/host/boot", 11),
        ];
        let blocks = vec![
            part("sdb1", "vfat", "/mnt/host/boot/efi"),
            part("sdb2", "ext4", "/mnt/host/boot"),
        ];

        let usage = resolve_drive_usage(&drives, &mounts, &blocks, &opts);

        // sdb1 under the boot prefix makes sdb the host; the root mount
        // is matched by `/` as well as by the prefix path.
        assert_eq!(usage[0].used_bytes, 999);
    }
}
