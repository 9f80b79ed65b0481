//! Storage detection from the mount table.

use std::path::Path;

use tracing::debug;

use crate::probe::SystemProbe;
use crate::types::{StorageDescriptor, StorageType};

const MOUNTS_PATH: &str = "/proc/mounts";

/// Pseudo filesystems excluded from storage reporting.
const PSEUDO_FILESYSTEMS: &[&str] = &[
    "autofs",
    "binfmt_misc",
    "bpf",
    "cgroup",
    "cgroup2",
    "configfs",
    "debugfs",
    "devpts",
    "devtmpfs",
    "efivarfs",
    "fusectl",
    "hugetlbfs",
    "mqueue",
    "nsfs",
    "overlay",
    "proc",
    "pstore",
    "ramfs",
    "rpc_pipefs",
    "securityfs",
    "squashfs",
    "sysfs",
    "tmpfs",
    "tracefs",
];

/// Filesystem types served over the network.
const NETWORK_FILESYSTEMS: &[&str] = &[
    "ceph", "cifs", "fuse.sshfs", "glusterfs", "nfs", "nfs4", "smb3", "smbfs",
];

/// Parse the mount table and size each real mount via statvfs. Mounts whose
/// size cannot be read are reported with zero sizes rather than dropped.
pub async fn detect_storage(probe: &dyn SystemProbe) -> Vec<StorageDescriptor> {
    let mounts = match probe.read_file(Path::new(MOUNTS_PATH)).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            debug!("mount table unavailable: {e}");
            return Vec::new();
        }
    };

    let mut storage = Vec::new();
    for mount in parse_mounts(&mounts) {
        let (total_bytes, available_bytes) =
            match probe.filesystem_stats(Path::new(&mount.mount_point)) {
                Ok(stats) => stats,
                Err(e) => {
                    debug!("statvfs failed for {}: {e}", mount.mount_point);
                    (0, 0)
                }
            };
        let network = NETWORK_FILESYSTEMS.contains(&mount.fs_type.as_str());
        storage.push(StorageDescriptor {
            storage_type: if network {
                StorageType::Network
            } else {
                StorageType::Local
            },
            path: mount.mount_point,
            total_bytes,
            available_bytes: available_bytes.min(total_bytes),
            read_only: mount.read_only,
            network,
            latency_us: None,
            bandwidth_mbps: None,
        });
    }
    storage
}

struct MountEntry {
    mount_point: String,
    fs_type: String,
    read_only: bool,
}

/// Parse the whitespace-separated mount table
/// (`device mount_point fs_type flags ...`), excluding pseudo filesystems.
fn parse_mounts(mounts: &str) -> Vec<MountEntry> {
    let mut entries = Vec::new();
    for line in mounts.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            continue;
        }
        let fs_type = fields[2];
        if PSEUDO_FILESYSTEMS.contains(&fs_type) {
            continue;
        }
        let read_only = fields[3].split(',').any(|flag| flag == "ro");
        entries.push(MountEntry {
            mount_point: fields[1].to_string(),
            fs_type: fs_type.to_string(),
            read_only,
        });
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeProbe;

    const MOUNTS: &str = "\
sysfs /sys sysfs rw,nosuid,nodev,noexec,relatime 0 0
proc /proc proc rw,nosuid,nodev,noexec,relatime 0 0
/dev/nvme0n1p2 / ext4 rw,relatime 0 0
/dev/nvme0n1p1 /boot vfat ro,relatime,fmask=0022 0 0
tmpfs /run tmpfs rw,nosuid,nodev 0 0
fileserver:/export /mnt/shared nfs4 rw,relatime,vers=4.2 0 0
overlay /var/lib/docker/overlay2/abc/merged overlay rw,relatime 0 0
";

    #[test]
    fn pseudo_filesystems_are_excluded() {
        let entries = parse_mounts(MOUNTS);
        let points: Vec<&str> = entries.iter().map(|e| e.mount_point.as_str()).collect();
        assert_eq!(points, vec!["/", "/boot", "/mnt/shared"]);
    }

    #[test]
    fn read_only_flag_is_parsed() {
        let entries = parse_mounts(MOUNTS);
        assert!(!entries[0].read_only);
        assert!(entries[1].read_only);
    }

    #[tokio::test]
    async fn sizes_and_network_classification() {
        let probe = FakeProbe::new()
            .with_file("/proc/mounts", MOUNTS)
            .with_filesystem_stats("/", 500_000_000_000, 250_000_000_000)
            .with_filesystem_stats("/boot", 1_000_000_000, 600_000_000)
            .with_filesystem_stats("/mnt/shared", 2_000_000_000_000, 1_500_000_000_000);

        let storage = detect_storage(&probe).await;
        assert_eq!(storage.len(), 3);

        let root = &storage[0];
        assert_eq!(root.storage_type, StorageType::Local);
        assert_eq!(root.total_bytes, 500_000_000_000);
        assert_eq!(root.available_bytes, 250_000_000_000);
        assert!(!root.network);

        let shared = &storage[2];
        assert_eq!(shared.storage_type, StorageType::Network);
        assert!(shared.network);
    }

    #[tokio::test]
    async fn unsizable_mounts_are_kept_with_zero_sizes() {
        let probe = FakeProbe::new().with_file("/proc/mounts", "/dev/sda1 /data ext4 rw 0 0\n");
        let storage = detect_storage(&probe).await;
        assert_eq!(storage.len(), 1);
        assert_eq!(storage[0].total_bytes, 0);
        assert_eq!(storage[0].available_bytes, 0);
    }

    #[tokio::test]
    async fn missing_mount_table_yields_empty() {
        let probe = FakeProbe::new();
        assert!(detect_storage(&probe).await.is_empty());
    }
}
