//! Vendor GPU adapters.
//!
//! Each adapter turns one vendor's tooling and sysfs layout into
//! [`GpuDescriptor`] records. Adapters never fail detection as a whole: a
//! broken or absent tool yields an empty list and a debug log line.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::probe::SystemProbe;
use crate::types::{GpuDescriptor, GpuVendor};

pub mod amd;
pub mod intel;
pub mod nvidia;

pub use amd::AmdAdapter;
pub use intel::IntelAdapter;
pub use nvidia::NvidiaAdapter;

const DRM_CLASS_PATH: &str = "/sys/class/drm";

#[async_trait]
pub trait GpuAdapter: Send + Sync {
    fn vendor(&self) -> GpuVendor;

    /// Detect this vendor's GPUs. Failures are swallowed into an empty list.
    async fn detect(&self, probe: &dyn SystemProbe, deadline: Duration) -> Vec<GpuDescriptor>;
}

/// The full adapter set in deterministic merge order.
pub fn default_adapters() -> Vec<Arc<dyn GpuAdapter>> {
    vec![
        Arc::new(NvidiaAdapter),
        Arc::new(AmdAdapter),
        Arc::new(IntelAdapter),
    ]
}

/// Run every adapter and merge the results.
///
/// Adapters run concurrently; the merge happens in adapter order so the
/// result is deterministic regardless of completion order.
pub async fn detect_gpus(
    adapters: &[Arc<dyn GpuAdapter>],
    probe: &dyn SystemProbe,
    deadline: Duration,
) -> Vec<GpuDescriptor> {
    let results =
        futures::future::join_all(adapters.iter().map(|a| a.detect(probe, deadline))).await;
    let mut merged = Vec::new();
    for list in results {
        merge_gpus(&mut merged, list);
    }
    merged.sort_by_key(|g| (g.vendor, g.index));
    merged
}

/// Merge `incoming` records into `acc`, deduplicating by `(vendor, index)`.
/// A later source fills fields the earlier record left absent; populated
/// fields are never overwritten, so the merge is idempotent.
pub fn merge_gpus(acc: &mut Vec<GpuDescriptor>, incoming: Vec<GpuDescriptor>) {
    for gpu in incoming {
        let existing = acc
            .iter_mut()
            .find(|g| g.vendor == gpu.vendor && g.index == gpu.index);
        match existing {
            Some(existing) => {
                if existing.name.is_empty() {
                    existing.name = gpu.name;
                }
                if existing.memory_mib == 0 {
                    existing.memory_mib = gpu.memory_mib;
                }
                if existing.pci_address.is_none() {
                    existing.pci_address = gpu.pci_address;
                }
                if existing.driver.is_none() {
                    existing.driver = gpu.driver;
                }
                if existing.compute_capability.is_none() {
                    existing.compute_capability = gpu.compute_capability;
                }
                if existing.temperature_c.is_none() {
                    existing.temperature_c = gpu.temperature_c;
                }
                if existing.utilization_pct.is_none() {
                    existing.utilization_pct = gpu.utilization_pct;
                }
                existing.available = existing.available || gpu.available;
            }
            None => acc.push(gpu),
        }
    }
}

/// A `/sys/class/drm/card{N}` entry that matched a vendor id.
pub(crate) struct SysfsCard {
    pub index: u64,
    pub pci_address: Option<String>,
    pub vram_total_bytes: Option<u64>,
}

/// Scan the DRM class directory for cards whose PCI vendor file matches
/// `vendor_hex` (e.g. `0x1002`). Connector entries (`card0-DP-1`) are skipped.
pub(crate) async fn scan_sysfs_cards(probe: &dyn SystemProbe, vendor_hex: &str) -> Vec<SysfsCard> {
    let entries = match probe.list_dir(Path::new(DRM_CLASS_PATH)).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!("DRM sysfs scan skipped: {e}");
            return Vec::new();
        }
    };

    let mut cards = Vec::new();
    for entry in entries {
        let Some(index) = card_index(&entry) else {
            continue;
        };
        let device = entry.join("device");
        let vendor = match probe.read_file(&device.join("vendor")).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).trim().to_lowercase(),
            Err(_) => continue,
        };
        if vendor != vendor_hex {
            continue;
        }

        let pci_address = match probe.read_file(&device.join("uevent")).await {
            Ok(bytes) => parse_pci_slot(&String::from_utf8_lossy(&bytes)),
            Err(_) => None,
        };
        let vram_total_bytes = match probe.read_file(&device.join("mem_info_vram_total")).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).trim().parse::<u64>().ok(),
            Err(_) => None,
        };

        cards.push(SysfsCard {
            index,
            pci_address,
            vram_total_bytes,
        });
    }
    cards
}

/// Extract `N` from a `cardN` directory name.
fn card_index(path: &Path) -> Option<u64> {
    let name = path.file_name()?.to_str()?;
    let digits = name.strip_prefix("card")?;
    if digits.is_empty() {
        return None;
    }
    digits.parse::<u64>().ok()
}

fn parse_pci_slot(uevent: &str) -> Option<String> {
    uevent
        .lines()
        .find_map(|line| line.strip_prefix("PCI_SLOT_NAME="))
        .map(|slot| slot.trim().to_lowercase())
}

pub(crate) const BYTES_PER_MIB: u64 = 1024 * 1024;

#[cfg(test)]
mod tests {
    use super::*;

    fn gpu(vendor: GpuVendor, index: u64, name: &str, memory_mib: u64) -> GpuDescriptor {
        GpuDescriptor {
            memory_mib,
            ..GpuDescriptor::new(vendor, index, name)
        }
    }

    #[test]
    fn merge_dedupes_by_vendor_and_index() {
        let mut acc = Vec::new();
        merge_gpus(
            &mut acc,
            vec![gpu(GpuVendor::Nvidia, 0, "NVIDIA A100", 40960)],
        );
        merge_gpus(&mut acc, vec![gpu(GpuVendor::Nvidia, 0, "", 0)]);
        merge_gpus(&mut acc, vec![gpu(GpuVendor::Amd, 0, "AMD GPU", 16384)]);

        assert_eq!(acc.len(), 2);
        assert_eq!(acc[0].name, "NVIDIA A100");
    }

    #[test]
    fn merge_fills_absent_fields_only() {
        let mut acc = vec![gpu(GpuVendor::Amd, 0, "Radeon RX 7900", 0)];
        let richer = GpuDescriptor {
            pci_address: Some("0000:03:00.0".to_string()),
            memory_mib: 24576,
            ..gpu(GpuVendor::Amd, 0, "different name", 24576)
        };
        merge_gpus(&mut acc, vec![richer]);

        assert_eq!(acc.len(), 1);
        // populated name is kept, absent fields are filled
        assert_eq!(acc[0].name, "Radeon RX 7900");
        assert_eq!(acc[0].memory_mib, 24576);
        assert_eq!(acc[0].pci_address.as_deref(), Some("0000:03:00.0"));
    }

    #[test]
    fn merge_is_idempotent() {
        let list = vec![
            gpu(GpuVendor::Nvidia, 0, "NVIDIA L4", 23034),
            gpu(GpuVendor::Nvidia, 1, "NVIDIA L4", 23034),
        ];
        let mut once = Vec::new();
        merge_gpus(&mut once, list.clone());
        let mut twice = once.clone();
        merge_gpus(&mut twice, list);
        assert_eq!(once, twice);
    }

    #[test]
    fn card_index_skips_connector_entries() {
        assert_eq!(card_index(Path::new("/sys/class/drm/card0")), Some(0));
        assert_eq!(card_index(Path::new("/sys/class/drm/card12")), Some(12));
        assert_eq!(card_index(Path::new("/sys/class/drm/card0-DP-1")), None);
        assert_eq!(card_index(Path::new("/sys/class/drm/renderD128")), None);
    }

    #[test]
    fn pci_slot_is_lowercased() {
        let uevent = "DRIVER=amdgpu\nPCI_CLASS=38000\nPCI_SLOT_NAME=0000:C1:00.0\n";
        assert_eq!(parse_pci_slot(uevent).as_deref(), Some("0000:c1:00.0"));
    }
}
