//! Intel GPU detection via `xpu-smi` and the i915/xe sysfs layout.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::CapabilityError;
use crate::probe::SystemProbe;
use crate::types::{GpuDescriptor, GpuVendor};

use super::{merge_gpus, scan_sysfs_cards, GpuAdapter, BYTES_PER_MIB};

const XPU_SMI: &str = "xpu-smi";
const INTEL_VENDOR_HEX: &str = "0x8086";

pub struct IntelAdapter;

#[async_trait]
impl GpuAdapter for IntelAdapter {
    fn vendor(&self) -> GpuVendor {
        GpuVendor::Intel
    }

    async fn detect(&self, probe: &dyn SystemProbe, deadline: Duration) -> Vec<GpuDescriptor> {
        let mut gpus = match self.query_smi(probe, deadline).await {
            Ok(gpus) => gpus,
            Err(e) => {
                if !e.is_absence() {
                    debug!("xpu-smi detection skipped: {e}");
                }
                Vec::new()
            }
        };

        let sysfs = scan_sysfs_cards(probe, INTEL_VENDOR_HEX).await;
        let sysfs_gpus: Vec<GpuDescriptor> = sysfs
            .into_iter()
            .map(|card| GpuDescriptor {
                // Integrated parts have no dedicated VRAM file; 0 stands for
                // shared memory.
                memory_mib: card.vram_total_bytes.map_or(0, |b| b / BYTES_PER_MIB),
                pci_address: card.pci_address,
                ..GpuDescriptor::new(GpuVendor::Intel, card.index, "Intel GPU")
            })
            .collect();
        merge_gpus(&mut gpus, sysfs_gpus);
        gpus
    }
}

impl IntelAdapter {
    async fn query_smi(
        &self,
        probe: &dyn SystemProbe,
        deadline: Duration,
    ) -> crate::error::Result<Vec<GpuDescriptor>> {
        let output = probe.run(XPU_SMI, &["discovery", "-j"], deadline).await?;
        if !output.success() {
            debug!("{XPU_SMI} exited with {}", output.exit_code);
            return Ok(Vec::new());
        }
        parse_discovery_json(&output.stdout)
    }
}

/// Parse `xpu-smi discovery -j` output: a `device_list` array of objects.
/// A well-formed document without a `device_list` simply has no GPUs.
fn parse_discovery_json(output: &str) -> crate::error::Result<Vec<GpuDescriptor>> {
    let value: serde_json::Value = serde_json::from_str(output)
        .map_err(|e| CapabilityError::parse(XPU_SMI, e.to_string()))?;
    let Some(devices) = value.get("device_list").and_then(|d| d.as_array()) else {
        return Ok(Vec::new());
    };

    let mut gpus = Vec::new();
    for device in devices {
        let Some(index) = device.get("device_id").and_then(|v| v.as_u64()) else {
            continue;
        };
        let name = device
            .get("device_name")
            .and_then(|v| v.as_str())
            .unwrap_or("Intel GPU");
        let memory_bytes = device
            .get("memory_physical_size_byte")
            .and_then(|v| match v {
                serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
                other => other.as_u64(),
            })
            .unwrap_or(0);
        let pci_address = device
            .get("pci_bdf_address")
            .and_then(|v| v.as_str())
            .map(|s| s.to_lowercase());

        gpus.push(GpuDescriptor {
            memory_mib: memory_bytes / BYTES_PER_MIB,
            pci_address,
            ..GpuDescriptor::new(GpuVendor::Intel, index, name)
        });
    }
    gpus.sort_by_key(|g| g.index);
    Ok(gpus)
}
