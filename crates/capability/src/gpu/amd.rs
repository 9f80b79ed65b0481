//! AMD GPU detection via `rocm-smi` and the amdgpu sysfs layout.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::CapabilityError;
use crate::probe::SystemProbe;
use crate::types::{GpuDescriptor, GpuVendor};

use super::{merge_gpus, scan_sysfs_cards, GpuAdapter, BYTES_PER_MIB};

const ROCM_SMI: &str = "rocm-smi";
const AMD_VENDOR_HEX: &str = "0x1002";

pub struct AmdAdapter;

#[async_trait]
impl GpuAdapter for AmdAdapter {
    fn vendor(&self) -> GpuVendor {
        GpuVendor::Amd
    }

    async fn detect(&self, probe: &dyn SystemProbe, deadline: Duration) -> Vec<GpuDescriptor> {
        let mut gpus = match self.query_smi(probe, deadline).await {
            Ok(gpus) => gpus,
            Err(e) => {
                if !e.is_absence() {
                    debug!("rocm-smi detection skipped: {e}");
                }
                Vec::new()
            }
        };

        // The sysfs scan runs regardless; it backfills cards rocm-smi does
        // not know about and enriches PCI addresses.
        let sysfs = scan_sysfs_cards(probe, AMD_VENDOR_HEX).await;
        let sysfs_gpus: Vec<GpuDescriptor> = sysfs
            .into_iter()
            .map(|card| GpuDescriptor {
                memory_mib: card.vram_total_bytes.map_or(0, |b| b / BYTES_PER_MIB),
                pci_address: card.pci_address,
                ..GpuDescriptor::new(GpuVendor::Amd, card.index, "AMD GPU")
            })
            .collect();
        merge_gpus(&mut gpus, sysfs_gpus);
        gpus
    }
}

impl AmdAdapter {
    async fn query_smi(
        &self,
        probe: &dyn SystemProbe,
        deadline: Duration,
    ) -> crate::error::Result<Vec<GpuDescriptor>> {
        let output = probe
            .run(
                ROCM_SMI,
                &["--showproductname", "--showmeminfo", "vram", "--json"],
                deadline,
            )
            .await?;
        if !output.success() {
            debug!("{ROCM_SMI} exited with {}", output.exit_code);
            return Ok(Vec::new());
        }
        parse_rocm_json(&output.stdout)
    }
}

/// Parse `rocm-smi --json` output, a map of `cardN` objects. VRAM totals are
/// reported in bytes and converted to MiB.
fn parse_rocm_json(output: &str) -> crate::error::Result<Vec<GpuDescriptor>> {
    let value: serde_json::Value = serde_json::from_str(output)
        .map_err(|e| CapabilityError::parse(ROCM_SMI, e.to_string()))?;
    let Some(map) = value.as_object() else {
        return Err(CapabilityError::parse(ROCM_SMI, "JSON root is not an object"));
    };

    let mut gpus = Vec::new();
    for (key, card) in map {
        let Some(index) = key.strip_prefix("card").and_then(|n| n.parse::<u64>().ok()) else {
            continue;
        };
        let Some(fields) = card.as_object() else {
            continue;
        };

        let name = ["Card series", "Card model", "Card SKU"]
            .iter()
            .find_map(|k| fields.get(*k).and_then(|v| v.as_str()))
            .unwrap_or("AMD GPU");
        let memory_bytes = fields
            .iter()
            .find(|(k, _)| k.contains("VRAM Total Memory"))
            .and_then(|(_, v)| match v {
                serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
                other => other.as_u64(),
            })
            .unwrap_or(0);

        gpus.push(GpuDescriptor {
            memory_mib: memory_bytes / BYTES_PER_MIB,
            ..GpuDescriptor::new(GpuVendor::Amd, index, name)
        });
    }
    gpus.sort_by_key(|g| g.index);
    Ok(gpus)
}
