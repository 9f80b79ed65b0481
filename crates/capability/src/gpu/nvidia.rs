//! NVIDIA GPU detection via `nvidia-smi`.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{CapabilityError, Result};
use crate::probe::SystemProbe;
use crate::types::{GpuDescriptor, GpuVendor};

use super::GpuAdapter;

const NVIDIA_SMI: &str = "nvidia-smi";
const QUERY_FIELDS: &str =
    "index,name,memory.total,driver_version,compute_cap,temperature.gpu,utilization.gpu,pci.bus_id";

pub struct NvidiaAdapter;

#[async_trait]
impl GpuAdapter for NvidiaAdapter {
    fn vendor(&self) -> GpuVendor {
        GpuVendor::Nvidia
    }

    async fn detect(&self, probe: &dyn SystemProbe, deadline: Duration) -> Vec<GpuDescriptor> {
        match self.query_smi(probe, deadline).await {
            Ok(gpus) => gpus,
            Err(e) => {
                // a missing nvidia-smi just means no NVIDIA GPUs
                if !e.is_absence() {
                    debug!("NVIDIA detection skipped: {e}");
                }
                Vec::new()
            }
        }
    }
}

impl NvidiaAdapter {
    async fn query_smi(
        &self,
        probe: &dyn SystemProbe,
        deadline: Duration,
    ) -> Result<Vec<GpuDescriptor>> {
        let query = format!("--query-gpu={QUERY_FIELDS}");
        let output = probe
            .run(
                NVIDIA_SMI,
                &[&query, "--format=csv,noheader,nounits"],
                deadline,
            )
            .await?;
        if !output.success() {
            debug!("{NVIDIA_SMI} exited with {}", output.exit_code);
            return Ok(Vec::new());
        }
        parse_smi_output(&output.stdout)
    }
}

/// Parse the comma-separated query output. Missing trailing fields and
/// `[N/A]` placeholders are tolerated; lines without a valid index are
/// dropped. Output that contains rows but yields no GPUs is a parse error.
fn parse_smi_output(output: &str) -> Result<Vec<GpuDescriptor>> {
    let mut gpus = Vec::new();
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let Some(index) = fields.first().and_then(|f| f.parse::<u64>().ok()) else {
            debug!("skipping unparseable {NVIDIA_SMI} line: {line}");
            continue;
        };

        let mut gpu = GpuDescriptor::new(
            GpuVendor::Nvidia,
            index,
            field(&fields, 1).unwrap_or_default(),
        );
        gpu.memory_mib = field(&fields, 2)
            .and_then(|f| f.parse::<u64>().ok())
            .unwrap_or(0);
        gpu.driver = field(&fields, 3).map(str::to_string);
        gpu.compute_capability = field(&fields, 4).map(str::to_string);
        gpu.temperature_c = field(&fields, 5).and_then(|f| f.parse::<f32>().ok());
        gpu.utilization_pct = field(&fields, 6).and_then(|f| f.parse::<f32>().ok());
        gpu.pci_address = field(&fields, 7).map(|f| f.to_lowercase());
        gpus.push(gpu);
    }
    if gpus.is_empty() && !output.trim().is_empty() {
        return Err(CapabilityError::parse(
            NVIDIA_SMI,
            "no parseable GPU rows in query output",
        ));
    }
    Ok(gpus)
}

/// Field accessor treating `[N/A]`, `N/A` and empty strings as absent.
fn field<'a>(fields: &[&'a str], index: usize) -> Option<&'a str> {
    match fields.get(index).copied() {
        Some("") | Some("N/A") | Some("[N/A]") | None => None,
        Some(value) => Some(value),
    }
}
