//! Execution engine detection: container, wasm and native runtimes.

use std::time::Duration;

use tracing::debug;

use crate::probe::SystemProbe;
use crate::types::{EngineDescriptor, EngineType};

const DOCKER: &str = "docker";

/// Constraint set on the container engine when the process is unprivileged
/// and no rootless context exists.
pub const CONSTRAINT_REQUIRES_PERMISSIONS: &str = "requires-permissions";
/// Constraint set on the native engine when the process runs as root.
pub const CONSTRAINT_RUNNING_AS_PRIVILEGED: &str = "running-as-privileged";

/// External wasm runtimes that add to the embedded one.
const WASM_RUNTIMES: &[&str] = &["wasmtime", "wasmer"];
/// Interpreters reported as native engine features when present on PATH.
const NATIVE_INTERPRETERS: &[&str] = &["bash", "sh", "python3", "node"];

/// Detect all engine types. Never fails; an engine that cannot be probed is
/// reported unavailable.
pub async fn detect_engines(probe: &dyn SystemProbe, deadline: Duration) -> Vec<EngineDescriptor> {
    let (container, wasm, native) = tokio::join!(
        detect_container(probe, deadline),
        detect_wasm(probe, deadline),
        detect_native(probe, deadline),
    );
    vec![container, wasm, native]
}

/// The container engine is present when the client binary exists on PATH and
/// its version query exits zero.
async fn detect_container(probe: &dyn SystemProbe, deadline: Duration) -> EngineDescriptor {
    let version = match probe
        .run(DOCKER, &["version", "--format", "{{.Server.Version}}"], deadline)
        .await
    {
        Ok(output) if output.success() => {
            let version = output.stdout.trim().to_string();
            if version.is_empty() { None } else { Some(version) }
        }
        Ok(output) => {
            debug!("{DOCKER} version query exited with {}", output.exit_code);
            return EngineDescriptor::unavailable(EngineType::Container);
        }
        Err(e) => {
            debug!("container engine probe skipped: {e}");
            return EngineDescriptor::unavailable(EngineType::Container);
        }
    };

    let mut features = Vec::new();
    if run_succeeds(probe, DOCKER, &["buildx", "version"], deadline).await {
        features.push("buildx".to_string());
    }
    if run_succeeds(probe, DOCKER, &["compose", "version"], deadline).await {
        features.push("compose".to_string());
    }

    let mut rootless = false;
    if let Ok(info) = probe.run(DOCKER, &["info"], deadline).await {
        if info.success() {
            let info = info.stdout.to_lowercase();
            if info.contains("nvidia") {
                features.push("nvidia-runtime".to_string());
            }
            if info.contains("rootless") {
                rootless = true;
                features.push("rootless".to_string());
            }
        }
    }

    let mut constraints = Vec::new();
    if !probe.is_privileged() && !rootless {
        constraints.push(CONSTRAINT_REQUIRES_PERMISSIONS.to_string());
    }

    EngineDescriptor {
        engine: EngineType::Container,
        version,
        available: true,
        constraints,
        features,
    }
}

/// The wasm engine is always available through the embedded runtime;
/// external runtimes on PATH are surfaced as features.
async fn detect_wasm(probe: &dyn SystemProbe, deadline: Duration) -> EngineDescriptor {
    let mut features = Vec::new();
    for runtime in WASM_RUNTIMES {
        if run_succeeds(probe, runtime, &["--version"], deadline).await {
            features.push((*runtime).to_string());
        }
    }

    EngineDescriptor {
        engine: EngineType::Wasm,
        version: None,
        available: true,
        constraints: Vec::new(),
        features,
    }
}

/// Native execution is always available. Well-known interpreters become
/// features; running as root is surfaced as a constraint.
async fn detect_native(probe: &dyn SystemProbe, deadline: Duration) -> EngineDescriptor {
    let mut features = Vec::new();
    for interpreter in NATIVE_INTERPRETERS {
        // Presence on PATH is what matters, not the exit code of --version.
        if probe.run(interpreter, &["--version"], deadline).await.is_ok() {
            features.push((*interpreter).to_string());
        }
    }

    let mut constraints = Vec::new();
    if probe.is_privileged() {
        constraints.push(CONSTRAINT_RUNNING_AS_PRIVILEGED.to_string());
    }

    EngineDescriptor {
        engine: EngineType::Native,
        version: None,
        available: true,
        constraints,
        features,
    }
}

async fn run_succeeds(
    probe: &dyn SystemProbe,
    program: &str,
    args: &[&str],
    deadline: Duration,
) -> bool {
    matches!(probe.run(program, args, deadline).await, Ok(output) if output.success())
}
