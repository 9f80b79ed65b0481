//! In-memory [`SystemProbe`] for tests.

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{CapabilityError, Result};
use crate::probe::{InterfaceInfo, ProbeOutput, SystemProbe};

/// Scripted probe. Programs are keyed by the full command line
/// (`"prog arg1 arg2"`) with a fallback on the bare program name; anything
/// not registered behaves as absent from the host.
#[derive(Default)]
pub struct FakeProbe {
    programs: HashMap<String, (String, i32)>,
    files: HashMap<PathBuf, Vec<u8>>,
    dirs: HashMap<PathBuf, Vec<PathBuf>>,
    http: HashMap<String, Vec<u8>>,
    stats: HashMap<PathBuf, (u64, u64)>,
    interfaces: Vec<InterfaceInfo>,
    hostname: String,
    os: String,
    arch: String,
    cpus: usize,
    privileged: bool,
}

impl FakeProbe {
    pub fn new() -> Self {
        Self {
            hostname: "test-node".to_string(),
            os: "linux".to_string(),
            arch: "x86_64".to_string(),
            cpus: 4,
            ..Self::default()
        }
    }

    pub fn with_program(mut self, command_line: &str, stdout: &str, exit_code: i32) -> Self {
        self.programs
            .insert(command_line.to_string(), (stdout.to_string(), exit_code));
        self
    }

    pub fn with_file(mut self, path: &str, contents: &str) -> Self {
        self.files
            .insert(PathBuf::from(path), contents.as_bytes().to_vec());
        self
    }

    pub fn with_dir(mut self, path: &str, entries: &[&str]) -> Self {
        self.dirs.insert(
            PathBuf::from(path),
            entries.iter().map(PathBuf::from).collect(),
        );
        self
    }

    pub fn with_http(mut self, url: &str, body: &str) -> Self {
        self.http.insert(url.to_string(), body.as_bytes().to_vec());
        self
    }

    pub fn with_filesystem_stats(mut self, path: &str, total: u64, available: u64) -> Self {
        self.stats.insert(PathBuf::from(path), (total, available));
        self
    }

    pub fn with_interface(mut self, name: &str, addresses: &[IpAddr]) -> Self {
        self.interfaces.push(InterfaceInfo {
            name: name.to_string(),
            addresses: addresses.to_vec(),
        });
        self
    }

    pub fn privileged(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }

    pub fn with_hostname(mut self, hostname: &str) -> Self {
        self.hostname = hostname.to_string();
        self
    }
}

#[async_trait]
impl SystemProbe for FakeProbe {
    async fn run(&self, program: &str, args: &[&str], _deadline: Duration) -> Result<ProbeOutput> {
        let full = if args.is_empty() {
            program.to_string()
        } else {
            format!("{program} {}", args.join(" "))
        };
        let hit = self.programs.get(&full).or_else(|| self.programs.get(program));
        match hit {
            Some((stdout, exit_code)) => Ok(ProbeOutput {
                stdout: stdout.clone(),
                exit_code: *exit_code,
            }),
            None => Err(CapabilityError::ProbeNotFound(program.to_string())),
        }
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| CapabilityError::NotFound(path.to_path_buf()))
    }

    async fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        self.dirs
            .get(path)
            .cloned()
            .ok_or_else(|| CapabilityError::NotFound(path.to_path_buf()))
    }

    async fn http_get(
        &self,
        url: &str,
        _headers: &[(&str, &str)],
        _timeout: Duration,
    ) -> Result<Vec<u8>> {
        self.http
            .get(url)
            .cloned()
            .ok_or_else(|| CapabilityError::Http(format!("unreachable: {url}")))
    }

    fn filesystem_stats(&self, path: &Path) -> Result<(u64, u64)> {
        self.stats
            .get(path)
            .copied()
            .ok_or_else(|| CapabilityError::NotFound(path.to_path_buf()))
    }

    fn network_interfaces(&self) -> Vec<InterfaceInfo> {
        self.interfaces.clone()
    }

    fn hostname(&self) -> String {
        self.hostname.clone()
    }

    fn os(&self) -> String {
        self.os.clone()
    }

    fn arch(&self) -> String {
        self.arch.clone()
    }

    fn logical_cpus(&self) -> usize {
        self.cpus
    }

    fn is_privileged(&self) -> bool {
        self.privileged
    }
}
