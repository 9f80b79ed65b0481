//! Host introspection boundary.
//!
//! Everything impure the detector does goes through [`SystemProbe`]: process
//! execution, pseudo-filesystem reads, metadata HTTP calls, statvfs. The
//! production implementation is [`OsProbe`]; tests inject an in-memory fake.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{CapabilityError, Result};

/// Captured output of an external program.
#[derive(Debug, Clone)]
pub struct ProbeOutput {
    pub stdout: String,
    pub exit_code: i32,
}

impl ProbeOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// One network interface with its assigned addresses.
#[derive(Debug, Clone)]
pub struct InterfaceInfo {
    pub name: String,
    pub addresses: Vec<IpAddr>,
}

/// Single point of impurity for capability detection.
///
/// Every blocking interaction carries an explicit deadline; no call may block
/// indefinitely.
#[async_trait]
pub trait SystemProbe: Send + Sync {
    /// Run `program` with `args`, returning stdout and the exit code.
    ///
    /// Fails with [`CapabilityError::ProbeNotFound`] when the program is not
    /// on PATH and [`CapabilityError::ProbeTimeout`] when the deadline
    /// expires. A non-zero exit is not an error at this level.
    async fn run(&self, program: &str, args: &[&str], deadline: Duration) -> Result<ProbeOutput>;

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>>;

    async fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Plain GET used for cloud metadata endpoints. Never follows redirects
    /// and honours `timeout` strictly. An unreachable endpoint is an error
    /// here; callers treat it as "not on this cloud".
    async fn http_get(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<Vec<u8>>;

    /// Total and available bytes of the filesystem containing `path`.
    fn filesystem_stats(&self, path: &Path) -> Result<(u64, u64)>;

    fn network_interfaces(&self) -> Vec<InterfaceInfo>;

    fn hostname(&self) -> String;

    fn os(&self) -> String;

    fn arch(&self) -> String;

    fn logical_cpus(&self) -> usize;

    fn is_privileged(&self) -> bool;
}

/// Production probe backed by the operating system.
pub struct OsProbe {
    http: reqwest::Client,
}

impl OsProbe {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_default();
        Self { http }
    }
}

impl Default for OsProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SystemProbe for OsProbe {
    async fn run(&self, program: &str, args: &[&str], deadline: Duration) -> Result<ProbeOutput> {
        let mut command = tokio::process::Command::new(program);
        command
            .args(args)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(deadline, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CapabilityError::ProbeNotFound(program.to_string()));
            }
            Ok(Err(e)) => return Err(e.into()),
            // Dropping the future kills the child via kill_on_drop
            Err(_) => return Err(CapabilityError::ProbeTimeout(program.to_string())),
        };

        Ok(ProbeOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CapabilityError::NotFound(path.to_path_buf()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        let mut dir = match tokio::fs::read_dir(path).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CapabilityError::NotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = dir.next_entry().await? {
            entries.push(entry.path());
        }
        entries.sort();
        Ok(entries)
    }

    async fn http_get(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<Vec<u8>> {
        let mut request = self.http.get(url).timeout(timeout);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                CapabilityError::ProbeTimeout(url.to_string())
            } else {
                CapabilityError::Http(e.to_string())
            }
        })?;
        if !response.status().is_success() {
            return Err(CapabilityError::Http(format!(
                "{url} returned {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| CapabilityError::Http(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    fn filesystem_stats(&self, path: &Path) -> Result<(u64, u64)> {
        use std::os::unix::ffi::OsStrExt;

        let c_path = std::ffi::CString::new(path.as_os_str().as_bytes())
            .map_err(|_| CapabilityError::NotFound(path.to_path_buf()))?;
        let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
        if rc != 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        let frsize = if stat.f_frsize > 0 {
            stat.f_frsize as u64
        } else {
            stat.f_bsize as u64
        };
        Ok((stat.f_blocks as u64 * frsize, stat.f_bavail as u64 * frsize))
    }

    fn network_interfaces(&self) -> Vec<InterfaceInfo> {
        let networks = sysinfo::Networks::new_with_refreshed_list();
        let mut interfaces: Vec<InterfaceInfo> = networks
            .list()
            .iter()
            .map(|(name, data)| InterfaceInfo {
                name: name.clone(),
                addresses: data.ip_networks().iter().map(|net| net.addr).collect(),
            })
            .collect();
        interfaces.sort_by(|a, b| a.name.cmp(&b.name));
        interfaces
    }

    fn hostname(&self) -> String {
        sysinfo::System::host_name().unwrap_or_default()
    }

    fn os(&self) -> String {
        sysinfo::System::long_os_version()
            .unwrap_or_else(|| std::env::consts::OS.to_string())
    }

    fn arch(&self) -> String {
        std::env::consts::ARCH.to_string()
    }

    fn logical_cpus(&self) -> usize {
        num_cpus::get()
    }

    fn is_privileged(&self) -> bool {
        unsafe { libc::geteuid() == 0 }
    }
}
