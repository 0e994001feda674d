use crate::host::spinner::while_running;
use crate::host::{DiskUsage, Host, Invocation, ProbeError, ProcessInfo};
use crate::invocation::InvocationLog;
use crate::report;
use async_trait::async_trait;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use sysinfo::{PidExt, ProcessExt, System, SystemExt};
use tokio::process::Command;
use tracing::{debug, warn};

/// The real machine: `sh -c` for commands, std::fs for pseudo-files,
/// statvfs for usage and sysinfo for the process table.
pub struct SystemHost {
    invocations: Option<InvocationLog>,
}

impl SystemHost {
    pub fn new(invocations: Option<InvocationLog>) -> Self {
        Self { invocations }
    }
}

#[async_trait]
impl Host for SystemHost {
    async fn run(&self, invocation: &Invocation) -> Result<String, ProbeError> {
        debug!(command = %invocation.command, cwd = ?invocation.cwd, "running command");

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&invocation.command)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = &invocation.cwd {
            cmd.current_dir(dir);
        }

        let output = while_running(&invocation.command, cmd.output()).await;
        let result = finish(invocation, output);

        if let Some(log) = &self.invocations {
            let args = json!({
                "command": invocation.command,
                "cwd": invocation.cwd,
                "check": invocation.check,
            });
            match &result {
                Ok(stdout) => log.record("run_command", args, Ok(json!(stdout))),
                Err(err) => log.record("run_command", args, Err(err.to_string())),
            }
        }

        result
    }

    fn read_to_string(&self, path: &Path) -> Result<String, ProbeError> {
        let text = fs::read_to_string(path).map_err(|err| ProbeError::io(path, err))?;
        debug!(path = %path.display(), contents = %text.trim_end(), "read pseudo-file");
        Ok(text)
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>, ProbeError> {
        let entries = fs::read_dir(path).map_err(|err| ProbeError::io(path, err))?;
        let mut out: Vec<PathBuf> = entries.flatten().map(|entry| entry.path()).collect();
        out.sort();
        Ok(out)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn disk_usage(&self, path: &Path) -> Result<DiskUsage, ProbeError> {
        statvfs_usage(path)
    }

    fn processes(&self) -> Vec<ProcessInfo> {
        let mut system = System::new();
        system.refresh_processes();
        system
            .processes()
            .iter()
            .map(|(pid, process)| ProcessInfo {
                pid: pid.as_u32(),
                name: process.name().to_string(),
                cmd: process.cmd().to_vec(),
                cwd: Some(process.cwd())
                    .filter(|cwd| !cwd.as_os_str().is_empty())
                    .map(Path::to_path_buf),
            })
            .collect()
    }
}

fn finish(
    invocation: &Invocation,
    output: std::io::Result<Output>,
) -> Result<String, ProbeError> {
    let output = output.map_err(|source| ProbeError::Spawn {
        command: invocation.command.clone(),
        source,
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    let code = output.status.code().unwrap_or(-1);
    debug!(
        command = %invocation.command,
        code,
        stdout = %stdout.trim_end(),
        stderr = %stderr.trim_end(),
        "command finished"
    );

    if !stderr.trim().is_empty() {
        warn!(command = %invocation.command, stderr = %stderr.trim_end(), "command wrote to stderr");
        report::print_stderr(&stderr);
    }

    if invocation.check && !output.status.success() {
        return Err(ProbeError::Exit {
            command: invocation.command.clone(),
            code,
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(stdout)
}

#[cfg(unix)]
#[allow(clippy::unnecessary_cast)]
fn statvfs_usage(path: &Path) -> Result<DiskUsage, ProbeError> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|err| {
        ProbeError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, err),
        )
    })?;

    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    if unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) } != 0 {
        return Err(ProbeError::io(path, std::io::Error::last_os_error()));
    }

    let fragment = stat.f_frsize as u64;
    let blocks = stat.f_blocks as u64;
    let free_blocks = stat.f_bfree as u64;
    let available_blocks = stat.f_bavail as u64;
    Ok(DiskUsage {
        total_bytes: blocks * fragment,
        used_bytes: blocks.saturating_sub(free_blocks) * fragment,
        free_bytes: available_blocks * fragment,
    })
}

#[cfg(not(unix))]
fn statvfs_usage(path: &Path) -> Result<DiskUsage, ProbeError> {
    Err(ProbeError::io(
        path,
        std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "storage statistics are only available on unix",
        ),
    ))
}
