pub mod spinner;
pub mod system;

#[cfg(test)]
pub mod fake;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use system::SystemHost;

/// A shell command to run on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: String,
    pub cwd: Option<PathBuf>,
    /// Fail with [`ProbeError::Exit`] on a non-zero exit status.
    pub check: bool,
}

impl Invocation {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            cwd: None,
            check: false,
        }
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn checked(mut self) -> Self {
        self.check = true;
        self
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("`{command}` exited with code {code}: {stderr}")]
    Exit {
        command: String,
        code: i32,
        stderr: String,
    },
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("network probe failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl ProbeError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskUsage {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub cmd: Vec<String>,
    /// Working directory, when the process table exposes it.
    pub cwd: Option<PathBuf>,
}

/// Everything the checks need from the machine they run on.
///
/// Commands, pseudo-files, file-system statistics and the process table all
/// go through this trait, so a check never touches the OS directly.
#[async_trait]
pub trait Host: Send + Sync {
    /// Runs a shell command and returns its decoded stdout.
    async fn run(&self, invocation: &Invocation) -> Result<String, ProbeError>;

    fn read_to_string(&self, path: &Path) -> Result<String, ProbeError>;

    /// Immediate children of `path`, sorted.
    fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>, ProbeError>;

    fn exists(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    fn is_file(&self, path: &Path) -> bool;

    fn disk_usage(&self, path: &Path) -> Result<DiskUsage, ProbeError>;

    fn processes(&self) -> Vec<ProcessInfo>;
}
