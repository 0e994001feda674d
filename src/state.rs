use crate::checks::CheckId;
use crate::config::Config;
use crate::datadir::{self, DataDirLocator, ResolutionError};
use crate::host::Host;
use crate::invocation::InvocationLog;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio::sync::OnceCell;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    /// Counted as a pass; the reason is informational.
    Skip(String),
    Fail(String),
}

impl Verdict {
    pub fn passed(&self) -> bool {
        !matches!(self, Verdict::Fail(_))
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            Verdict::Pass => None,
            Verdict::Skip(reason) => Some(reason),
            Verdict::Fail(detail) => Some(detail),
        }
    }
}

/// What a check produced: the verdict plus the raw probe output shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub verdict: Verdict,
    pub raw_output: String,
}

impl Outcome {
    pub fn pass(raw_output: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Pass,
            raw_output: raw_output.into(),
        }
    }

    pub fn skip(raw_output: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Skip(reason.into()),
            raw_output: raw_output.into(),
        }
    }

    pub fn fail(raw_output: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Fail(detail.into()),
            raw_output: raw_output.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRecord {
    pub id: CheckId,
    pub verdict: Verdict,
    pub raw_output: String,
}

impl CheckRecord {
    pub fn new(id: CheckId, outcome: Outcome) -> Self {
        Self {
            id,
            verdict: outcome.verdict,
            raw_output: outcome.raw_output,
        }
    }

    pub fn passed(&self) -> bool {
        self.verdict.passed()
    }
}

/// Per-run state shared by the checks. Paths are resolved lazily, at most
/// once, and the outcome (including a failure) is reused by every check.
pub struct RunContext<'a> {
    pub host: &'a dyn Host,
    pub config: &'a Config,
    pub helper_dir: PathBuf,
    pub http: Client,
    pub invocations: Option<InvocationLog>,
    data_dir: OnceLock<Result<PathBuf, ResolutionError>>,
    mount_source: OnceCell<Result<String, ResolutionError>>,
    on_nvme: OnceCell<Result<bool, ResolutionError>>,
}

impl<'a> RunContext<'a> {
    pub fn new(
        host: &'a dyn Host,
        config: &'a Config,
        helper_dir: PathBuf,
        http: Client,
        invocations: Option<InvocationLog>,
    ) -> Self {
        Self {
            host,
            config,
            helper_dir,
            http,
            invocations,
            data_dir: OnceLock::new(),
            mount_source: OnceCell::new(),
            on_nvme: OnceCell::new(),
        }
    }

    pub fn data_dir(&self) -> Result<&Path, ResolutionError> {
        self.data_dir
            .get_or_init(|| DataDirLocator::new(self.host, &self.config.data_dir).locate())
            .as_deref()
            .map_err(Clone::clone)
    }

    /// Device backing the data directory (findmnt, falling back to df).
    pub async fn mount_source(&self) -> Result<&str, ResolutionError> {
        self.mount_source
            .get_or_init(|| self.resolve_mount_source())
            .await
            .as_deref()
            .map_err(Clone::clone)
    }

    pub async fn on_nvme(&self) -> Result<bool, ResolutionError> {
        self.on_nvme
            .get_or_init(|| async {
                match self.mount_source().await {
                    Ok(device) => datadir::is_nvme(self.host, device).await,
                    Err(err) => Err(err),
                }
            })
            .await
            .clone()
    }

    async fn resolve_mount_source(&self) -> Result<String, ResolutionError> {
        let dir = self.data_dir()?;
        match datadir::resolve_mountpoint(self.host, dir).await {
            Err(ResolutionError::NoMountSource(_)) => {
                debug!(dir = %dir.display(), "findmnt gave no source, asking df");
                datadir::resolve_block_device(self.host, dir).await
            }
            other => other,
        }
    }
}
