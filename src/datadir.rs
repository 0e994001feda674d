//! Finding the sui-node database directory and the device it lives on.

use crate::config::DataDirConfig;
use crate::host::Host;
use crate::probes::{lsblk, mounts};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

const CONFIG_PATH_FLAG: &str = "--config-path";
const DB_PATH_KEY: &str = "db-path";
const MAX_PARENT_HOPS: usize = 4;
const PSEUDO_FILESYSTEMS: [&str; 4] = ["/proc", "/sys", "/dev", "/run"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("could not find sui db (looked for a running {process}, a `{search_name}` directory and {candidates})")]
    DataDirNotFound {
        process: String,
        search_name: String,
        candidates: String,
    },
    #[error("configured data directory {0} does not exist")]
    OverrideMissing(String),
    #[error("could not find mountpoint for {0}")]
    NoMountSource(String),
    #[error("could not find block device for {0}")]
    NoBlockDevice(String),
    #[error("could not determine transport of {device}: {message}")]
    Transport { device: String, message: String },
    #[error("{step} failed: {message}")]
    Probe { step: &'static str, message: String },
}

pub struct DataDirLocator<'a> {
    host: &'a dyn Host,
    cfg: &'a DataDirConfig,
}

impl<'a> DataDirLocator<'a> {
    pub fn new(host: &'a dyn Host, cfg: &'a DataDirConfig) -> Self {
        Self { host, cfg }
    }

    /// Tries the override, the running node's config, a bounded search and
    /// the static candidates, in that order.
    pub fn locate(&self) -> Result<PathBuf, ResolutionError> {
        if let Some(path) = &self.cfg.path {
            if self.host.exists(path) {
                info!(path = %path.display(), "using configured data directory");
                return Ok(path.clone());
            }
            return Err(ResolutionError::OverrideMissing(path.display().to_string()));
        }

        if let Some(path) = self.from_running_process() {
            info!(path = %path.display(), "data directory taken from running node config");
            return Ok(path);
        }

        if let Some(path) = self.search() {
            info!(path = %path.display(), "data directory found by search");
            return Ok(path);
        }

        if let Some(path) = self
            .cfg
            .candidates
            .iter()
            .find(|candidate| self.host.exists(candidate))
        {
            info!(path = %path.display(), "data directory found at conventional location");
            return Ok(path.clone());
        }

        Err(ResolutionError::DataDirNotFound {
            process: self.cfg.process_name.clone(),
            search_name: self.cfg.search_name.clone(),
            candidates: self
                .cfg
                .candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    fn from_running_process(&self) -> Option<PathBuf> {
        let processes = self.host.processes();
        for process in processes.iter().filter(|p| {
            p.name.contains(&self.cfg.process_name)
                || p.cmd
                    .first()
                    .is_some_and(|arg0| arg0.ends_with(&self.cfg.process_name))
        }) {
            let Some(config_path) = config_path_arg(&process.cmd) else {
                debug!(pid = process.pid, "node process has no --config-path argument");
                continue;
            };
            let config_path = relative_to(process.cwd.as_deref(), config_path);
            let text = match self.host.read_to_string(&config_path) {
                Ok(text) => text,
                Err(err) => {
                    debug!(pid = process.pid, error = %err, "cannot read node config");
                    continue;
                }
            };
            match db_path_from_config(&text) {
                Some(path) => return Some(relative_to(process.cwd.as_deref(), path)),
                None => {
                    debug!(config = %config_path.display(), "node config has no db-path entry")
                }
            }
        }
        None
    }

    fn search(&self) -> Option<PathBuf> {
        let mut queue: VecDeque<(PathBuf, usize)> = self
            .cfg
            .search_roots
            .iter()
            .map(|root| (root.clone(), 0))
            .collect();

        while let Some((dir, depth)) = queue.pop_front() {
            if depth >= self.cfg.search_depth {
                continue;
            }
            let Ok(entries) = self.host.list_dir(&dir) else {
                continue;
            };
            for entry in entries {
                if PSEUDO_FILESYSTEMS.iter().any(|skip| entry == Path::new(skip)) {
                    continue;
                }
                if !self.host.is_dir(&entry) {
                    continue;
                }
                if entry
                    .file_name()
                    .is_some_and(|name| name == self.cfg.search_name.as_str())
                {
                    return Some(entry);
                }
                queue.push_back((entry, depth + 1));
            }
        }
        None
    }
}

/// Relative paths given to the node are relative to the node's working
/// directory, not ours.
fn relative_to(cwd: Option<&Path>, path: PathBuf) -> PathBuf {
    match cwd {
        Some(cwd) if path.is_relative() => cwd.join(path),
        _ => path,
    }
}

/// Value of `--config-path <file>` or `--config-path=<file>`.
pub fn config_path_arg(cmd: &[String]) -> Option<PathBuf> {
    let mut args = cmd.iter();
    while let Some(arg) = args.next() {
        if arg == CONFIG_PATH_FLAG {
            return args.next().map(PathBuf::from);
        }
        if let Some(value) = arg
            .strip_prefix(CONFIG_PATH_FLAG)
            .and_then(|rest| rest.strip_prefix('='))
        {
            return Some(PathBuf::from(value));
        }
    }
    None
}

/// `db-path:` from a sui-node YAML config.
pub fn db_path_from_config(yaml: &str) -> Option<PathBuf> {
    let value: serde_yaml::Value = serde_yaml::from_str(yaml).ok()?;
    value
        .get(DB_PATH_KEY)
        .and_then(serde_yaml::Value::as_str)
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
}

/// Mount source of `dir` as reported by findmnt.
pub async fn resolve_mountpoint(host: &dyn Host, dir: &Path) -> Result<String, ResolutionError> {
    let output = mounts::findmnt_source(host, dir)
        .await
        .map_err(|err| ResolutionError::Probe {
            step: "findmnt",
            message: err.to_string(),
        })?;
    mounts::parse_findmnt(&output)
        .ok_or_else(|| ResolutionError::NoMountSource(dir.display().to_string()))
}

/// Backing device of `dir` as reported by df.
pub async fn resolve_block_device(
    host: &dyn Host,
    dir: &Path,
) -> Result<String, ResolutionError> {
    let output = mounts::df_source(host, dir)
        .await
        .map_err(|err| ResolutionError::Probe {
            step: "df",
            message: err.to_string(),
        })?;
    mounts::parse_df(&output)
        .ok_or_else(|| ResolutionError::NoBlockDevice(dir.display().to_string()))
}

/// Whether `device` is attached over NVMe. Devices without a transport of
/// their own (partitions, dm/LVM volumes) are judged by the first ancestor
/// along the `pkname` chain that has one.
pub async fn is_nvme(host: &dyn Host, device: &str) -> Result<bool, ResolutionError> {
    let mut dev = describe(host, device).await?;
    for _ in 0..MAX_PARENT_HOPS {
        if dev.tran.is_some() {
            break;
        }
        let Some(parent) = dev.pkname.take() else {
            break;
        };
        let parent_dev = describe(host, &format!("/dev/{parent}")).await?;
        debug!(
            device,
            child = %dev.name,
            parent = %parent_dev.name,
            tran = ?parent_dev.tran,
            "following parent device"
        );
        dev = parent_dev;
    }
    Ok(dev.is_nvme())
}

async fn describe(host: &dyn Host, device: &str) -> Result<lsblk::BlockDevice, ResolutionError> {
    let output = lsblk::query(host, device)
        .await
        .map_err(|err| ResolutionError::Probe {
            step: "lsblk",
            message: err.to_string(),
        })?;
    lsblk::parse(&output).map_err(|err| ResolutionError::Transport {
        device: device.to_string(),
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::fake::FakeHost;

    fn cfg() -> DataDirConfig {
        DataDirConfig {
            search_depth: 3,
            ..DataDirConfig::default()
        }
    }

    #[test]
    fn config_path_both_spellings() {
        let split = vec![
            "/usr/bin/sui-node".to_string(),
            "--config-path".to_string(),
            "/opt/sui/config/fullnode.yaml".to_string(),
        ];
        let joined = vec![
            "sui-node".to_string(),
            "--config-path=/etc/sui/validator.yaml".to_string(),
        ];
        assert_eq!(
            config_path_arg(&split),
            Some(PathBuf::from("/opt/sui/config/fullnode.yaml"))
        );
        assert_eq!(
            config_path_arg(&joined),
            Some(PathBuf::from("/etc/sui/validator.yaml"))
        );
        assert_eq!(config_path_arg(&["sui-node".to_string()]), None);
    }

    #[test]
    fn db_path_read_from_yaml() {
        let yaml = "---\nprotocol-key-pair:\n  path: /opt/sui/key-pairs/protocol.key\ndb-path: /opt/sui/db/authorities_db\nnetwork-address: /ip4/0.0.0.0/tcp/8080/http\n";
        assert_eq!(
            db_path_from_config(yaml),
            Some(PathBuf::from("/opt/sui/db/authorities_db"))
        );
        assert_eq!(db_path_from_config("genesis: {}\n"), None);
    }

    #[test]
    fn running_node_config_wins() {
        let host = FakeHost::new()
            .with_process(
                "sui-node",
                &["/usr/local/bin/sui-node", "--config-path", "/opt/sui/config/validator.yaml"],
            )
            .with_file("/opt/sui/config/validator.yaml", "db-path: /mnt/nvme/suidb\n")
            .with_dir("/opt/sui/db");
        let cfg = cfg();
        let path = DataDirLocator::new(&host, &cfg).locate().unwrap();
        assert_eq!(path, PathBuf::from("/mnt/nvme/suidb"));
    }

    #[test]
    fn relative_node_paths_resolve_against_node_cwd() {
        let host = FakeHost::new()
            .with_process_in(
                "sui-node",
                "/opt/sui",
                &["sui-node", "--config-path", "config/fullnode.yaml"],
            )
            .with_file("/opt/sui/config/fullnode.yaml", "db-path: db/suidb\n");
        let cfg = cfg();
        let path = DataDirLocator::new(&host, &cfg).locate().unwrap();
        assert_eq!(path, PathBuf::from("/opt/sui/db/suidb"));
    }

    #[test]
    fn absolute_db_path_ignores_node_cwd() {
        let host = FakeHost::new()
            .with_process_in(
                "sui-node",
                "/home/sui",
                &["sui-node", "--config-path=/etc/sui/fullnode.yaml"],
            )
            .with_file("/etc/sui/fullnode.yaml", "db-path: /mnt/nvme/suidb\n");
        let cfg = cfg();
        let path = DataDirLocator::new(&host, &cfg).locate().unwrap();
        assert_eq!(path, PathBuf::from("/mnt/nvme/suidb"));
    }

    #[test]
    fn search_finds_named_directory_within_depth() {
        let host = FakeHost::new()
            .with_dir("/srv/chain/suidb")
            .with_dir("/opt/sui/db");
        let cfg = cfg();
        let path = DataDirLocator::new(&host, &cfg).locate().unwrap();
        assert_eq!(path, PathBuf::from("/srv/chain/suidb"));
    }

    #[test]
    fn search_respects_depth_bound() {
        let host = FakeHost::new()
            .with_dir("/a/b/c/d/suidb")
            .with_dir("/data/sui/db");
        let cfg = cfg();
        let path = DataDirLocator::new(&host, &cfg).locate().unwrap();
        assert_eq!(path, PathBuf::from("/data/sui/db"));
    }

    #[test]
    fn search_skips_pseudo_filesystems() {
        let host = FakeHost::new().with_dir("/proc/suidb");
        let cfg = cfg();
        let err = DataDirLocator::new(&host, &cfg).locate().unwrap_err();
        assert!(matches!(err, ResolutionError::DataDirNotFound { .. }));
    }

    #[test]
    fn override_must_exist() {
        let host = FakeHost::new().with_dir("/opt/sui/db");
        let cfg = DataDirConfig {
            path: Some(PathBuf::from("/mnt/elsewhere")),
            ..cfg()
        };
        let err = DataDirLocator::new(&host, &cfg).locate().unwrap_err();
        assert_eq!(err, ResolutionError::OverrideMissing("/mnt/elsewhere".to_string()));
    }

    #[tokio::test]
    async fn empty_findmnt_output_is_no_mount_source() {
        let host = FakeHost::new().with_command("findmnt", "\n");
        let err = resolve_mountpoint(&host, Path::new("/opt/sui/db"))
            .await
            .unwrap_err();
        assert_eq!(err, ResolutionError::NoMountSource("/opt/sui/db".to_string()));
    }

    #[tokio::test]
    async fn df_source_resolves_device() {
        let host = FakeHost::new().with_command("df --output=source", "Filesystem\n/dev/md1\n");
        let dev = resolve_block_device(&host, Path::new("/opt/sui/db"))
            .await
            .unwrap();
        assert_eq!(dev, "/dev/md1");
    }

    #[tokio::test]
    async fn partition_inherits_parent_transport() {
        let host = FakeHost::new()
            .with_command(
                "lsblk -JO /dev/nvme0n1p2",
                r#"{"blockdevices":[{"name":"nvme0n1p2","pkname":"nvme0n1","tran":null}]}"#,
            )
            .with_command(
                "lsblk -JO /dev/nvme0n1",
                r#"{"blockdevices":[{"name":"nvme0n1","tran":"nvme"}]}"#,
            );
        assert!(is_nvme(&host, "/dev/nvme0n1p2").await.unwrap());
    }

    #[tokio::test]
    async fn stacked_volume_follows_pkname_chain() {
        let host = FakeHost::new()
            .with_command(
                "lsblk -JO /dev/mapper/vg-sui",
                r#"{"blockdevices":[{"name":"vg-sui","pkname":"nvme0n1p3","tran":null}]}"#,
            )
            .with_command(
                "lsblk -JO /dev/nvme0n1p3",
                r#"{"blockdevices":[{"name":"nvme0n1p3","pkname":"nvme0n1","tran":null}]}"#,
            )
            .with_command(
                "lsblk -JO /dev/nvme0n1",
                r#"{"blockdevices":[{"name":"nvme0n1","tran":"nvme"}]}"#,
            );
        assert!(is_nvme(&host, "/dev/mapper/vg-sui").await.unwrap());
        assert_eq!(host.commands().len(), 3);
    }

    #[tokio::test]
    async fn parent_chain_is_bounded() {
        // Every device claims itself as parent.
        let host = FakeHost::new().with_command(
            "lsblk -JO /dev/",
            r#"{"blockdevices":[{"name":"loop0","pkname":"loop0","tran":null}]}"#,
        );
        assert!(!is_nvme(&host, "/dev/loop0").await.unwrap());
        assert_eq!(host.commands().len(), 1 + MAX_PARENT_HOPS);
    }

    #[tokio::test]
    async fn sata_disk_is_not_nvme() {
        let host = FakeHost::new().with_command(
            "lsblk -JO /dev/sda1",
            r#"{"blockdevices":[{"name":"sda1","tran":"sata"}]}"#,
        );
        assert!(!is_nvme(&host, "/dev/sda1").await.unwrap());
        assert_eq!(host.commands().len(), 1);
    }
}
