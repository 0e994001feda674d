use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub data_dir: DataDirConfig,
    #[serde(default)]
    pub helpers: HelpersConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

/// Minimum (or, for the CPU timings, maximum) values a host must meet.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Thresholds {
    #[serde(default = "default_min_net_mbit")]
    pub min_download_mbit: f64,
    #[serde(default = "default_min_net_mbit")]
    pub min_upload_mbit: f64,
    #[serde(default = "default_min_disk_read_mb_per_sec")]
    pub min_disk_read_mb_per_sec: f64,
    #[serde(default = "default_min_cpu_threads")]
    pub min_cpu_threads: usize,
    #[serde(default = "default_min_mem_total_kb")]
    pub min_mem_total_kb: u64,
    #[serde(default = "default_min_socket_buffer")]
    pub min_rmem_max: u64,
    #[serde(default = "default_min_socket_buffer")]
    pub min_wmem_max: u64,
    #[serde(default = "default_max_cpu_test_1_secs")]
    pub max_cpu_test_1_secs: f64,
    #[serde(default = "default_max_cpu_test_2_secs")]
    pub max_cpu_test_2_secs: f64,
    #[serde(default = "default_cpu_test_iterations")]
    pub cpu_test_1_iterations: u32,
    #[serde(default = "default_cpu_test_iterations")]
    pub cpu_test_2_iterations: u32,
    #[serde(default = "default_min_free_storage_gb")]
    pub min_free_storage_gb: f64,
    #[serde(default = "default_min_total_storage_tb")]
    pub min_total_storage_tb: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataDirConfig {
    /// Skips discovery entirely when set.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_process_name")]
    pub process_name: String,
    #[serde(default = "default_search_name")]
    pub search_name: String,
    #[serde(default = "default_search_roots")]
    pub search_roots: Vec<PathBuf>,
    #[serde(default = "default_search_depth")]
    pub search_depth: usize,
    #[serde(default = "default_candidates")]
    pub candidates: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HelpersConfig {
    /// Directory holding `check_time` and `check_cpu_speed`; defaults to the
    /// directory of the running executable.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Run when a helper binary is missing.
    #[serde(default)]
    pub build_command: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkProbe {
    #[default]
    SpeedtestCli,
    Cloudflare,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub probe: NetworkProbe,
    #[serde(default = "default_speedtest_command")]
    pub command: String,
    #[serde(default)]
    pub cloudflare: CloudflareConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CloudflareConfig {
    #[serde(default = "default_cloudflare_base_url")]
    pub base_url: String,
    #[serde(default = "default_download_bytes")]
    pub download_bytes: usize,
    #[serde(default = "default_upload_bytes")]
    pub upload_bytes: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_download_mbit: default_min_net_mbit(),
            min_upload_mbit: default_min_net_mbit(),
            min_disk_read_mb_per_sec: default_min_disk_read_mb_per_sec(),
            min_cpu_threads: default_min_cpu_threads(),
            min_mem_total_kb: default_min_mem_total_kb(),
            min_rmem_max: default_min_socket_buffer(),
            min_wmem_max: default_min_socket_buffer(),
            max_cpu_test_1_secs: default_max_cpu_test_1_secs(),
            max_cpu_test_2_secs: default_max_cpu_test_2_secs(),
            cpu_test_1_iterations: default_cpu_test_iterations(),
            cpu_test_2_iterations: default_cpu_test_iterations(),
            min_free_storage_gb: default_min_free_storage_gb(),
            min_total_storage_tb: default_min_total_storage_tb(),
        }
    }
}

impl Default for DataDirConfig {
    fn default() -> Self {
        Self {
            path: None,
            process_name: default_process_name(),
            search_name: default_search_name(),
            search_roots: default_search_roots(),
            search_depth: default_search_depth(),
            candidates: default_candidates(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            probe: NetworkProbe::default(),
            command: default_speedtest_command(),
            cloudflare: CloudflareConfig::default(),
        }
    }
}

impl Default for CloudflareConfig {
    fn default() -> Self {
        Self {
            base_url: default_cloudflare_base_url(),
            download_bytes: default_download_bytes(),
            upload_bytes: default_upload_bytes(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse YAML in {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        let cfg: Config = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_thresholds(&self.thresholds)?;
        validate_data_dir(&self.data_dir)?;
        validate_network(&self.network)?;
        if let Some(cmd) = &self.helpers.build_command {
            if cmd.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "helpers.build_command must not be blank".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

fn validate_thresholds(t: &Thresholds) -> Result<(), ConfigError> {
    let positive = [
        ("thresholds.min_download_mbit", t.min_download_mbit),
        ("thresholds.min_upload_mbit", t.min_upload_mbit),
        ("thresholds.min_disk_read_mb_per_sec", t.min_disk_read_mb_per_sec),
        ("thresholds.max_cpu_test_1_secs", t.max_cpu_test_1_secs),
        ("thresholds.max_cpu_test_2_secs", t.max_cpu_test_2_secs),
        ("thresholds.min_free_storage_gb", t.min_free_storage_gb),
        ("thresholds.min_total_storage_tb", t.min_total_storage_tb),
    ];
    for (name, value) in positive {
        if !(value.is_finite() && value > 0.0) {
            return Err(ConfigError::Validation(format!("{name} must be > 0")));
        }
    }
    if t.cpu_test_1_iterations < 1 || t.cpu_test_2_iterations < 1 {
        return Err(ConfigError::Validation(
            "thresholds.cpu_test_*_iterations must be >= 1".to_string(),
        ));
    }
    Ok(())
}

fn validate_data_dir(cfg: &DataDirConfig) -> Result<(), ConfigError> {
    if cfg.process_name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "data_dir.process_name must not be empty".to_string(),
        ));
    }
    if cfg.search_name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "data_dir.search_name must not be empty".to_string(),
        ));
    }
    if cfg.search_depth < 1 {
        return Err(ConfigError::Validation(
            "data_dir.search_depth must be >= 1".to_string(),
        ));
    }
    if cfg.search_roots.is_empty() {
        return Err(ConfigError::Validation(
            "data_dir.search_roots must list at least one directory".to_string(),
        ));
    }
    if cfg.candidates.is_empty() {
        return Err(ConfigError::Validation(
            "data_dir.candidates must list at least one directory".to_string(),
        ));
    }
    Ok(())
}

fn validate_network(cfg: &NetworkConfig) -> Result<(), ConfigError> {
    match cfg.probe {
        NetworkProbe::SpeedtestCli => {
            if cfg.command.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "network.command must not be empty".to_string(),
                ));
            }
        }
        NetworkProbe::Cloudflare => {
            let cf = &cfg.cloudflare;
            if cf.base_url.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "network.cloudflare.base_url must not be empty".to_string(),
                ));
            }
            if cf.download_bytes == 0 || cf.upload_bytes == 0 {
                return Err(ConfigError::Validation(
                    "network.cloudflare byte counts must be > 0".to_string(),
                ));
            }
            if cf.timeout_secs == 0 {
                return Err(ConfigError::Validation(
                    "network.cloudflare.timeout_secs must be > 0".to_string(),
                ));
            }
        }
    }
    Ok(())
}

const fn default_min_net_mbit() -> f64 {
    1000.0
}

const fn default_min_disk_read_mb_per_sec() -> f64 {
    1000.0
}

const fn default_min_cpu_threads() -> usize {
    48
}

const fn default_min_mem_total_kb() -> u64 {
    128_000_000
}

const fn default_min_socket_buffer() -> u64 {
    104_857_600
}

const fn default_max_cpu_test_1_secs() -> f64 {
    3.5
}

const fn default_max_cpu_test_2_secs() -> f64 {
    6.0
}

const fn default_cpu_test_iterations() -> u32 {
    10
}

const fn default_min_free_storage_gb() -> f64 {
    10.0
}

const fn default_min_total_storage_tb() -> f64 {
    1.5
}

fn default_process_name() -> String {
    "sui-node".to_string()
}

fn default_search_name() -> String {
    "suidb".to_string()
}

fn default_search_roots() -> Vec<PathBuf> {
    vec![PathBuf::from("/")]
}

const fn default_search_depth() -> usize {
    4
}

fn default_candidates() -> Vec<PathBuf> {
    ["/opt/sui/db", "/data/sui/db", "/var/lib/docker/volumes/suidb"]
        .into_iter()
        .map(PathBuf::from)
        .collect()
}

fn default_speedtest_command() -> String {
    "speedtest-cli --secure".to_string()
}

fn default_cloudflare_base_url() -> String {
    "https://speed.cloudflare.com".to_string()
}

const fn default_download_bytes() -> usize {
    25_000_000
}

const fn default_upload_bytes() -> usize {
    10_000_000
}

const fn default_timeout_secs() -> u64 {
    30
}
