use crate::config::HelpersConfig;
use crate::host::{Host, Invocation, ProbeError};
use crate::probes::{clock, cpu_bench};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const HELPERS: [&str; 2] = [clock::HELPER, cpu_bench::HELPER];

/// Directory holding `check_time` and `check_cpu_speed`: the configured one,
/// else next to the running executable.
pub fn helper_dir(cfg: &HelpersConfig) -> PathBuf {
    if let Some(dir) = &cfg.dir {
        return dir.clone();
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn missing(host: &dyn Host, dir: &Path) -> Vec<&'static str> {
    HELPERS
        .into_iter()
        .filter(|name| !host.is_file(&dir.join(name)))
        .collect()
}

/// Builds missing helpers when a build command is configured. Returns the
/// helpers still missing afterwards.
pub async fn prepare(
    host: &dyn Host,
    dir: &Path,
    cfg: &HelpersConfig,
) -> Result<Vec<&'static str>, ProbeError> {
    let absent = missing(host, dir);
    if absent.is_empty() {
        return Ok(absent);
    }

    if let Some(command) = &cfg.build_command {
        info!(dir = %dir.display(), missing = ?absent, command = command.as_str(), "building helper binaries");
        host.run(&Invocation::new(command.as_str()).in_dir(dir).checked())
            .await?;
    }

    let absent = missing(host, dir);
    for name in &absent {
        warn!(helper = name, dir = %dir.display(), "helper binary not found");
    }
    Ok(absent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::fake::FakeHost;

    #[test]
    fn configured_dir_wins() {
        let cfg = HelpersConfig {
            dir: Some(PathBuf::from("/opt/doctor/bin")),
            build_command: None,
        };
        assert_eq!(helper_dir(&cfg), PathBuf::from("/opt/doctor/bin"));
    }

    #[test]
    fn defaults_next_to_executable() {
        let dir = helper_dir(&HelpersConfig::default());
        let exe = std::env::current_exe().unwrap();
        assert_eq!(Some(dir.as_path()), exe.parent());
    }

    #[tokio::test]
    async fn present_helpers_skip_the_build() {
        let host = FakeHost::new()
            .with_file("/opt/doctor/check_time", "")
            .with_file("/opt/doctor/check_cpu_speed", "")
            .with_command("cargo", "");
        let cfg = HelpersConfig {
            dir: None,
            build_command: Some("cargo build --release --bins".to_string()),
        };
        let absent = prepare(&host, Path::new("/opt/doctor"), &cfg).await.unwrap();
        assert!(absent.is_empty());
        assert!(host.commands().is_empty());
    }

    #[tokio::test]
    async fn missing_helper_triggers_build() {
        let host = FakeHost::new()
            .with_file("/opt/doctor/check_time", "")
            .with_command("cargo", "");
        let cfg = HelpersConfig {
            dir: None,
            build_command: Some("cargo build --release --bins".to_string()),
        };
        let absent = prepare(&host, Path::new("/opt/doctor"), &cfg).await.unwrap();
        assert!(host.ran("cargo build --release --bins"));
        // The fake file system does not change, so the helper is still reported.
        assert_eq!(absent, vec![cpu_bench::HELPER]);
    }

    #[tokio::test]
    async fn failed_build_is_an_error() {
        let host = FakeHost::new().with_failing_command("make", 2, "no rule");
        let cfg = HelpersConfig {
            dir: None,
            build_command: Some("make helpers".to_string()),
        };
        let err = prepare(&host, Path::new("/opt/doctor"), &cfg)
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Exit { code: 2, .. }));
    }

    #[tokio::test]
    async fn no_build_command_only_reports() {
        let host = FakeHost::new();
        let absent = prepare(&host, Path::new("/opt/doctor"), &HelpersConfig::default())
            .await
            .unwrap();
        assert_eq!(absent, HELPERS.to_vec());
        assert!(host.commands().is_empty());
    }
}
