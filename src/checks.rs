use crate::config::{NetworkProbe, Thresholds};
use crate::datadir::ResolutionError;
use crate::host::{DiskUsage, ProbeError};
use crate::parse::ParseError;
use crate::probes::{clock, cpu_bench, hdparm, procfs, speedtest};
use crate::state::{CheckRecord, Outcome, RunContext};
use serde_json::json;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

const BYTES_PER_GB: f64 = (1u64 << 30) as f64;
const BYTES_PER_TB: f64 = (1u64 << 40) as f64;
const PERFORMANCE_GOVERNOR: &str = "performance";

#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckId {
    ClockSynchronization,
    NetworkSpeed,
    DiskReadSpeed,
    DataDirOnNvme,
    CpuThreads,
    CpuSpeed,
    CpuGovernor,
    Memory,
    StorageSpace,
    RmemMax,
    WmemMax,
    PacketLoss,
}

impl CheckId {
    /// Every check, in report order.
    pub const ALL: [CheckId; 12] = [
        CheckId::ClockSynchronization,
        CheckId::NetworkSpeed,
        CheckId::DiskReadSpeed,
        CheckId::DataDirOnNvme,
        CheckId::CpuThreads,
        CheckId::CpuSpeed,
        CheckId::CpuGovernor,
        CheckId::Memory,
        CheckId::StorageSpace,
        CheckId::RmemMax,
        CheckId::WmemMax,
        CheckId::PacketLoss,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            CheckId::ClockSynchronization => "clock_synchronization",
            CheckId::NetworkSpeed => "network_speed",
            CheckId::DiskReadSpeed => "disk_read_speed",
            CheckId::DataDirOnNvme => "data_dir_on_nvme",
            CheckId::CpuThreads => "cpu_threads",
            CheckId::CpuSpeed => "cpu_speed",
            CheckId::CpuGovernor => "cpu_governor",
            CheckId::Memory => "memory",
            CheckId::StorageSpace => "storage_space",
            CheckId::RmemMax => "rmem_max",
            CheckId::WmemMax => "wmem_max",
            CheckId::PacketLoss => "packet_loss",
        }
    }

    /// Whether the check needs the data directory to be resolved.
    pub const fn needs_data_dir(self) -> bool {
        matches!(
            self,
            CheckId::DiskReadSpeed | CheckId::DataDirOnNvme | CheckId::StorageSpace
        )
    }
}

impl fmt::Display for CheckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CheckId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CheckId::ALL
            .into_iter()
            .find(|id| id.name() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = CheckId::ALL.iter().map(|id| id.name()).collect();
                format!("unknown check `{s}`, expected one of: {}", known.join(", "))
            })
    }
}

/// Applies `--only` / `--skip` to the fixed check order.
pub fn select(only: &[CheckId], skip: &[CheckId]) -> Vec<CheckId> {
    CheckId::ALL
        .into_iter()
        .filter(|id| only.is_empty() || only.contains(id))
        .filter(|id| !skip.contains(id))
        .collect()
}

/// Runs one check. Errors never escape: they become a failed record.
pub async fn run_check(ctx: &RunContext<'_>, id: CheckId) -> CheckRecord {
    let started = Instant::now();
    let result = dispatch(ctx, id).await;

    if let Some(log) = &ctx.invocations {
        let args = json!({ "check": id.name() });
        match &result {
            Ok(outcome) => log.record(
                id.name(),
                args,
                Ok(json!({
                    "passed": outcome.verdict.passed(),
                    "detail": outcome.verdict.detail(),
                    "output": outcome.raw_output,
                })),
            ),
            Err(err) => log.record(id.name(), args, Err(err.to_string())),
        }
    }

    let record = match result {
        Ok(outcome) => CheckRecord::new(id, outcome),
        Err(err) => {
            warn!(check = id.name(), error = %err, "check raised an error");
            CheckRecord::new(id, Outcome::fail(String::new(), err.to_string()))
        }
    };

    info!(
        check = id.name(),
        passed = record.passed(),
        detail = record.verdict.detail().unwrap_or(""),
        elapsed = %humantime::format_duration(started.elapsed()),
        "check finished"
    );
    record
}

async fn dispatch(ctx: &RunContext<'_>, id: CheckId) -> Result<Outcome, CheckError> {
    match id {
        CheckId::ClockSynchronization => clock_synchronization(ctx).await,
        CheckId::NetworkSpeed => network_speed(ctx).await,
        CheckId::DiskReadSpeed => disk_read_speed(ctx).await,
        CheckId::DataDirOnNvme => data_dir_on_nvme(ctx).await,
        CheckId::CpuThreads => cpu_threads(ctx),
        CheckId::CpuSpeed => cpu_speed(ctx).await,
        CheckId::CpuGovernor => cpu_governor(ctx),
        CheckId::Memory => memory(ctx),
        CheckId::StorageSpace => storage_space(ctx),
        CheckId::RmemMax => socket_buffer(ctx, SocketBuffer::Receive),
        CheckId::WmemMax => socket_buffer(ctx, SocketBuffer::Send),
        CheckId::PacketLoss => Ok(packet_loss()),
    }
}

async fn clock_synchronization(ctx: &RunContext<'_>) -> Result<Outcome, CheckError> {
    let output = clock::query(ctx.host, &ctx.helper_dir).await?;
    Ok(if clock::is_synchronized(&output) {
        Outcome::pass(output)
    } else {
        Outcome::fail(output, "clock does not appear to be synchronized")
    })
}

async fn network_speed(ctx: &RunContext<'_>) -> Result<Outcome, CheckError> {
    let network = &ctx.config.network;
    let output = match network.probe {
        NetworkProbe::SpeedtestCli => speedtest::run_cli(ctx.host, &network.command).await?,
        NetworkProbe::Cloudflare => {
            speedtest::measure_cloudflare(&ctx.http, &network.cloudflare).await?
        }
    };
    Ok(evaluate_network(output, &ctx.config.thresholds)?)
}

pub fn evaluate_network(output: String, t: &Thresholds) -> Result<Outcome, ParseError> {
    let report = speedtest::parse(&output)?;
    if report.download_mbit < t.min_download_mbit || report.upload_mbit < t.min_upload_mbit {
        return Ok(Outcome::fail(
            output,
            format!(
                "download speed must be at least {} Mbit/s and upload speed at least {} Mbit/s",
                t.min_download_mbit, t.min_upload_mbit
            ),
        ));
    }
    Ok(Outcome::pass(output))
}

async fn disk_read_speed(ctx: &RunContext<'_>) -> Result<Outcome, CheckError> {
    let data_dir = ctx.data_dir()?;
    let device = ctx.mount_source().await?;
    if ctx.on_nvme().await? {
        return Ok(Outcome::skip(
            describe_placement(data_dir, device, true),
            "data directory is on an NVMe device",
        ));
    }
    let output = hdparm::run(ctx.host, device).await?;
    Ok(evaluate_disk(output, &ctx.config.thresholds)?)
}

pub fn evaluate_disk(output: String, t: &Thresholds) -> Result<Outcome, ParseError> {
    let report = hdparm::parse(&output)?;
    if report.slowest() < t.min_disk_read_mb_per_sec {
        return Ok(Outcome::fail(
            output,
            format!(
                "disk read speed must be at least {} MB/s",
                t.min_disk_read_mb_per_sec
            ),
        ));
    }
    Ok(Outcome::pass(output))
}

async fn data_dir_on_nvme(ctx: &RunContext<'_>) -> Result<Outcome, CheckError> {
    let data_dir = ctx.data_dir()?;
    let device = ctx.mount_source().await?;
    let nvme = ctx.on_nvme().await?;
    let placement = describe_placement(data_dir, device, nvme);
    Ok(if nvme {
        Outcome::pass(placement)
    } else {
        Outcome::fail(placement, "data directory is not on an NVMe device")
    })
}

fn describe_placement(data_dir: &Path, device: &str, nvme: bool) -> String {
    format!(
        "sui DB dir: {}; mountpoint: {device}; nvme: {nvme}",
        data_dir.display()
    )
}

fn cpu_threads(ctx: &RunContext<'_>) -> Result<Outcome, CheckError> {
    let cpuinfo = ctx.host.read_to_string(Path::new(procfs::CPUINFO))?;
    Ok(evaluate_cpu_threads(
        procfs::count_processors(&cpuinfo),
        &ctx.config.thresholds,
    ))
}

pub fn evaluate_cpu_threads(threads: usize, t: &Thresholds) -> Outcome {
    if threads >= t.min_cpu_threads {
        Outcome::pass(threads.to_string())
    } else {
        Outcome::fail(
            threads.to_string(),
            format!("sui-node requires >= {} CPU threads", t.min_cpu_threads),
        )
    }
}

async fn cpu_speed(ctx: &RunContext<'_>) -> Result<Outcome, CheckError> {
    let t = &ctx.config.thresholds;
    let output = cpu_bench::run(
        ctx.host,
        &ctx.helper_dir,
        t.cpu_test_1_iterations,
        t.cpu_test_2_iterations,
    )
    .await?;
    Ok(evaluate_cpu_speed(output, t)?)
}

pub fn evaluate_cpu_speed(output: String, t: &Thresholds) -> Result<Outcome, ParseError> {
    let report = cpu_bench::parse(&output)?;
    let mut errors = String::new();
    if report.test_1_secs > t.max_cpu_test_1_secs {
        errors.push_str(&format!(
            "Test 1 FAIL, average time greater than max, {} > {}\n",
            report.test_1_secs, t.max_cpu_test_1_secs
        ));
    }
    if report.test_2_secs > t.max_cpu_test_2_secs {
        errors.push_str(&format!(
            "Test 2 FAIL, average time greater than max, {} > {}\n",
            report.test_2_secs, t.max_cpu_test_2_secs
        ));
    }
    if errors.is_empty() {
        return Ok(Outcome::pass(output));
    }
    Ok(Outcome::fail(
        format!("{output}\n{errors}"),
        "Check for any CPU governors (ex power saver mode) that might throttle the CPU speed\nMake sure minimum CPU requirements are met",
    ))
}

fn cpu_governor(ctx: &RunContext<'_>) -> Result<Outcome, CheckError> {
    let entries = ctx.host.list_dir(procfs::cpu_sysfs()).unwrap_or_default();
    let mut governors = Vec::new();
    for path in procfs::governor_paths(&entries) {
        if !ctx.host.is_file(&path) {
            continue;
        }
        let governor = ctx.host.read_to_string(&path)?;
        governors.push((path, governor.trim().to_string()));
    }
    Ok(evaluate_governors(&governors))
}

pub fn evaluate_governors(governors: &[(PathBuf, String)]) -> Outcome {
    if governors.is_empty() {
        return Outcome::skip("no governor detected", "no cpufreq scaling governor present");
    }
    if let Some((path, governor)) = governors
        .iter()
        .find(|(_, governor)| governor != PERFORMANCE_GOVERNOR)
    {
        return Outcome::fail(
            format!("{}: {governor}", path.display()),
            "CPU governor detected that is not set to performance",
        );
    }
    Outcome::pass(format!(
        "{PERFORMANCE_GOVERNOR} ({} CPUs)",
        governors.len()
    ))
}

fn memory(ctx: &RunContext<'_>) -> Result<Outcome, CheckError> {
    let meminfo = ctx.host.read_to_string(Path::new(procfs::MEMINFO))?;
    Ok(evaluate_memory(&meminfo, &ctx.config.thresholds)?)
}

pub fn evaluate_memory(meminfo: &str, t: &Thresholds) -> Result<Outcome, ParseError> {
    let total_kb = procfs::parse_mem_total_kb(meminfo)?;
    let line = procfs::mem_total_line(meminfo).unwrap_or_default().to_string();
    if total_kb >= t.min_mem_total_kb {
        return Ok(Outcome::pass(line));
    }
    Ok(Outcome::fail(
        line,
        format!(
            "sui-node requires >= {}G total memory",
            t.min_mem_total_kb / 1_000_000
        ),
    ))
}

fn storage_space(ctx: &RunContext<'_>) -> Result<Outcome, CheckError> {
    let data_dir = ctx.data_dir()?;
    let usage = ctx.host.disk_usage(data_dir)?;
    Ok(evaluate_storage(data_dir, usage, &ctx.config.thresholds))
}

pub fn evaluate_storage(data_dir: &Path, usage: DiskUsage, t: &Thresholds) -> Outcome {
    let total_tb = usage.total_bytes as f64 / BYTES_PER_TB;
    let used_gb = usage.used_bytes as f64 / BYTES_PER_GB;
    let free_gb = usage.free_bytes as f64 / BYTES_PER_GB;
    let output = format!(
        "Storage space for sui db located at {}\nTotal: {total_tb:.2} TB\nUsed: {used_gb:.2} GB\nFree: {free_gb:.2} GB",
        data_dir.display()
    );

    if free_gb < t.min_free_storage_gb {
        return Outcome::fail(
            output,
            format!(
                "free space left on device is very low (below {} GB)",
                t.min_free_storage_gb
            ),
        );
    }
    if total_tb < t.min_total_storage_tb {
        return Outcome::fail(
            output,
            format!(
                "total space on device is lower than recommended {} TB",
                t.min_total_storage_tb
            ),
        );
    }
    Outcome::pass(output)
}

#[derive(Debug, Clone, Copy)]
enum SocketBuffer {
    Receive,
    Send,
}

fn socket_buffer(ctx: &RunContext<'_>, buffer: SocketBuffer) -> Result<Outcome, CheckError> {
    let t = &ctx.config.thresholds;
    let (path, sysctl, minimum, direction) = match buffer {
        SocketBuffer::Receive => (procfs::RMEM_MAX, "net.core.rmem_max", t.min_rmem_max, "receive"),
        SocketBuffer::Send => (procfs::WMEM_MAX, "net.core.wmem_max", t.min_wmem_max, "send"),
    };
    let text = ctx.host.read_to_string(Path::new(path))?;
    let value = procfs::parse_sysctl(&text)?;
    Ok(evaluate_socket_buffer(value, minimum, sysctl, direction))
}

pub fn evaluate_socket_buffer(value: u64, minimum: u64, sysctl: &str, direction: &str) -> Outcome {
    if value >= minimum {
        return Outcome::pass(value.to_string());
    }
    Outcome::fail(
        value.to_string(),
        format!(
            "for best network performance, increase maximum socket {direction} buffer size with `sysctl -w {sysctl}={minimum}`"
        ),
    )
}

// TODO: measure loss with a short ICMP run against a configurable target.
fn packet_loss() -> Outcome {
    Outcome::fail("not implemented", "not implemented")
}
