use crate::parse::{parse_integer, regex, ParseError};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const CPUINFO: &str = "/proc/cpuinfo";
pub const MEMINFO: &str = "/proc/meminfo";
pub const RMEM_MAX: &str = "/proc/sys/net/core/rmem_max";
pub const WMEM_MAX: &str = "/proc/sys/net/core/wmem_max";
pub const CPU_SYSFS: &str = "/sys/devices/system/cpu";

static MEM_TOTAL: OnceLock<Regex> = OnceLock::new();

/// Number of logical CPUs listed in `/proc/cpuinfo`.
pub fn count_processors(cpuinfo: &str) -> usize {
    cpuinfo
        .lines()
        .filter(|line| line.starts_with("processor"))
        .count()
}

/// The `MemTotal:` line of `/proc/meminfo`, if present.
pub fn mem_total_line(meminfo: &str) -> Option<&str> {
    meminfo.lines().find(|line| line.starts_with("MemTotal"))
}

/// `MemTotal` in kB.
pub fn parse_mem_total_kb(meminfo: &str) -> Result<u64, ParseError> {
    let re = regex(&MEM_TOTAL, r"(?m)^MemTotal:\s+([0-9]+)");
    let caps = re.captures(meminfo).ok_or_else(|| ParseError::NoMatch {
        pattern: re.as_str().to_string(),
        text: meminfo.to_string(),
    })?;
    parse_integer("meminfo", &caps[1])
}

pub fn parse_sysctl(text: &str) -> Result<u64, ParseError> {
    parse_integer("sysctl", text)
}

/// Candidate `scaling_governor` files, i.e. the expansion of
/// `cpu*/cpufreq/scaling_governor` below [`CPU_SYSFS`] given its entries.
pub fn governor_paths(cpu_entries: &[PathBuf]) -> Vec<PathBuf> {
    cpu_entries
        .iter()
        .filter(|entry| {
            entry
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("cpu"))
        })
        .map(|entry| entry.join("cpufreq").join("scaling_governor"))
        .collect()
}

pub fn cpu_sysfs() -> &'static Path {
    Path::new(CPU_SYSFS)
}
