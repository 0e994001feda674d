use crate::host::{Host, Invocation, ProbeError};
use crate::parse::{parse_number, regex, ParseError};
use regex::Regex;
use std::sync::OnceLock;

static CACHED: OnceLock<Regex> = OnceLock::new();
static DISK: OnceLock<Regex> = OnceLock::new();

/// Read throughput in MB/s as reported by `hdparm -tT --direct`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HdparmReport {
    pub cached_mb_per_sec: f64,
    pub disk_mb_per_sec: f64,
}

impl HdparmReport {
    pub fn slowest(&self) -> f64 {
        self.cached_mb_per_sec.min(self.disk_mb_per_sec)
    }
}

pub async fn run(host: &dyn Host, device: &str) -> Result<String, ProbeError> {
    host.run(&Invocation::new(format!("sudo hdparm -tT --direct {device}")))
        .await
}

// /dev/md1:
//  Timing O_DIRECT cached reads:   4452 MB in  2.00 seconds = 2226.28 MB/sec
//  Timing O_DIRECT disk reads: 5116 MB in  3.00 seconds = 1705.24 MB/sec
pub fn parse(output: &str) -> Result<HdparmReport, ParseError> {
    Ok(HdparmReport {
        cached_mb_per_sec: parse_number(
            output,
            regex(
                &CACHED,
                r"Timing O_DIRECT cached reads:.*= ([0-9.]+) MB/sec",
            ),
        )?,
        disk_mb_per_sec: parse_number(
            output,
            regex(&DISK, r"Timing O_DIRECT disk reads:.*= ([0-9.]+) MB/sec"),
        )?,
    })
}
