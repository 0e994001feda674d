use crate::host::{Host, Invocation, ProbeError};
use crate::parse::{parse_number, regex, ParseError};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

pub const HELPER: &str = "check_cpu_speed";

static TEST_1: OnceLock<Regex> = OnceLock::new();
static TEST_2: OnceLock<Regex> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpuBenchReport {
    pub test_1_secs: f64,
    pub test_2_secs: f64,
}

pub async fn run(
    host: &dyn Host,
    helper_dir: &Path,
    test_1_iterations: u32,
    test_2_iterations: u32,
) -> Result<String, ProbeError> {
    let command = format!("./{HELPER} {test_1_iterations} {test_2_iterations}");
    host.run(&Invocation::new(command).in_dir(helper_dir).checked())
        .await
}

pub fn parse(output: &str) -> Result<CpuBenchReport, ParseError> {
    Ok(CpuBenchReport {
        test_1_secs: parse_number(
            output,
            regex(&TEST_1, r"Test 1: average time taken: ([0-9.]+) seconds"),
        )?,
        test_2_secs: parse_number(
            output,
            regex(&TEST_2, r"Test 2: average time taken: ([0-9.]+) seconds"),
        )?,
    })
}
