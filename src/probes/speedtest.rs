use crate::config::CloudflareConfig;
use crate::host::spinner::while_running;
use crate::host::{Host, Invocation, ProbeError};
use crate::parse::{parse_number, regex, ParseError};
use regex::Regex;
use reqwest::Client;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tracing::debug;

static DOWNLOAD: OnceLock<Regex> = OnceLock::new();
static UPLOAD: OnceLock<Regex> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedReport {
    pub download_mbit: f64,
    pub upload_mbit: f64,
    pub latency_ms: Option<f64>,
}

pub async fn run_cli(host: &dyn Host, command: &str) -> Result<String, ProbeError> {
    host.run(&Invocation::new(command)).await
}

// Retrieving speedtest.net configuration...
// Hosted by KamaTera, Inc. (TinyTown USA) [5.00 km]: 10.000 ms
// Download: 115.01 Mbit/s
// Upload: 67.65 Mbit/s
pub fn parse(output: &str) -> Result<SpeedReport, ParseError> {
    Ok(SpeedReport {
        download_mbit: parse_number(output, regex(&DOWNLOAD, r"Download: ([0-9.]+) Mbit"))?,
        upload_mbit: parse_number(output, regex(&UPLOAD, r"Upload: ([0-9.]+) Mbit"))?,
        latency_ms: None,
    })
}

/// Renders a natively measured report in the speedtest-cli text shape.
pub fn render(report: &SpeedReport) -> String {
    let mut out = String::new();
    if let Some(latency) = report.latency_ms {
        out.push_str(&format!("Latency: {latency:.3} ms\n"));
    }
    out.push_str(&format!("Download: {:.2} Mbit/s\n", report.download_mbit));
    out.push_str(&format!("Upload: {:.2} Mbit/s\n", report.upload_mbit));
    out
}

/// Measures throughput against the Cloudflare speed endpoints.
pub async fn measure_cloudflare(
    client: &Client,
    cfg: &CloudflareConfig,
) -> Result<String, ProbeError> {
    let report = while_running("measuring network speed", measure(client, cfg)).await?;
    debug!(
        download_mbit = report.download_mbit,
        upload_mbit = report.upload_mbit,
        "cloudflare speed probe finished"
    );
    Ok(render(&report))
}

async fn measure(client: &Client, cfg: &CloudflareConfig) -> Result<SpeedReport, ProbeError> {
    let timeout = Duration::from_secs(cfg.timeout_secs);
    let base = cfg.base_url.trim_end_matches('/');

    let ping_start = Instant::now();
    let _ = client
        .head(format!("{base}/"))
        .timeout(timeout)
        .send()
        .await?;
    let latency_ms = ping_start.elapsed().as_secs_f64() * 1000.0;

    let down_start = Instant::now();
    let down = client
        .get(format!("{base}/__down?bytes={}", cfg.download_bytes))
        .timeout(timeout)
        .send()
        .await?
        .error_for_status()?;
    let down_bytes = down.bytes().await?;
    let down_secs = down_start.elapsed().as_secs_f64().max(0.001);
    let download_mbit = ((down_bytes.len() as f64) * 8.0 / 1_000_000.0) / down_secs;

    let upload_buf = vec![0_u8; cfg.upload_bytes];
    let up_start = Instant::now();
    client
        .post(format!("{base}/__up"))
        .timeout(timeout)
        .body(upload_buf)
        .send()
        .await?
        .error_for_status()?;
    let up_secs = up_start.elapsed().as_secs_f64().max(0.001);
    let upload_mbit = ((cfg.upload_bytes as f64) * 8.0 / 1_000_000.0) / up_secs;

    Ok(SpeedReport {
        download_mbit,
        upload_mbit,
        latency_ms: Some(latency_ms),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_speedtest_cli_output() {
        let out = "Retrieving speedtest.net configuration...\nTesting from Local ISP (1.1.1.1)...\nHosted by KamaTera, Inc. (TinyTown USA) [5.00 km]: 10.000 ms\nTesting download speed....\nDownload: 115.01 Mbit/s\nTesting upload speed....\nUpload: 67.65 Mbit/s\n";
        let report = parse(out).unwrap();
        assert_eq!(report.download_mbit, 115.01);
        assert_eq!(report.upload_mbit, 67.65);
    }

    #[test]
    fn rendered_native_report_parses_back() {
        let report = SpeedReport {
            download_mbit: 1234.5,
            upload_mbit: 987.25,
            latency_ms: Some(12.0),
        };
        let parsed = parse(&render(&report)).unwrap();
        assert_eq!(parsed.download_mbit, 1234.5);
        assert_eq!(parsed.upload_mbit, 987.25);
    }

    #[test]
    fn missing_upload_line_is_an_error() {
        assert!(parse("Download: 10.00 Mbit/s\n").is_err());
    }
}
