mod checks;
mod config;
mod datadir;
mod helpers;
mod host;
mod invocation;
mod parse;
mod probes;
mod report;
mod state;

use checks::CheckId;
use clap::Parser;
use config::Config;
use host::SystemHost;
use invocation::InvocationLog;
use reqwest::Client;
use state::RunContext;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "sui-doctor")]
#[command(version, about = "Pre-flight hardware checks for sui-node validator hosts")]
struct Cli {
    /// YAML config; every key is optional.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    print_default_config: bool,
    /// Use this sui db directory instead of searching for it.
    #[arg(long)]
    data_dir: Option<PathBuf>,
    #[arg(long, default_value = "sui-doctor.log")]
    log_file: PathBuf,
    /// Append a JSON line per command and check to this file.
    #[arg(long)]
    invocation_log: Option<PathBuf>,
    /// Run only these checks (repeatable).
    #[arg(long, value_name = "CHECK")]
    only: Vec<CheckId>,
    /// Skip these checks (repeatable).
    #[arg(long, value_name = "CHECK")]
    skip: Vec<CheckId>,
    /// List check ids and exit.
    #[arg(long)]
    list: bool,
    /// Exit with status 1 when any check fails.
    #[arg(long)]
    strict: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }
    if cli.list {
        for id in CheckId::ALL {
            println!("{id}");
        }
        return;
    }

    if let Err(err) = init_tracing(&cli.log_file) {
        eprintln!("failed to open log file {}: {err}", cli.log_file.display());
        std::process::exit(1);
    }

    let mut cfg = match &cli.config {
        Some(path) => match Config::load_from_file(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                error!(error = %err, "failed to load configuration");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };
    if let Some(dir) = cli.data_dir {
        cfg.data_dir.path = Some(dir);
    }

    let invocations = match &cli.invocation_log {
        Some(path) => match InvocationLog::open(path) {
            Ok(log) => Some(log),
            Err(err) => {
                error!(error = %err, path = %path.display(), "failed to open invocation log");
                std::process::exit(1);
            }
        },
        None => None,
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        log_file = %cli.log_file.display(),
        "starting sui-doctor"
    );

    let host = SystemHost::new(invocations.clone());
    let helper_dir = helpers::helper_dir(&cfg.helpers);
    if let Err(err) = helpers::prepare(&host, &helper_dir, &cfg.helpers).await {
        warn!(error = %err, dir = %helper_dir.display(), "failed to build helper binaries");
    }

    let client = Client::builder()
        .user_agent(concat!("sui-doctor/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| Client::new());

    let ctx = RunContext::new(&host, &cfg, helper_dir, client, invocations);
    let selected = checks::select(&cli.only, &cli.skip);
    if selected.iter().any(|id| id.needs_data_dir()) {
        match ctx.data_dir() {
            Ok(dir) => info!(data_dir = %dir.display(), "resolved sui db directory"),
            Err(err) => warn!(error = %err, "sui db directory not resolved"),
        }
    }

    report::heading("sui-node hardware checks");
    let mut records = Vec::with_capacity(selected.len());
    for id in selected {
        report::check_header(id);
        let record = checks::run_check(&ctx, id).await;
        report::print_record(&record);
        records.push(record);
    }

    let summary = report::Summary::of(&records);
    report::print_summary(summary);
    info!(passed = summary.passed, failed = summary.failed, "run finished");

    if cli.strict && summary.failed > 0 {
        std::process::exit(1);
    }
}

/// Debug log to `log_path` (plain text), errors to stderr. `RUST_LOG`
/// overrides the default filter.
fn init_tracing(log_path: &Path) -> io::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sui_doctor=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_filter(LevelFilter::ERROR),
        )
        .init();
    Ok(())
}
