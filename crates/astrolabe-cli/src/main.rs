use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

mod verify;

const USAGE: &str = "Usage: astrolabe [PLAN FILEPATH]";

#[derive(Parser, Debug)]
#[command(
    name = "astrolabe",
    about = "Astrolabe — trigger a deploy pipeline and verify the canary rollout it produces",
    version
)]
struct Cli {
    /// Plan document (YAML, or TOML with a .toml extension)
    plan: Option<PathBuf>,

    /// Load and validate the plan, then exit without touching the cluster
    #[arg(long)]
    check: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(_) => {
            println!("{USAGE}");
            return ExitCode::FAILURE;
        }
    };
    let Some(plan_path) = cli.plan.as_deref() else {
        println!("{USAGE}");
        return ExitCode::FAILURE;
    };

    init_tracing(cli.log_format);
    // kube and reqwest both sit on rustls; pin the process-wide provider.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let result = if cli.check {
        verify::load_plan(plan_path).map(|_| println!("plan OK"))
    } else {
        verify::run(plan_path).await
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,astrolabe=debug,kube=warn"));
    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }
}
