use anyhow::Result;
use camino::Utf8PathBuf;
use clap::Parser;
use mctest_harness::Scenario;
use tracing::info;

mod app;

#[derive(Parser, Debug)]
#[command(author, version, about = "mctest - behavioral test harness for cache servers", long_about = None)]
struct Args {
    /// Run all scenarios (the default when no scenario flag is given)
    #[arg(short, long)]
    all: bool,

    /// Run the set scenario
    #[arg(long)]
    set_test: bool,

    /// Run the not-present scenario
    #[arg(long)]
    not_present_test: bool,

    /// Run the arith scenario
    #[arg(long)]
    arith_test: bool,

    /// Run the set-with-exptime scenario
    #[arg(long)]
    set_with_exptime_test: bool,

    /// Pass -vv to spawned servers
    #[arg(long)]
    mcd_verbose: bool,

    /// gdb-friendly mode, i.e., long probe timeouts
    #[arg(long)]
    gdb_friendly: bool,

    /// Path to the server binary
    #[arg(short, long)]
    program: Option<Utf8PathBuf>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    info!("Starting mctest v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        mctest_core::config::Config::load_from_path(config_path)?
    } else {
        mctest_core::config::Config::load_or_default()
    };

    // Override with CLI arguments
    if let Some(program) = args.program.clone() {
        config.server.program = Some(program);
    }
    if args.mcd_verbose {
        config.server.verbose = true;
    }
    if args.gdb_friendly {
        config.probe.timeout_secs = 3600;
    }

    let mut scenarios = Vec::new();
    if args.set_test {
        scenarios.push(Scenario::Set);
    }
    if args.not_present_test {
        scenarios.push(Scenario::NotPresent);
    }
    if args.arith_test {
        scenarios.push(Scenario::Arith);
    }
    if args.set_with_exptime_test {
        scenarios.push(Scenario::SetWithExptime);
    }
    if args.all || scenarios.is_empty() {
        scenarios = Scenario::ALL.to_vec();
    }

    app::run(scenarios, config).await
}
