use std::{
    env,
    fs::File,
    sync::{atomic::AtomicBool, Arc},
};

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::{Env, Target};
use log::{info, LevelFilter};

use dnsvisor::cli::CliArgs;
use dnsvisor::config::RunConfig;
use dnsvisor::core::{runner::run, signal::setup_ctrlc_handler, summary::print_final_summary};

fn main() -> Result<()> {
    // Parse CLI args; bad values stop us before any capture starts
    let args = CliArgs::parse();
    let config = RunConfig::from_args(&args).context("invalid configuration")?;

    init_logging(&config)?;

    // Shared shutdown flag
    let running = Arc::new(AtomicBool::new(true));
    setup_ctrlc_handler(Arc::clone(&running)).context("failed to install signal handler")?;

    info!("local network {}", config.context.local_net);
    let outcome = run(&config, running).context("capture session failed")?;

    print_final_summary(&outcome.context, &outcome.ingest, config.top)
        .context("failed to write summary")?;
    Ok(())
}

/// `RUST_LOG` wins over `-v`. While the display owns the terminal, logs go to
/// `--log-file`, or nowhere unless `RUST_LOG` asks for them.
fn init_logging(config: &RunConfig) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(Env::default().default_filter_or(config.log_level.to_string()));

    match &config.log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            builder.target(Target::Pipe(Box::new(file)));
        }
        None if config.ui && env::var_os("RUST_LOG").is_none() => {
            builder.filter_level(LevelFilter::Off);
        }
        None => {}
    }

    builder.init();
    Ok(())
}
