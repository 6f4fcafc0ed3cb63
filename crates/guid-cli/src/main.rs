#![doc = include_str!("../README.md")]

mod cli;

use std::io::{self, BufWriter, Write};

use clap::Parser;
use cli::command;
use cli::config::{Action, CliArgs, Config};
use cli::telemetry::init_telemetry;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = Config::try_from(args)?;

    init_telemetry()?;
    log_startup_info(&config);

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    command::run(&config, &mut out)?;
    out.flush()?;
    Ok(())
}

fn log_startup_info(config: &Config) {
    if cfg!(debug_assertions) {
        tracing::debug!("Starting with full config: {:#?}", config);
    }
    match &config.action {
        Action::Generate { count, threads, .. } => tracing::info!(
            datacenter_id = config.datacenter_id,
            worker_id = config.worker_id,
            epoch_ms = config.epoch.as_millis() as u64,
            count,
            threads,
            "generating ids"
        ),
        Action::Decode { ids } => tracing::debug!(count = ids.len(), "decoding ids"),
    }
}
