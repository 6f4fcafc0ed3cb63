//! Logging setup for the `guid` binary.
//!
//! Events are written to stderr so stdout carries nothing but IDs. Filtering
//! follows `RUST_LOG` and falls back to `info`. Spans and events emitted by the
//! `guid` library (enabled through its `tracing` feature) flow through the same
//! subscriber, e.g. `RUST_LOG=guid=trace` shows every issuance.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_telemetry() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .try_init()?;

    Ok(())
}
