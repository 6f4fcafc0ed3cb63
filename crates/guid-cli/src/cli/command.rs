use std::{io::Write, thread};

use anyhow::Context;
use core::time::Duration;
use guid::{Generator, Guid, IdGenerator, SystemClock};
use serde::Serialize;

use crate::cli::config::{Action, Config};

/// The fields of one decoded ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedGuid {
    pub id: Guid,
    pub timestamp: u64,
    pub unix_millis: u64,
    pub datacenter_id: u64,
    pub worker_id: u64,
    pub sequence: u64,
}

impl DecodedGuid {
    pub fn new(id: Guid, epoch: Duration) -> anyhow::Result<Self> {
        let unix_millis = id.unix_millis(epoch).with_context(|| {
            format!("{id} is out of range against epoch {} ms", epoch.as_millis())
        })?;
        Ok(Self {
            id,
            timestamp: id.timestamp(),
            unix_millis,
            datacenter_id: id.datacenter_id(),
            worker_id: id.worker_id(),
            sequence: id.sequence(),
        })
    }
}

/// Executes the configured action, writing results to `out`.
pub fn run(config: &Config, out: &mut impl Write) -> anyhow::Result<()> {
    match &config.action {
        Action::Generate {
            count,
            threads,
            max_retries,
        } => {
            let generator = IdGenerator::with_epoch(
                config.datacenter_id,
                config.worker_id,
                config.epoch,
                SystemClock,
            )?;
            let ids = generate(&generator, *count, *threads, *max_retries)?;
            write_ids(&ids, config.json, out)
        }
        Action::Decode { ids } => {
            let decoded = ids
                .iter()
                .map(|id| DecodedGuid::new(*id, config.epoch))
                .collect::<anyhow::Result<Vec<_>>>()?;
            write_decoded(&decoded, config.json, out)
        }
    }
}

/// Mints `count` IDs from `threads` threads sharing `generator`, returned in
/// ascending order.
pub fn generate<G>(
    generator: &G,
    count: usize,
    threads: usize,
    max_retries: u32,
) -> anyhow::Result<Vec<Guid>>
where
    G: Generator + Sync,
{
    let threads = threads.clamp(1, count.max(1));
    let per_thread = count / threads;
    let remainder = count % threads;

    tracing::debug!(count, threads, "generating ids");

    let batches = thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let quota = per_thread + usize::from(i < remainder);
                s.spawn(move || {
                    (0..quota)
                        .map(|_| next_id_with_retry(generator, max_retries))
                        .collect::<anyhow::Result<Vec<_>>>()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| {
                h.join()
                    .unwrap_or_else(|e| std::panic::resume_unwind(e))
            })
            .collect::<anyhow::Result<Vec<_>>>()
    })?;

    let mut ids: Vec<Guid> = batches.into_iter().flatten().collect();
    ids.sort_unstable();
    Ok(ids)
}

/// Issues one ID, waiting out a backward clock up to `max_retries` times.
pub fn next_id_with_retry<G>(generator: &G, max_retries: u32) -> anyhow::Result<Guid>
where
    G: Generator + ?Sized,
{
    let mut attempt = 0;
    loop {
        match generator.next_id() {
            Ok(id) => return Ok(id),
            Err(err) => match err.retry_after() {
                Some(delay) if attempt < max_retries => {
                    attempt += 1;
                    tracing::warn!(%err, attempt, ?delay, "clock moved backward, retrying");
                    thread::sleep(delay);
                }
                _ => return Err(err).context("failed to generate id"),
            },
        }
    }
}

fn write_ids(ids: &[Guid], json: bool, out: &mut impl Write) -> anyhow::Result<()> {
    if json {
        serde_json::to_writer(&mut *out, ids)?;
        writeln!(out)?;
    } else {
        for id in ids {
            writeln!(out, "{id}")?;
        }
    }
    Ok(())
}

fn write_decoded(decoded: &[DecodedGuid], json: bool, out: &mut impl Write) -> anyhow::Result<()> {
    if json {
        serde_json::to_writer(&mut *out, decoded)?;
        writeln!(out)?;
    } else {
        for d in decoded {
            writeln!(
                out,
                "{} timestamp={} unix_millis={} datacenter_id={} worker_id={} sequence={}",
                d.id, d.timestamp, d.unix_millis, d.datacenter_id, d.worker_id, d.sequence
            )?;
        }
    }
    Ok(())
}
