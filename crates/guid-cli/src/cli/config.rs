use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use core::time::Duration;
use guid::{Guid, MAX_DATACENTER_ID, MAX_WORKER_ID, SystemClock, TimeSource};

/// Runtime configuration for the `guid` binary.
///
/// Identity and epoch are global options so `generate` and `decode` agree on
/// them. All values are parsed from CLI arguments or environment variables
/// (optionally loaded from `.env`).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "guid",
    version,
    about = "Mint and decode time-sortable 64-bit IDs"
)]
pub struct CliArgs {
    /// Datacenter this process issues IDs for (0 to 31).
    ///
    /// Must be assigned externally; the pair (datacenter, worker) has to be
    /// unique across every process sharing the ID space.
    ///
    /// Environment variable: `GUID_DATACENTER_ID`
    #[arg(long, env = "GUID_DATACENTER_ID", default_value_t = 0, global = true)]
    pub datacenter_id: u64,

    /// Worker within the datacenter (0 to 31).
    ///
    /// Environment variable: `GUID_WORKER_ID`
    #[arg(long, env = "GUID_WORKER_ID", default_value_t = 0, global = true)]
    pub worker_id: u64,

    /// Epoch in milliseconds since 1970-01-01 UTC.
    ///
    /// Never change this for an existing ID space: IDs minted against
    /// different epochs do not sort together and may collide.
    ///
    /// Environment variable: `GUID_EPOCH_MILLIS`
    #[arg(long, env = "GUID_EPOCH_MILLIS", default_value_t = 1_288_834_974_657, global = true)]
    pub epoch_millis: u64,

    /// Print JSON instead of plain text.
    #[arg(long, default_value_t = false, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CliCommand {
    /// Mint new IDs, one per line in ascending order.
    Generate {
        /// Number of IDs to mint.
        ///
        /// Environment variable: `GUID_COUNT`
        #[arg(short = 'n', long, env = "GUID_COUNT", default_value_t = 1)]
        count: usize,

        /// Number of threads sharing one generator.
        ///
        /// Environment variable: `GUID_THREADS`
        #[arg(short, long, env = "GUID_THREADS", default_value_t = 1)]
        threads: usize,

        /// How many times to wait out a backward clock before giving up.
        ///
        /// Environment variable: `GUID_MAX_RETRIES`
        #[arg(long, env = "GUID_MAX_RETRIES", default_value_t = 3)]
        max_retries: u32,
    },

    /// Split IDs into timestamp, datacenter, worker and sequence.
    Decode {
        /// Decimal IDs to decode.
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Generate {
        count: usize,
        threads: usize,
        max_retries: u32,
    },
    Decode {
        ids: Vec<Guid>,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub datacenter_id: u64,
    pub worker_id: u64,
    pub epoch: Duration,
    pub json: bool,
    pub action: Action,
}

impl TryFrom<CliArgs> for Config {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.datacenter_id > MAX_DATACENTER_ID {
            bail!(
                "GUID_DATACENTER_ID ({}) exceeds the datacenter ID space (max = {})",
                args.datacenter_id,
                MAX_DATACENTER_ID
            );
        }

        if args.worker_id > MAX_WORKER_ID {
            bail!(
                "GUID_WORKER_ID ({}) exceeds the worker ID space (max = {})",
                args.worker_id,
                MAX_WORKER_ID
            );
        }

        let now = SystemClock.current_millis();
        if args.epoch_millis > now {
            bail!(
                "GUID_EPOCH_MILLIS ({}) is in the future (now = {})",
                args.epoch_millis,
                now
            );
        }

        let action = match args.command {
            CliCommand::Generate {
                count,
                threads,
                max_retries,
            } => {
                if threads == 0 {
                    bail!("GUID_THREADS must be greater than 0");
                }
                Action::Generate {
                    count,
                    threads,
                    max_retries,
                }
            }
            CliCommand::Decode { ids } => {
                let ids = ids
                    .iter()
                    .map(|raw| {
                        raw.parse::<Guid>()
                            .with_context(|| format!("cannot decode {raw:?}"))
                    })
                    .collect::<anyhow::Result<Vec<_>>>()?;
                Action::Decode { ids }
            }
        };

        Ok(Self {
            datacenter_id: args.datacenter_id,
            worker_id: args.worker_id,
            epoch: Duration::from_millis(args.epoch_millis),
            json: args.json,
            action,
        })
    }
}
