use {
    anyhow::{Context, Error, ensure},
    arguments::Arguments,
    clap::Parser,
    registry::StatsRegistry,
    serde::{Deserialize, Serialize},
    settings::{ServerOptions, Settings},
    share::{Share, ShareResult},
    share_log::{FileShareLog, ShareSource, SourceMessage},
    std::{
        collections::{HashMap, hash_map},
        fmt::{self, Display, Formatter},
        io,
        net::Ipv4Addr,
        path::PathBuf,
        process,
        sync::{
            Arc,
            atomic::{AtomicU64, Ordering},
        },
        time::{Duration, SystemTime, UNIX_EPOCH},
    },
    subcommand::server::StatsServer,
    tokio::{net::TcpListener, runtime::Runtime, task::JoinHandle},
    tokio_util::sync::CancellationToken,
    tracing::{error, info},
    tracing_appender::non_blocking,
    tracing_subscriber::EnvFilter,
    window::SlidingWindow,
    worker::{WorkerKey, WorkerShares, WorkerStatus},
};

mod api;
mod arguments;
mod registry;
mod settings;
mod share;
mod share_log;
mod subcommand;
mod window;
mod worker;

/// Rates cover the last fifteen minutes of shares. Anything older is
/// invisible to queries and eligible for expiry.
pub const STATS_WINDOW_SECS: u32 = 900;

/// Records re-read from the share log tail on startup.
pub const DEFAULT_BACKLOG: u64 = 900_000;

type Result<T = (), E = Error> = std::result::Result<T, E>;

pub(crate) fn unix_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as u32
}

pub fn main() {
    let (writer, _guard) = non_blocking(io::stderr());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(writer)
        .init();

    let args = Arguments::parse();

    Runtime::new()
        .expect("Failed to create tokio runtime")
        .block_on(async {
            let cancel_token = CancellationToken::new();

            let signal_token = cancel_token.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Received shutdown signal (ctrl-c)");
                    signal_token.cancel();
                }
            });

            match args.run(cancel_token).await {
                Err(err) => {
                    error!("error: {err}");
                    process::exit(1);
                }
                Ok(_) => {
                    process::exit(0);
                }
            }
        });
}
