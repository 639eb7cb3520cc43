use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::{EnvFilter, Layer as _, Registry};

/// `routedns [-q | -v] CONFIG...` (§6 "CLI surface").
#[derive(Parser)]
#[command(name = "routedns", version)]
struct Cli {
    /// One or more TOML configuration files, merged in order (later files
    /// win per key).
    #[arg(required = true)]
    configs: Vec<PathBuf>,

    /// Suppress INFO-level logging; only warnings and errors are printed.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Enable DEBUG-level logging.
    #[arg(short, long)]
    verbose: bool,
}

fn setup_logging(cli: &Cli) {
    let default_directive = if cli.quiet {
        "warn"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let subscriber = Registry::default().with(tracing_subscriber::fmt::layer().with_filter(filter));
    tracing::subscriber::set_global_default(subscriber).expect("setting global tracing subscriber can only fail once per process");
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?
        .block_on(run(cli))
}

async fn run(cli: Cli) -> Result<()> {
    let pipeline = routedns_config::load(&cli.configs)
        .await
        .with_context(|| format!("failed to load configuration from {:?}", cli.configs))?;

    for (id, cache) in &pipeline.caches {
        let path = snapshot_path(id);
        if !path.exists() {
            continue;
        }
        match routedns_cache::persistence::load(&path).await {
            Ok(entries) => {
                tracing::info!(cache = %id, entries = entries.len(), "restored cache snapshot");
                cache.restore(entries).await;
            }
            Err(err) => tracing::warn!(cache = %id, error = %err, "failed to restore cache snapshot"),
        }
    }

    let caches = pipeline.caches.clone();

    tokio::select! {
        result = pipeline.run() => {
            result.context("listener pipeline exited")?;
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    for (id, cache) in &caches {
        let path = snapshot_path(id);
        let entries = cache.snapshot();
        if let Err(err) = routedns_cache::persistence::save(&path, entries).await {
            tracing::warn!(cache = %id, error = %err, "failed to persist cache snapshot");
        }
    }

    Ok(())
}

fn snapshot_path(cache_id: &str) -> PathBuf {
    std::env::temp_dir().join(format!("routedns-cache-{cache_id}.bin"))
}

/// Waits for `SIGINT` or (on unix) `SIGTERM`, whichever arrives first
/// (§6 "Graceful shutdown hooks").
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        signal(SignalKind::terminate()).expect("failed to install SIGTERM handler").recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
