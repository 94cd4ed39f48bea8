use anyhow::{Context, Result};
use clap::Parser;
use playlist_upsync as lib;
use lib::config::Config;
use lib::worker::Cancellation;
use std::path::PathBuf;
use tracing::subscriber as tracing_subscriber_global;
use tracing_log::LogTracer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "upsync", version, about = "Sync local .m3u playlists to Spotify")]
struct Cli {
    /// Playlist file, or a directory searched recursively for playlist files
    input: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = Config::load().context("loading config")?;

    // Initialize log->tracing bridge and structured logging.
    // Logs go to stdout and, when log_dir is set, a daily-rotated file.
    let _ = LogTracer::init();
    let (file_layer, log_guard) = match &cfg.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "upsync.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(non_blocking)), Some(guard))
        }
        None => (None, None),
    };

    // Honor RUST_LOG if set, otherwise default to info.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer);
    tracing_subscriber_global::set_global_default(subscriber).context("installing tracing subscriber")?;

    let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; finishing in-flight requests and saving state");
            let _ = cancel_tx.send(true);
        }
    });

    let report = lib::worker::run_spotify_sync(&cfg, &cli.input, &Cancellation::new(cancel_rx))
        .await
        .with_context(|| format!("syncing {}", cli.input.display()))?;

    println!(
        "created {}, reconciled {}, unchanged {}, failed {}, unresolved tracks {}",
        report.created.len(),
        report.reconciled.len(),
        report.unchanged.len(),
        report.failed.len(),
        report.unresolved_entries
    );
    if !report.failed.is_empty() {
        eprintln!("Failed playlists (retried next run): {}", report.failed.join(", "));
        drop(log_guard);
        std::process::exit(1);
    }
    Ok(())
}
