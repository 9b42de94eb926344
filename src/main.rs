//! CLI entry point for the download manager.

use anyhow::{Context, Result, bail};
use clap::Parser;
use downman::{Config, DownloadRegistry, DownloadStatus, netinfo};
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use tracing::debug;

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (warn)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    if args.net_info {
        let client = reqwest::Client::new();
        let info = netinfo::lookup(&client).await?;
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    let url = args.url.context("a URL is required")?;
    let registry = DownloadRegistry::new(Config::new(args.output_dir));

    // Subscribe before add so the first snapshots are not missed.
    let mut events = registry.subscribe();
    let added = registry
        .add(&url, args.filename.as_deref(), None)
        .await
        .context("failed to start download")?;

    let bar = progress_bar(args.quiet);

    loop {
        tokio::select! {
            snapshot = events.recv() => {
                let Some(snapshot) = snapshot else { break };
                if snapshot.id != added.id {
                    continue;
                }
                if bar.length().unwrap_or(0) == 0 && snapshot.total_size > 0 {
                    bar.set_length(snapshot.total_size);
                }
                bar.set_position(snapshot.downloaded_size);
                bar.set_message(format!(
                    "{}/s, {}s left",
                    HumanBytes(snapshot.speed),
                    snapshot.time_remaining
                ));
                match snapshot.status {
                    DownloadStatus::Completed => {
                        bar.finish_and_clear();
                        println!("{}", snapshot.file_path.display());
                        return Ok(());
                    }
                    DownloadStatus::Failed => {
                        bar.abandon();
                        bail!(
                            "download failed: {}",
                            snapshot.error.unwrap_or_else(|| "unknown error".to_string())
                        );
                    }
                    _ => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                bar.abandon();
                registry.cancel(&added.id).await;
                bail!("cancelled; partial file removed");
            }
        }
    }

    bail!("event feed ended before the download finished")
}

fn progress_bar(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40}] {bytes}/{total_bytes} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar
}
