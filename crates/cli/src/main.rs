//! scanwatch CLI - scan files on change and report results via desktop dialogs

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;

mod logging;

#[derive(Parser)]
#[command(name = "scanwatch")]
#[command(about = "Watch paths and run a content scan on files after they settle")]
#[command(after_help = "\
EXAMPLES:
  scanwatch ~/Downloads                   # Scan files dropped into Downloads
  scanwatch --quiescence-ms 500 /srv/in   # Faster trigger for an inbox dir

Results are shown via zenity and logged; configure the scanner and dialog
commands in ~/.config/scanwatch/config.toml.")]
struct Cli {
  /// Paths to watch (non-recursive)
  #[arg(required = true)]
  paths: Vec<PathBuf>,

  /// Config file (default: ~/.config/scanwatch/config.toml)
  #[arg(long)]
  config: Option<PathBuf>,

  /// Override the quiescence delay in milliseconds
  #[arg(long)]
  quiescence_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();

  let mut config = scanwatch::Config::load(cli.config.as_deref()).context("failed to load config")?;
  if let Some(ms) = cli.quiescence_ms {
    config.watch.quiescence_ms = ms;
  }
  logging::init(&config.log.level);

  info!(
    paths = cli.paths.len(),
    quiescence_ms = config.watch.quiescence_ms,
    scanner = %config.scanner.command,
    "starting scanwatch"
  );

  let cancel = CancellationToken::new();

  tokio::select! {
    res = scanwatch::run(&cli.paths, &config, cancel.clone()) => {
      res.context("watcher failed")?;
    }
    _ = tokio::signal::ctrl_c() => {
      info!("received ctrl-c, shutting down");
      cancel.cancel();
    }
  }

  Ok(())
}
