#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

#[cfg(not(any(target_os = "macos", unix)))]
compile_error!("Only macos and unix are currently supported");

use std::path::PathBuf;

use clap::Parser;
use twmailer::{Twmailer, config};

/// Line-oriented mail delivery server
#[derive(Parser, Debug)]
#[command(name = "twmailer")]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on, replacing every configured listener's port
    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    port: Option<u16>,

    /// Directory to keep mailboxes in, replacing the configured spool
    spool_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut twmailer = match config::find_config_file(cli.config.as_deref())? {
        Some(path) => config::load(&path)?,
        None if cli.port.is_some() && cli.spool_dir.is_some() => Twmailer::with_defaults(),
        None => anyhow::bail!(
            "No configuration file found. Tried:\n{}\nAlternatively pass both PORT and SPOOL_DIR",
            config::searched_locations()
        ),
    };

    if let Some(port) = cli.port {
        twmailer.set_port(port);
    }

    if let Some(spool_dir) = cli.spool_dir {
        twmailer.set_spool_dir(config::resolve_spool_dir(&spool_dir)?);
    }

    twmailer.run().await
}
