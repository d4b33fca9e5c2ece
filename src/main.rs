#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use skilltracker::cli::{Cli, Commands};
use skilltracker::config::Config;
use skilltracker::seed;
use skilltracker::server;
use skilltracker::store::{JsonStore, Store};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let cli = Cli::parse();
    let config = Config::load_or_init()?;

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.host.clone());
            let port = port.unwrap_or(config.port);
            server::run_server(&host, port, config).await
        }
        Commands::Seed => {
            let store = JsonStore::open(&config.data_dir)?;
            let summary = seed::seed_catalog(&store)?;
            println!(
                "✓ Seeded starter catalog: {} levels, {} skills ({} updated)",
                summary.levels_created + summary.levels_updated,
                summary.skills_created + summary.skills_updated,
                summary.levels_updated + summary.skills_updated,
            );
            Ok(())
        }
        Commands::ResetData { yes } => {
            if !yes {
                anyhow::bail!(
                    "This deletes every user, level, skill, and assignment.\n\
                     Re-run with --yes to confirm."
                );
            }
            let store = JsonStore::open(&config.data_dir)?;
            store.reset()?;
            println!("✓ All collections reset to empty");
            Ok(())
        }
    }
}
