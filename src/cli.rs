use clap::{Parser, Subcommand};

/// Skill Tracker — experience-gated levels and skills over a JSON HTTP API.
#[derive(Parser, Debug)]
#[command(name = "skilltracker")]
#[command(version = "0.1.0")]
#[command(about = "Track experience, levels, and skill unlocks.", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Host to bind to (defaults to the configured host)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (use 0 for a random available port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Create or refresh the starter catalog (Level 1–5 plus sample skills)
    Seed,

    /// Reset every collection to empty
    ResetData {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}
