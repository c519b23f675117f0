use clap::{Parser, Subcommand};

/// TimeTrac: personal time-tracking API
#[derive(Parser)]
#[command(name = "timetrac", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the API server
    Serve {
        /// Port to bind (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Apply pending database migrations and exit
    Migrate,

    /// Revoke an issued access token by its id (jti)
    Revoke {
        #[arg(long)]
        token_id: String,
    },
}
