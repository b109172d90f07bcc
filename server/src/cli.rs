use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(about = "Skytrack: balloon feed tracks and weather.")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the JSON endpoints
    Http {
        #[arg(env = "SKYTRACK_SERVER_ADDRESS")]
        address: std::net::SocketAddr,
    },
    /// Print the latest bucket of positions
    Latest,
    /// Print tracks reconstructed from the rolling window
    Tracks {
        /// Number of hourly buckets to pool (1 to 24)
        #[arg(long)]
        buckets: Option<usize>,
    },
    /// Print the latest positions with weather attached
    Enrich,
}
