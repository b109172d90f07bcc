use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use serde::Serialize;

mod app;
mod cli;
mod config;
mod feed;
mod parser;
mod server;
mod tracks;
mod weather;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let args = Cli::parse();
    let config = config::Config::from_env()?;
    let app = app::App::new(config);

    match args.cmd {
        Command::Http { address } => server::run(address, app).await,
        Command::Latest => print_json(&app.latest().await)?,
        Command::Tracks { buckets } => {
            let buckets = buckets
                .unwrap_or(app.config.bucket_count)
                .clamp(1, config::MAX_BUCKETS);
            print_json(&app.tracks(buckets).await)?
        }
        Command::Enrich => print_json(&app.with_weather().await)?,
    }

    Ok(())
}

fn print_json<T: Serialize>(payload: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(payload)?);
    Ok(())
}
