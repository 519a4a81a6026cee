use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use setrunner::config::Config;
use setrunner::storage::Storage;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = Config::default_path()?;
    let cfg = Config::load(&config_path)?;
    let storage = Storage::new(cfg.data_dir()?);

    match cli.cmd {
        Commands::Session(cmd) => commands::session::handle(cmd, &storage, &cfg, cli.json).await?,
        Commands::Template(cmd) => commands::template::handle(cmd, &storage, cli.json).await?,
        Commands::Config(cmd) => commands::config::handle(cmd, &config_path).await?,
    }

    Ok(())
}
