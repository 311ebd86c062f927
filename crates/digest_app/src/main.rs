mod app;
mod cli;
mod config;
mod effects;
mod render;

use clap::Parser;
use digest_logging::digest_info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let config = config::load(&cli)?;
    digest_logging::initialize(config.log_destination(), config.log_level);
    digest_info!("Using server {}", config.settings.base_url);

    app::run(cli.command, config.settings).await
}
