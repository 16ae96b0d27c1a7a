//! KameHouse Storefront - command line client

use std::process;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kamehouse_storefront::config::StorefrontConfig;

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = cli::Cli::parse();
    let mut config = StorefrontConfig::from_env()?;
    cli.apply_overrides(&mut config);

    if let Err(e) = cli.run(config).await {
        tracing::debug!(error = %e, "command failed");
        eprintln!("{}", e.user_message());
        process::exit(1);
    }
    Ok(())
}
