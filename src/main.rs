use anyhow::Result;
use clap::Parser;
use tracing::info;

use fooocus_bot::config::AppConfig;
use fooocus_bot::logger::{self, LogConfig, Sanitizer};
use fooocus_bot::{discord, VERSION};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let format = std::env::var("LOG_FORMAT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or_default();
    logger::init(LogConfig {
        format,
        ..Default::default()
    });

    let config = AppConfig::parse();
    config.validate()?;

    info!(
        "🚀 Starting fooocus-bot v{} (token {})",
        VERSION,
        Sanitizer::token(&config.discord_token)
    );
    info!(
        "Fooocus UI at {}, outputs at {}, webdriver at {}",
        config.fooocus_url, config.outputs_dir, config.webdriver_url
    );

    if config.deploy_only {
        discord::deploy_only(&config).await?;
        info!("✅ Command deployment finished, exiting");
        return Ok(());
    }

    discord::run(config).await?;
    Ok(())
}
