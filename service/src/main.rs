//! Lucky draw command service.
//!
//! Reads one JSON request per line from stdin and writes one JSON response
//! per line to stdout. Logs go to stderr.

use anyhow::Context;
use lucky_draw::config::Config;
use lucky_draw::{bootstrap, server};
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lucky_draw=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting lucky draw service");

    // Load configuration
    let config = Config::from_env().context("reading configuration")?;
    config.validate().context("validating configuration")?;
    info!(
        backend = %config.storage.backend,
        number_min = config.draw.number_min,
        number_max = config.draw.number_max,
        "Configuration loaded"
    );

    // Setup persistence and load state; any failure here aborts startup
    let repository = bootstrap::repository(&config).await?;
    let handler = bootstrap::handler(&config, repository).await?;
    info!(
        events = handler.registry().list_events().await.len(),
        "Registry ready, serving commands"
    );

    let answered = server::serve(
        handler,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
    .context("serving commands")?;

    info!(answered, "Input closed, shutting down");
    Ok(())
}
