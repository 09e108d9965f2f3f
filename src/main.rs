use anyhow::Result;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use wos_bot::extensions::ExtensionCatalog;

#[tokio::main]
async fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,serenity=warn,poise=warn")),
        )
        .init();

    // Feature crates build their own binary around `wos_bot::run` with a
    // populated catalog.
    wos_bot::run(ExtensionCatalog::new()).await
}
