pub mod bot;
pub mod config;
pub mod database;
pub mod error;
pub mod extensions;
pub mod runner;
pub mod schema;

use anyhow::Result;
use config::Config;
use extensions::{EXTENSION_NAMES, ExtensionCatalog};
use runner::Shutdown;

/// Runs the bot with the extensions in `catalog`, configured from the
/// environment and stopped by Ctrl-C.
pub async fn run(catalog: ExtensionCatalog) -> Result<()> {
    run_with(Config::from_env, catalog, Shutdown::on_ctrl_c()).await
}

/// Full startup sequence: config, storage, schema, extensions, then the
/// gateway run loop until a clean disconnect or `shutdown`.
pub async fn run_with(
    load_config: impl FnOnce() -> Result<Config>,
    catalog: ExtensionCatalog,
    shutdown: Shutdown,
) -> Result<()> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting bot (auto-update disabled, container mode)"
    );

    // Nothing may touch storage or the network before the token is known.
    let config = load_config()?;

    let databases = database::init_databases(&config.database_dir).await?;
    schema::create_tables(&databases).await?;

    let report = extensions::load_extensions(&catalog, EXTENSION_NAMES, &databases).await;
    let loaded = report.loaded;

    let (config_ref, databases_ref, loaded_ref, shutdown_ref) =
        (&config, &databases, &loaded, &shutdown);
    runner::run_with_retry(
        move || bot::connect(config_ref, databases_ref, loaded_ref, shutdown_ref),
        config.reconnect_delay,
        shutdown.clone(),
    )
    .await;

    databases.close().await;
    Ok(())
}
