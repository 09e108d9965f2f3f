use crate::{
    config::Config,
    database::Databases,
    error::{Error, handle_error},
    extensions::LoadedExtensions,
    runner::{GatewayFailure, Shutdown},
};
use anyhow::Result;
use poise::serenity_prelude::{Client, ClientBuilder};
use serenity::all::{Context as SerenityContext, FullEvent};

#[derive(Debug, Clone)]
pub struct Data {
    pub databases: Databases,
    pub extensions: LoadedExtensions,
}

impl Data {
    pub fn new(databases: Databases, extensions: LoadedExtensions) -> Self {
        tracing::debug!("Creating new bot data instance");
        Self {
            databases,
            extensions,
        }
    }
}

#[tracing::instrument(skip(config, databases))]
pub async fn create_bot(
    config: &Config,
    databases: Databases,
    extensions: LoadedExtensions,
) -> Result<Client> {
    tracing::info!("Creating bot with configuration");
    tracing::debug!(prefix = %config.command_prefix, "Bot command prefix configured");

    let commands = extensions.commands();
    tracing::debug!(commands = commands.len(), "Collected extension commands");

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands,
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(config.command_prefix.clone()),
                ..Default::default()
            },
            on_error: |error| Box::pin(handle_error(error)),
            event_handler: |ctx, event, framework, data| {
                Box::pin(handle_event(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |_ctx, _ready, _framework| {
            Box::pin(async move { Ok(Data::new(databases, extensions)) })
        })
        .build();

    let client = ClientBuilder::new(&config.discord_token, config.intents)
        .framework(framework)
        .await?;

    tracing::info!("Bot client created successfully");
    Ok(client)
}

async fn handle_event(
    ctx: &SerenityContext,
    event: &FullEvent,
    framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    if let FullEvent::Ready { data_about_bot } = event {
        tracing::info!(
            bot_name = %data_about_bot.user.name,
            bot_id = %data_about_bot.user.id,
            guild_count = %data_about_bot.guilds.len(),
            "Logged in as {}",
            data_about_bot.user.name
        );

        // Runs on every Ready so a resumed session picks up new commands.
        match poise::builtins::register_globally(ctx, &framework.options().commands).await {
            Ok(()) => tracing::info!("Global commands registered successfully"),
            Err(e) => tracing::error!(error = %e, "Error syncing commands"),
        }
    }

    data.extensions.dispatch(ctx, event, data).await;
    Ok(())
}

/// Builds a fresh client and runs it until the gateway closes. A shutdown
/// request while the client is live stops every shard, which ends the run
/// cleanly.
pub async fn connect(
    config: &Config,
    databases: &Databases,
    extensions: &LoadedExtensions,
    shutdown: &Shutdown,
) -> Result<(), GatewayFailure> {
    let mut client = create_bot(config, databases.clone(), extensions.clone()).await?;
    if shutdown.is_requested() {
        return Ok(());
    }

    let shard_manager = client.shard_manager.clone();
    let mut stop = shutdown.clone();
    let watcher = tokio::spawn(async move {
        stop.requested().await;
        tracing::info!("Disconnecting from gateway");
        shard_manager.shutdown_all().await;
    });

    tracing::info!("Connecting to gateway");
    let result = client.start().await;
    watcher.abort();

    result?;
    tracing::info!("Gateway connection closed");
    Ok(())
}
