use anyhow::{Context, Result};
use serenity::all::GatewayIntents;
use std::path::PathBuf;
use std::time::Duration;

pub const TOKEN_VAR: &str = "WOS_TOKEN";
pub const DEFAULT_DATABASE_DIR: &str = "db";
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct Config {
    pub discord_token: String,
    pub intents: GatewayIntents,
    pub command_prefix: String,
    pub database_dir: PathBuf,
    pub reconnect_delay: Duration,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("discord_token", &"<redacted>")
            .field("intents", &self.intents)
            .field("command_prefix", &self.command_prefix)
            .field("database_dir", &self.database_dir)
            .field("reconnect_delay", &self.reconnect_delay)
            .finish()
    }
}

impl Config {
    #[tracing::instrument]
    pub fn from_env() -> Result<Self> {
        tracing::info!("Loading .env variables...");
        dotenv::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves the configuration from an arbitrary key lookup. A missing or
    /// blank token is an error; everything else has a default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let discord_token = lookup(TOKEN_VAR)
            .filter(|token| !token.trim().is_empty())
            .with_context(|| format!("No bot token found in environment variable {TOKEN_VAR}"))?;

        let database_dir = lookup("DATABASE_DIR")
            .unwrap_or_else(|| DEFAULT_DATABASE_DIR.to_string())
            .into();

        let reconnect_delay = match lookup("RECONNECT_DELAY_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .with_context(|| format!("RECONNECT_DELAY_SECS is not a number: {raw:?}"))?,
            None => DEFAULT_RECONNECT_DELAY,
        };

        Ok(Self {
            discord_token,
            intents: GatewayIntents::non_privileged() | GatewayIntents::MESSAGE_CONTENT,
            command_prefix: "/".to_string(),
            database_dir,
            reconnect_delay,
        })
    }
}
