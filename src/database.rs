use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::path::Path;

/// The five independent SQLite files the bot keeps open for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseKind {
    Alliance,
    GiftCode,
    Changes,
    Users,
    Settings,
}

impl DatabaseKind {
    pub const ALL: [DatabaseKind; 5] = [
        DatabaseKind::Alliance,
        DatabaseKind::GiftCode,
        DatabaseKind::Changes,
        DatabaseKind::Users,
        DatabaseKind::Settings,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DatabaseKind::Alliance => "alliance",
            DatabaseKind::GiftCode => "giftcode",
            DatabaseKind::Changes => "changes",
            DatabaseKind::Users => "users",
            DatabaseKind::Settings => "settings",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.sqlite", self.name())
    }
}

/// Handles to every database, passed to extensions and stored in the
/// framework data. Cloning is cheap; all clones share the same connection.
#[derive(Debug, Clone)]
pub struct Databases {
    pub alliance: SqlitePool,
    pub giftcode: SqlitePool,
    pub changes: SqlitePool,
    pub users: SqlitePool,
    pub settings: SqlitePool,
}

impl Databases {
    pub fn get(&self, kind: DatabaseKind) -> &SqlitePool {
        match kind {
            DatabaseKind::Alliance => &self.alliance,
            DatabaseKind::GiftCode => &self.giftcode,
            DatabaseKind::Changes => &self.changes,
            DatabaseKind::Users => &self.users,
            DatabaseKind::Settings => &self.settings,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (DatabaseKind, &SqlitePool)> {
        DatabaseKind::ALL.into_iter().map(|kind| (kind, self.get(kind)))
    }

    pub async fn close(&self) {
        for (kind, pool) in self.iter() {
            tracing::debug!(database = kind.name(), "Closing database connection");
            pool.close().await;
        }
    }
}

#[tracing::instrument]
pub async fn init_databases(database_dir: &Path) -> Result<Databases> {
    if !database_dir.exists() {
        std::fs::create_dir_all(database_dir).with_context(|| {
            format!("Failed to create database directory {}", database_dir.display())
        })?;
        tracing::info!(path = %database_dir.display(), "db folder created");
    }

    let databases = Databases {
        alliance: open_database(database_dir, DatabaseKind::Alliance).await?,
        giftcode: open_database(database_dir, DatabaseKind::GiftCode).await?,
        changes: open_database(database_dir, DatabaseKind::Changes).await?,
        users: open_database(database_dir, DatabaseKind::Users).await?,
        settings: open_database(database_dir, DatabaseKind::Settings).await?,
    };

    tracing::info!("Database connections have been successfully established.");
    Ok(databases)
}

/// Opens a single long-lived connection. Foreign keys are switched on so
/// `user_giftcodes` can only reference codes present in `gift_codes`.
#[tracing::instrument]
pub async fn open_database(database_dir: &Path, kind: DatabaseKind) -> Result<SqlitePool> {
    let path = database_dir.join(kind.file_name());
    tracing::debug!(database = kind.name(), path = %path.display(), "Opening database");

    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open {} database at {}", kind.name(), path.display()))
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NicknameChange {
    pub id: i64,
    pub fid: Option<i64>,
    pub old_nickname: Option<String>,
    pub new_nickname: Option<String>,
    pub change_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FurnaceChange {
    pub id: i64,
    pub fid: Option<i64>,
    pub old_furnace_lv: Option<i64>,
    pub new_furnace_lv: Option<i64>,
    pub change_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BotSettings {
    pub id: i64,
    pub channelid: Option<i64>,
    pub giftcodestatus: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Admin {
    pub id: i64,
    pub is_initial: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub fid: i64,
    pub nickname: Option<String>,
    pub furnace_lv: Option<i64>,
    pub kid: Option<i64>,
    pub stove_lv_content: Option<String>,
    pub alliance: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GiftCode {
    pub giftcode: String,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserGiftCode {
    pub fid: i64,
    pub giftcode: String,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AllianceSettings {
    pub alliance_id: i64,
    pub channel_id: Option<i64>,
    pub interval: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AllianceListEntry {
    pub alliance_id: i64,
    pub name: Option<String>,
}
