use crate::database::{DatabaseKind, Databases};
use anyhow::{Context, Result};
use sqlx::SqlitePool;

const CHANGES_TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS nickname_changes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        fid INTEGER,
        old_nickname TEXT,
        new_nickname TEXT,
        change_date TEXT
    )",
    "CREATE TABLE IF NOT EXISTS furnace_changes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        fid INTEGER,
        old_furnace_lv INTEGER,
        new_furnace_lv INTEGER,
        change_date TEXT
    )",
];

const SETTINGS_TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS botsettings (
        id INTEGER PRIMARY KEY,
        channelid INTEGER,
        giftcodestatus TEXT
    )",
    "CREATE TABLE IF NOT EXISTS admin (
        id INTEGER PRIMARY KEY,
        is_initial INTEGER
    )",
];

const USERS_TABLES: &[&str] = &["CREATE TABLE IF NOT EXISTS users (
        fid INTEGER PRIMARY KEY,
        nickname TEXT,
        furnace_lv INTEGER DEFAULT 0,
        kid INTEGER,
        stove_lv_content TEXT,
        alliance TEXT
    )"];

const GIFTCODE_TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS gift_codes (
        giftcode TEXT PRIMARY KEY,
        date TEXT
    )",
    "CREATE TABLE IF NOT EXISTS user_giftcodes (
        fid INTEGER,
        giftcode TEXT,
        status TEXT,
        PRIMARY KEY (fid, giftcode),
        FOREIGN KEY (giftcode) REFERENCES gift_codes (giftcode)
    )",
];

const ALLIANCE_TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS alliancesettings (
        alliance_id INTEGER PRIMARY KEY,
        channel_id INTEGER,
        interval INTEGER
    )",
    "CREATE TABLE IF NOT EXISTS alliance_list (
        alliance_id INTEGER PRIMARY KEY,
        name TEXT
    )",
];

/// Table definitions owned by each database, in creation order.
pub fn statements(kind: DatabaseKind) -> &'static [&'static str] {
    match kind {
        DatabaseKind::Alliance => ALLIANCE_TABLES,
        DatabaseKind::GiftCode => GIFTCODE_TABLES,
        DatabaseKind::Changes => CHANGES_TABLES,
        DatabaseKind::Users => USERS_TABLES,
        DatabaseKind::Settings => SETTINGS_TABLES,
    }
}

#[tracing::instrument(skip(databases))]
pub async fn create_tables(databases: &Databases) -> Result<()> {
    for (kind, pool) in databases.iter() {
        create_tables_for(kind, pool).await?;
    }

    tracing::info!("All tables checked.");
    Ok(())
}

/// Runs every statement for `kind` inside one transaction. An error drops the
/// transaction before commit, which rolls it back.
#[tracing::instrument(skip(pool))]
pub async fn create_tables_for(kind: DatabaseKind, pool: &SqlitePool) -> Result<()> {
    let mut tx = pool
        .begin()
        .await
        .with_context(|| format!("Failed to begin schema transaction on {}", kind.name()))?;

    for statement in statements(kind) {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to create table on {}", kind.name()))?;
    }

    tx.commit()
        .await
        .with_context(|| format!("Failed to commit schema on {}", kind.name()))?;

    tracing::debug!(
        database = kind.name(),
        tables = statements(kind).len(),
        "Tables checked"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{GiftCode, User, UserGiftCode, init_databases};

    async fn table_names(pool: &SqlitePool) -> Result<Vec<String>> {
        let names = sqlx::query_scalar(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )
        .fetch_all(pool)
        .await?;
        Ok(names)
    }

    #[tokio::test]
    async fn creating_tables_twice_is_idempotent() -> Result<()> {
        let root = tempfile::tempdir()?;
        let databases = init_databases(root.path()).await?;

        create_tables(&databases).await?;
        create_tables(&databases).await?;

        assert_eq!(
            table_names(&databases.changes).await?,
            ["furnace_changes", "nickname_changes"]
        );
        assert_eq!(table_names(&databases.settings).await?, ["admin", "botsettings"]);
        assert_eq!(table_names(&databases.users).await?, ["users"]);
        assert_eq!(
            table_names(&databases.giftcode).await?,
            ["gift_codes", "user_giftcodes"]
        );
        assert_eq!(
            table_names(&databases.alliance).await?,
            ["alliance_list", "alliancesettings"]
        );

        databases.close().await;
        Ok(())
    }

    #[tokio::test]
    async fn rerun_keeps_existing_rows() -> Result<()> {
        let root = tempfile::tempdir()?;
        let databases = init_databases(root.path()).await?;
        create_tables(&databases).await?;

        sqlx::query("INSERT INTO users (fid, nickname) VALUES (?, ?)")
            .bind(42_i64)
            .bind("Frosty")
            .execute(&databases.users)
            .await?;

        create_tables(&databases).await?;

        let user: User = sqlx::query_as("SELECT * FROM users WHERE fid = ?")
            .bind(42_i64)
            .fetch_one(&databases.users)
            .await?;
        assert_eq!(user.nickname.as_deref(), Some("Frosty"));
        assert_eq!(user.furnace_lv, Some(0));

        databases.close().await;
        Ok(())
    }

    #[tokio::test]
    async fn redemption_requires_known_gift_code() -> Result<()> {
        let root = tempfile::tempdir()?;
        let databases = init_databases(root.path()).await?;
        create_tables(&databases).await?;

        let orphan = sqlx::query(
            "INSERT INTO user_giftcodes (fid, giftcode, status) VALUES (1, 'NOPE', 'ok')",
        )
        .execute(&databases.giftcode)
        .await;
        assert!(orphan.is_err());

        sqlx::query("INSERT INTO gift_codes (giftcode, date) VALUES ('WINTER', '2024-01-01')")
            .execute(&databases.giftcode)
            .await?;
        sqlx::query(
            "INSERT INTO user_giftcodes (fid, giftcode, status) VALUES (1, 'WINTER', 'ok')",
        )
        .execute(&databases.giftcode)
        .await?;

        let code: GiftCode = sqlx::query_as("SELECT * FROM gift_codes")
            .fetch_one(&databases.giftcode)
            .await?;
        let redemption: UserGiftCode = sqlx::query_as("SELECT * FROM user_giftcodes")
            .fetch_one(&databases.giftcode)
            .await?;
        assert_eq!(code.giftcode, "WINTER");
        assert_eq!(redemption.giftcode, code.giftcode);
        assert_eq!(redemption.status.as_deref(), Some("ok"));

        databases.close().await;
        Ok(())
    }
}
