use crate::db::models::User;
use crate::db::schema::{SCHEMA_VERSION, statements};
use crate::error::DeskError;
use chrono::Utc;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

pub type SqlitePool = Pool<Sqlite>;

pub const LOCAL_USERNAME: &str = "local";

/// Handle to the local application database, scoped to the single local user.
#[derive(Clone)]
pub struct LocalStore {
    pool: SqlitePool,
    user_id: i64,
}

impl LocalStore {
    /// Connect, bring the schema up to date and make sure the local user exists.
    pub async fn open(
        database_url: &str,
        migrations_dir: Option<&Path>,
    ) -> Result<Self, DeskError> {
        if let Some(parent) = sqlite_file_parent(database_url) {
            std::fs::create_dir_all(parent)?;
        }
        let connect_opts = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(connect_opts)
            .await?;

        match migrations_dir.filter(|dir| dir.is_dir()) {
            Some(dir) => {
                info!(path = %dir.display(), "running migrations");
                Migrator::new(dir).await?.run(&pool).await?;
            }
            None => init_schema(&pool).await?,
        }

        let user = ensure_user(&pool, LOCAL_USERNAME).await?;
        debug!(user_id = user.id, "local store ready");
        Ok(Self {
            pool,
            user_id: user.id,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub async fn user(&self) -> Result<User, DeskError> {
        let user = sqlx::query_as::<_, User>("SELECT id, username, created_at FROM users WHERE id = ?")
            .bind(self.user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Apply the embedded schema when `PRAGMA user_version` is behind.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), DeskError> {
    let (version,): (i64,) = sqlx::query_as("PRAGMA user_version")
        .fetch_one(pool)
        .await?;
    if version >= SCHEMA_VERSION {
        debug!(version, "schema up to date");
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    for stmt in statements() {
        sqlx::query(stmt).execute(&mut *tx).await?;
    }
    // PRAGMA does not accept bound parameters.
    sqlx::query(&format!("PRAGMA user_version = {SCHEMA_VERSION}"))
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    info!(from = version, to = SCHEMA_VERSION, "embedded schema applied");
    Ok(())
}

async fn ensure_user(pool: &SqlitePool, username: &str) -> Result<User, DeskError> {
    sqlx::query("INSERT INTO users (username, created_at) VALUES (?, ?) ON CONFLICT(username) DO NOTHING")
        .bind(username)
        .bind(Utc::now())
        .execute(pool)
        .await?;
    let user = sqlx::query_as::<_, User>("SELECT id, username, created_at FROM users WHERE username = ?")
        .bind(username)
        .fetch_one(pool)
        .await?;
    Ok(user)
}

/// Directory holding the database file for `sqlite://` URLs, if any.
fn sqlite_file_parent(database_url: &str) -> Option<&Path> {
    let path = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = path.split('?').next()?;
    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Path::new(path).parent().filter(|p| !p.as_os_str().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_directory_of_sqlite_urls() {
        assert_eq!(
            sqlite_file_parent("sqlite:///var/lib/app/db.sqlite"),
            Some(Path::new("/var/lib/app"))
        );
        assert_eq!(
            sqlite_file_parent("sqlite:data/app.db?mode=rwc"),
            Some(Path::new("data"))
        );
        assert_eq!(sqlite_file_parent("sqlite::memory:"), None);
        assert_eq!(sqlite_file_parent("sqlite:app.db"), None);
    }

    #[tokio::test]
    async fn schema_bootstrap_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("t.db").display());
        let first = LocalStore::open(&url, None).await.unwrap();
        let user_id = first.user_id();
        first.close().await;

        let second = LocalStore::open(&url, None).await.unwrap();
        assert_eq!(second.user_id(), user_id);
        assert_eq!(second.user().await.unwrap().username, LOCAL_USERNAME);
    }
}
