//! Runtime configuration.
//!
//! Values come from built-in defaults, overridden by `ALFDESK_*` environment
//! variables (a `.env` file is loaded by `main` before first access).

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

/// Name reported by `/health`; discovery refuses any other identity.
pub const SERVICE_NAME: &str = "alfresco-desk-backend";
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Location of the port file relative to the data directory.
pub const PORT_FILE_RELATIVE: &str = ".runtime/backend-port";

pub const DATABASE_FILE: &str = "alfresco-desk.db";

pub const ENV_PREFIX: &str = "ALFDESK_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub loglevel: String,
    pub environment: Environment,
    pub host: String,
    /// `0` binds an ephemeral port.
    pub port: u16,
    pub data_dir: Option<PathBuf>,
    pub database_url: Option<String>,
    /// When set and present on disk, sqlx migrations are run from here
    /// instead of the embedded schema.
    pub migrations_dir: Option<PathBuf>,
    pub proxy: Option<Url>,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_body_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            loglevel: "info".to_string(),
            environment: Environment::Development,
            host: "127.0.0.1".to_string(),
            port: 0,
            data_dir: None,
            database_url: None,
            migrations_dir: None,
            proxy: None,
            connect_timeout_secs: 5,
            request_timeout_secs: 60,
            max_body_bytes: 256 * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Explicit data dir, else the per-platform application data directory,
    /// else `./data`.
    pub fn resolved_data_dir(&self) -> PathBuf {
        if let Some(dir) = self.data_dir.as_ref() {
            return dir.clone();
        }
        ProjectDirs::from("org", "alfresco-desk", "alfresco-desk")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("data"))
    }

    pub fn port_file(&self) -> PathBuf {
        self.resolved_data_dir().join(PORT_FILE_RELATIVE)
    }

    pub fn resolved_database_url(&self) -> String {
        match self.database_url.as_ref() {
            Some(url) => url.clone(),
            None => format!(
                "sqlite://{}",
                self.resolved_data_dir().join(DATABASE_FILE).display()
            ),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

pub static CONFIG: LazyLock<Config> = LazyLock::new(|| {
    Config::load().unwrap_or_else(|e| {
        eprintln!("invalid configuration, falling back to defaults: {e}");
        Config::default()
    })
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("ALFDESK_PORT", "4711");
            jail.set_env("ALFDESK_ENVIRONMENT", "production");
            jail.set_env("ALFDESK_DATA_DIR", "/tmp/alfdesk-test");
            let cfg = Config::load()?;
            assert_eq!(cfg.port, 4711);
            assert!(cfg.is_production());
            assert_eq!(
                cfg.port_file(),
                PathBuf::from("/tmp/alfdesk-test/.runtime/backend-port")
            );
            assert_eq!(
                cfg.resolved_database_url(),
                "sqlite:///tmp/alfdesk-test/alfresco-desk.db"
            );
            Ok(())
        });
    }
}
