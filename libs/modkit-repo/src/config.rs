//! Repository layer configuration.
//!
//! Layered with figment: serde defaults, then an optional YAML file, then
//! `MODKIT_REPO_*` environment variables (`__` separates nested keys, e.g.
//! `MODKIT_REPO_TRANSACTION__ISOLATION=serializable`).

use std::path::Path;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use modkit_security::roles;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::schema::{Schema, SchemaBuilder};
use crate::tenant::TenantVisibility;
use crate::tx_config::TxConfig;

pub const ENV_PREFIX: &str = "MODKIT_REPO_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepoConfig {
    /// Connection string, e.g. `sqlite://data/app.db?mode=rwc`.
    pub dsn: String,
    pub max_conns: Option<u32>,
    pub min_conns: Option<u32>,
    #[serde(with = "humantime_serde")]
    pub acquire_timeout: Option<Duration>,
    /// Log every statement through sqlx.
    pub sql_logging: bool,
    /// Role allowed to bypass the tenant filter.
    pub privileged_role: String,
    pub tenant_visibility: TenantVisibility,
    /// Defaults for explicit units of work.
    pub transaction: TxConfig,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            dsn: "sqlite::memory:".to_owned(),
            max_conns: None,
            min_conns: None,
            acquire_timeout: None,
            sql_logging: false,
            privileged_role: roles::SYSTEM_ADMIN.to_owned(),
            tenant_visibility: TenantVisibility::default(),
            transaction: TxConfig::default(),
        }
    }
}

impl RepoConfig {
    /// Extract from an existing figment.
    ///
    /// # Errors
    /// `RepoError::Config` if the figment does not describe a valid configuration.
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        Ok(figment.extract()?)
    }

    /// Defaults, overridden by `path` (YAML) when given, overridden by the environment.
    ///
    /// # Errors
    /// `RepoError::Config` on unreadable or invalid sources.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::from_figment(&figment)
    }

    /// Schema builder carrying the configured tenant visibility.
    #[must_use]
    pub fn schema_builder(&self) -> SchemaBuilder {
        Schema::builder().tenant_visibility(self.tenant_visibility)
    }

    /// Open a pooled connection.
    ///
    /// # Errors
    /// Storage errors from the driver.
    pub async fn connect(&self) -> Result<DatabaseConnection> {
        let mut opts = ConnectOptions::new(self.dsn.clone());
        if let Some(n) = self.max_conns {
            opts.max_connections(n);
        }
        if let Some(n) = self.min_conns {
            opts.min_connections(n);
        }
        if let Some(t) = self.acquire_timeout {
            opts.acquire_timeout(t);
        }
        opts.sqlx_logging(self.sql_logging);

        let conn = Database::connect(opts).await?;
        tracing::info!(backend = ?conn.get_database_backend(), "database connected");
        Ok(conn)
    }
}
