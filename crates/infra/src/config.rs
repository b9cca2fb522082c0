//! Configuration loading and representation.
//!
//! Values come from environment variables. Loaders take a lookup function so
//! tests can supply variables without touching the process environment.

use anyhow::{Context, Result};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub const CONFLICT_RETRIES_VAR: &str = "OPSCONSOLE_CONFLICT_RETRIES";
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
pub const DATABASE_MAX_CONNECTIONS_VAR: &str = "DATABASE_MAX_CONNECTIONS";

/// Registry behaviour knobs.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// How many times `enable_with_dependencies` restarts after a revision
    /// conflict before giving up.
    pub conflict_retries: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { conflict_retries: 3 }
    }
}

impl RegistryConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(raw) = lookup(CONFLICT_RETRIES_VAR) {
            config.conflict_retries = raw.trim().parse().with_context(|| {
                format!("{CONFLICT_RETRIES_VAR} must be a non-negative integer, got {raw:?}")
            })?;
        }
        Ok(config)
    }
}

/// Postgres connection settings for the catalog store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let url =
            lookup(DATABASE_URL_VAR).with_context(|| format!("{DATABASE_URL_VAR} is not set"))?;

        let max_connections = match lookup(DATABASE_MAX_CONNECTIONS_VAR) {
            Some(raw) => raw.trim().parse().with_context(|| {
                format!("{DATABASE_MAX_CONNECTIONS_VAR} must be a positive integer, got {raw:?}")
            })?,
            None => 5,
        };
        anyhow::ensure!(
            max_connections > 0,
            "{DATABASE_MAX_CONNECTIONS_VAR} must be at least 1"
        );

        Ok(Self { url, max_connections })
    }

    pub async fn connect(&self) -> Result<PgPool> {
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .connect(&self.url)
            .await
            .context("failed to connect to the catalog database")?;
        Ok(pool)
    }
}
