use crate::error::ConfigError;
use core_types::CanonicalField;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// The root configuration structure for the entire application.
///
/// Every section is optional in the file; missing sections fall back to
/// their `Default` implementations.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseSettings,
    pub server: ServerSettings,
    pub ingest: IngestSettings,
    pub log: LogSettings,
    pub allocation: AllocationSettings,
}

/// Connection settings for the relational store.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// The PostgreSQL connection string. `DATABASE_URL` is used when unset.
    pub url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
            acquire_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Socket address the HTTP API binds to.
    pub addr: String,
    /// Upper bound on uploaded spreadsheet size, in megabytes.
    pub body_limit_mb: usize,
}

/// Largest accepted `server.body_limit_mb`.
pub const MAX_BODY_LIMIT_MB: usize = 1024;

impl ServerSettings {
    pub fn body_limit_bytes(&self) -> usize {
        self.body_limit_mb.saturating_mul(1024 * 1024)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:3000".to_string(),
            body_limit_mb: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    /// Extra header aliases, keyed by canonical field name (e.g. `amount`).
    /// They are tried after the built-in aliases.
    pub extra_aliases: BTreeMap<String, Vec<String>>,
    /// Rows per multi-row `INSERT` statement.
    pub insert_chunk_size: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            extra_aliases: BTreeMap::new(),
            insert_chunk_size: 1000,
        }
    }
}

impl IngestSettings {
    /// Resolves the configured alias keys into canonical fields.
    pub fn aliases(&self) -> Result<Vec<(CanonicalField, Vec<String>)>, ConfigError> {
        self.extra_aliases
            .iter()
            .map(|(field, headers)| {
                let field = field.parse::<CanonicalField>().map_err(|_| {
                    ConfigError::ValidationError(format!("ingest.extra_aliases: unknown field '{field}'"))
                })?;
                Ok((field, headers.clone()))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    /// When set, logs are also written to a daily rolling file in this directory.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            file_prefix: "fxdash.log".to_string(),
        }
    }
}

/// Default parameters for the maker allocation optimizer.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AllocationSettings {
    /// Minimum share of the target volume given to every maker (0-1).
    pub min_share: Decimal,
    /// Maximum share of the target volume given to any maker (0-1).
    pub max_share: Decimal,
    /// Weight applied to the rate standard deviation in the unit cost.
    pub risk_aversion: Decimal,
    /// Percentile of historical daily volume used as a maker's capacity.
    pub capacity_percentile: Decimal,
}

impl Default for AllocationSettings {
    fn default() -> Self {
        Self {
            min_share: Decimal::ZERO,
            max_share: Decimal::ONE,
            risk_aversion: Decimal::ZERO,
            capacity_percentile: dec!(0.95),
        }
    }
}

impl Config {
    /// Returns the configured connection string, falling back to `DATABASE_URL`.
    pub fn database_url(&self) -> Result<String, ConfigError> {
        self.database
            .url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .or_else(|| std::env::var("DATABASE_URL").ok())
            .ok_or_else(|| {
                ConfigError::ValidationError(
                    "no database connection string: set database.url or DATABASE_URL".to_string(),
                )
            })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.ingest.insert_chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "ingest.insert_chunk_size must be at least 1".to_string(),
            ));
        }
        if self.server.addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::ValidationError(format!(
                "server.addr '{}' is not a socket address",
                self.server.addr
            )));
        }
        if !(1..=MAX_BODY_LIMIT_MB).contains(&self.server.body_limit_mb) {
            return Err(ConfigError::ValidationError(format!(
                "server.body_limit_mb must be within 1..={MAX_BODY_LIMIT_MB}, got {}",
                self.server.body_limit_mb
            )));
        }
        self.ingest.aliases()?;

        let a = &self.allocation;
        if !(Decimal::ZERO <= a.min_share && a.min_share <= a.max_share && a.max_share <= Decimal::ONE) {
            return Err(ConfigError::ValidationError(
                "allocation: expected 0 <= min_share <= max_share <= 1".to_string(),
            ));
        }
        if a.risk_aversion < Decimal::ZERO {
            return Err(ConfigError::ValidationError(
                "allocation.risk_aversion must not be negative".to_string(),
            ));
        }
        if a.capacity_percentile < Decimal::ZERO || a.capacity_percentile > Decimal::ONE {
            return Err(ConfigError::ValidationError(
                "allocation.capacity_percentile must be within 0..1".to_string(),
            ));
        }
        Ok(())
    }
}
