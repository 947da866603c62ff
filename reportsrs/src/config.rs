//! Configuration for the reporting core.
//!
//! Supports TOML-based configuration with defaults for every section, so an
//! empty file (or no file at all) yields a working setup.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ReportError, Result};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportsConfig {
    pub view: ViewConfig,
    pub cache: CacheConfig,
    pub reports: ReportDefaults,
    pub query: QueryConfig,
    pub pool: PoolConfig,
    pub duckdb: DuckDbConfig,
    pub postgres: PostgresConfig,
}

/// Which relation the reports read from.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Reporting view name (default: `vw_rental_analysis`).
    pub name: String,
    /// Catalog schema holding the view. Backends pick their own default when unset
    /// (`public` for PostgreSQL, `main` for DuckDB).
    pub schema: Option<String>,
}

/// TTLs for the schema and distinct-value caches.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Schema snapshot TTL in seconds (default: 60).
    pub schema_ttl_secs: u64,
    /// Distinct-value lookup TTL in seconds (default: 60).
    pub lookup_ttl_secs: u64,
    /// Maximum cached lookup lists (default: 64).
    pub max_lookups: usize,
}

/// Report shaping options.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportDefaults {
    pub min_top_n: u32,
    pub max_top_n: u32,
    pub default_top_n: u32,
    /// Wrap revenue sums in `COALESCE(.., 0)` (default: false, all-null groups report no revenue).
    pub coalesce_null_revenue: bool,
}

/// Query execution configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Query timeout in milliseconds (default: 30000).
    pub timeout_ms: u64,
}

/// Connection pooling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum pool size (default: 16).
    pub size: usize,
}

/// DuckDB-specific configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DuckDbConfig {
    /// Database file; `None` means no DuckDB backend is configured.
    pub path: Option<String>,
    /// Maximum concurrent queries (default: 16).
    pub max_concurrency: usize,
}

/// PostgreSQL-specific configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PostgresConfig {
    /// Key-value or URL connection string.
    pub connection_string: Option<String>,
    /// Connection pool size (overrides pool.size for Postgres).
    pub pool_size: Option<usize>,
    /// Statement timeout in milliseconds (falls back to query.timeout_ms).
    pub statement_timeout_ms: Option<u64>,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            name: "vw_rental_analysis".to_string(),
            schema: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            schema_ttl_secs: 60,
            lookup_ttl_secs: 60,
            max_lookups: 64,
        }
    }
}

impl Default for ReportDefaults {
    fn default() -> Self {
        Self {
            min_top_n: 5,
            max_top_n: 25,
            default_top_n: 10,
            coalesce_null_revenue: false,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { timeout_ms: 30_000 }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { size: 16 }
    }
}

impl Default for DuckDbConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_concurrency: 16,
        }
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            connection_string: None,
            pool_size: None,
            statement_timeout_ms: None,
        }
    }
}

impl ReportsConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ReportError::Config(format!("failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(toml_str)
            .map_err(|e| ReportError::Config(format!("failed to parse config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from default locations (env var, cwd, user config dir, or defaults).
    ///
    /// Search order:
    /// 1. `PAGILA_REPORTS_CONFIG` environment variable
    /// 2. `./pagila_reports.toml` (current directory)
    /// 3. `~/.config/pagila-reports/config.toml` (user config dir)
    /// 4. Built-in defaults
    pub fn load_default() -> Self {
        if let Ok(path) = std::env::var("PAGILA_REPORTS_CONFIG") {
            match Self::from_file(&path) {
                Ok(cfg) => {
                    tracing::info!(path = %path, "loaded config from PAGILA_REPORTS_CONFIG");
                    return cfg;
                }
                Err(e) => tracing::warn!(path = %path, error = %e, "ignoring PAGILA_REPORTS_CONFIG"),
            }
        }

        if let Ok(cfg) = Self::from_file("pagila_reports.toml") {
            tracing::info!("loaded config from ./pagila_reports.toml");
            return cfg;
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("pagila-reports").join("config.toml");
            if let Ok(cfg) = Self::from_file(&user_config) {
                tracing::info!(path = %user_config.display(), "loaded config from user config dir");
                return cfg;
            }
        }

        tracing::debug!("no config file found, using defaults");
        Self::default()
    }

    /// Reject settings the composers cannot honour.
    pub fn validate(&self) -> Result<()> {
        let r = &self.reports;
        if r.min_top_n == 0 || r.min_top_n > r.max_top_n {
            return Err(ReportError::Config(format!(
                "top-N bounds must satisfy 1 <= min <= max, got {}..{}",
                r.min_top_n, r.max_top_n
            )));
        }
        if !(r.min_top_n..=r.max_top_n).contains(&r.default_top_n) {
            return Err(ReportError::Config(format!(
                "default top-N {} outside {}..={}",
                r.default_top_n, r.min_top_n, r.max_top_n
            )));
        }
        if self.view.name.trim().is_empty() {
            return Err(ReportError::Config("view name must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn postgres_statement_timeout_ms(&self) -> u64 {
        self.postgres
            .statement_timeout_ms
            .unwrap_or(self.query.timeout_ms)
    }

    pub fn postgres_pool_size(&self) -> usize {
        self.postgres.pool_size.unwrap_or(self.pool.size)
    }
}
