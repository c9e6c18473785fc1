//! # Ledger Configuration
//!
//! Configuration for the ledger service.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     STOCKBOOK_DB_PATH=/var/lib/stockbook/stockbook.db                  │
//! │     STOCKBOOK_UNALLOCATED_POLICY=flag_unbacked                         │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/stockbook/stockbook.toml (Linux)                         │
//! │     ~/Library/Application Support/com.stockbook.stockbook/... (macOS)  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/var/lib/stockbook/stockbook.db"
//! max_connections = 5
//!
//! [ledger]
//! unallocated_policy = "reject"   # reject | flag_unbacked
//! skip_expired_batches = true
//! expire_on_rollover = true
//! max_conflict_retries = 5
//! initial_backoff_ms = 20
//! max_backoff_ms = 1000
//!
//! [alerts]
//! reorder_level = 10
//! max_stock = 500
//! expiry_warning_days = 7
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{LedgerError, LedgerResult};
use stockbook_core::{AlertThresholds, BookPolicy, UnallocatedPolicy};
use stockbook_db::DbConfig;

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Created on first start.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join("stockbook.db"))
        .unwrap_or_else(|| PathBuf::from("stockbook.db"))
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Ledger Settings
// =============================================================================

/// Ledger rules and write retry behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSettings {
    /// What to do with sale quantity no batch can cover.
    #[serde(default)]
    pub unallocated_policy: UnallocatedPolicy,

    /// Sales and downward adjustments never draw from expired batches.
    #[serde(default = "default_true")]
    pub skip_expired_batches: bool,

    /// Write off expired prior-month stock when a month is opened.
    #[serde(default = "default_true")]
    pub expire_on_rollover: bool,

    /// Retries after a version conflict before giving up.
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_true() -> bool {
    true
}
fn default_max_conflict_retries() -> u32 {
    5
}
fn default_initial_backoff() -> u64 {
    20
}
fn default_max_backoff() -> u64 {
    1000
}

impl Default for LedgerSettings {
    fn default() -> Self {
        LedgerSettings {
            unallocated_policy: UnallocatedPolicy::default(),
            skip_expired_batches: true,
            expire_on_rollover: true,
            max_conflict_retries: default_max_conflict_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

// =============================================================================
// Alert Settings
// =============================================================================

/// Thresholds used when the product catalog has none for a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertSettings {
    #[serde(default = "default_reorder_level")]
    pub reorder_level: i64,

    #[serde(default)]
    pub max_stock: Option<i64>,

    #[serde(default = "default_expiry_warning_days")]
    pub expiry_warning_days: i64,
}

fn default_reorder_level() -> i64 {
    AlertThresholds::default().reorder_level
}

fn default_expiry_warning_days() -> i64 {
    AlertThresholds::default().expiry_warning_days
}

impl Default for AlertSettings {
    fn default() -> Self {
        AlertSettings {
            reorder_level: default_reorder_level(),
            max_stock: None,
            expiry_warning_days: default_expiry_warning_days(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete ledger configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub ledger: LedgerSettings,

    #[serde(default)]
    pub alerts: AlertSettings,
}

impl LedgerConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (stockbook.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> LedgerResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading ledger config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load ledger config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> LedgerResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| LedgerError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| LedgerError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| LedgerError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Ledger config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(LedgerError::InvalidConfig("database.path must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(LedgerError::InvalidConfig(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.ledger.initial_backoff_ms > self.ledger.max_backoff_ms {
            return Err(LedgerError::InvalidConfig(format!(
                "ledger.initial_backoff_ms ({}) exceeds ledger.max_backoff_ms ({})",
                self.ledger.initial_backoff_ms, self.ledger.max_backoff_ms
            )));
        }

        if self.alerts.reorder_level < 0 {
            return Err(LedgerError::InvalidConfig(
                "alerts.reorder_level must not be negative".into(),
            ));
        }

        if self.alerts.expiry_warning_days < 0 {
            return Err(LedgerError::InvalidConfig(
                "alerts.expiry_warning_days must not be negative".into(),
            ));
        }

        if let Some(max) = self.alerts.max_stock {
            if max <= self.alerts.reorder_level {
                return Err(LedgerError::InvalidConfig(format!(
                    "alerts.max_stock ({}) must be above alerts.reorder_level ({})",
                    max, self.alerts.reorder_level
                )));
            }
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("STOCKBOOK_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(max) = std::env::var("STOCKBOOK_MAX_CONNECTIONS") {
            if let Ok(n) = max.parse::<u32>() {
                self.database.max_connections = n;
            }
        }

        if let Ok(policy) = std::env::var("STOCKBOOK_UNALLOCATED_POLICY") {
            match policy.parse() {
                Ok(parsed) => {
                    debug!(policy = %policy, "Overriding unallocated policy from environment");
                    self.ledger.unallocated_policy = parsed;
                }
                Err(_) => warn!(policy = %policy, "Unknown unallocated policy in environment"),
            }
        }

        if let Ok(flag) = std::env::var("STOCKBOOK_SKIP_EXPIRED_BATCHES") {
            if let Ok(b) = flag.parse::<bool>() {
                self.ledger.skip_expired_batches = b;
            }
        }

        if let Ok(flag) = std::env::var("STOCKBOOK_EXPIRE_ON_ROLLOVER") {
            if let Ok(b) = flag.parse::<bool>() {
                self.ledger.expire_on_rollover = b;
            }
        }

        if let Ok(retries) = std::env::var("STOCKBOOK_MAX_CONFLICT_RETRIES") {
            if let Ok(n) = retries.parse::<u32>() {
                self.ledger.max_conflict_retries = n;
            }
        }

        if let Ok(level) = std::env::var("STOCKBOOK_REORDER_LEVEL") {
            if let Ok(n) = level.parse::<i64>() {
                self.alerts.reorder_level = n;
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("stockbook.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Ledger rules for [`LedgerBook::record`](stockbook_core::LedgerBook::record).
    pub fn book_policy(&self) -> BookPolicy {
        BookPolicy {
            unallocated: self.ledger.unallocated_policy,
            skip_expired_batches: self.ledger.skip_expired_batches,
            expire_on_rollover: self.ledger.expire_on_rollover,
        }
    }

    /// Fallback thresholds for products the catalog doesn't know.
    pub fn default_thresholds(&self) -> AlertThresholds {
        AlertThresholds {
            reorder_level: self.alerts.reorder_level,
            max_stock: self.alerts.max_stock,
            expiry_warning_days: self.alerts.expiry_warning_days,
        }
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path).max_connections(self.database.max_connections)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.ledger.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.ledger.max_backoff_ms)
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "stockbook", "stockbook")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = LedgerConfig::default();
        assert_eq!(config.ledger.unallocated_policy, UnallocatedPolicy::Reject);
        assert!(config.ledger.skip_expired_batches);
        assert_eq!(config.alerts.reorder_level, 10);
        assert!(config.validate().is_ok());
        assert_eq!(config.book_policy(), BookPolicy::default());
    }

    #[test]
    fn test_config_validation() {
        let mut config = LedgerConfig::default();

        config.database.max_connections = 0;
        assert!(config.validate().is_err());
        config.database.max_connections = 5;

        config.ledger.initial_backoff_ms = 5_000;
        assert!(config.validate().is_err());
        config.ledger.initial_backoff_ms = 20;

        config.alerts.max_stock = Some(5);
        assert!(config.validate().is_err());
        config.alerts.max_stock = Some(500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stockbook.toml");
        std::fs::write(
            &path,
            r#"
            [ledger]
            unallocated_policy = "flag_unbacked"

            [alerts]
            reorder_level = 3
            "#,
        )
        .unwrap();

        let config = LedgerConfig::load(Some(path)).unwrap();
        assert_eq!(
            config.ledger.unallocated_policy,
            UnallocatedPolicy::FlagUnbacked
        );
        assert_eq!(config.alerts.reorder_level, 3);
        assert_eq!(config.alerts.expiry_warning_days, 7);
        assert_eq!(config.ledger.max_conflict_retries, 5);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("stockbook.toml");

        let mut config = LedgerConfig::default();
        config.database.path = dir.path().join("ledger.db");
        config.alerts.max_stock = Some(250);
        config.save(Some(path.clone())).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("[database]"));
        assert!(text.contains("[ledger]"));

        let reloaded = LedgerConfig::load(Some(path)).unwrap();
        assert_eq!(reloaded.database.path, dir.path().join("ledger.db"));
        assert_eq!(reloaded.alerts.max_stock, Some(250));
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stockbook.toml");
        std::fs::write(&path, "[ledger]\nunallocated_policy = \"sometimes\"\n").unwrap();

        assert!(matches!(
            LedgerConfig::load(Some(path.clone())),
            Err(LedgerError::ConfigLoadFailed(_))
        ));

        let fallback = LedgerConfig::load_or_default(Some(path));
        assert_eq!(fallback.ledger.unallocated_policy, UnallocatedPolicy::Reject);
    }
}
