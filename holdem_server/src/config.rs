//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use holdem_engine::{
    db::DatabaseConfig,
    game::Chips,
    recovery::RecoveryConfig,
    security::RateLimitConfig,
    table::{TableConfig, TableSpeed},
};
use std::net::SocketAddr;

/// Values given on the command line. They win over the environment.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub bind: Option<SocketAddr>,
    pub database_url: Option<String>,
    pub num_tables: Option<usize>,
    pub metrics_bind: Option<SocketAddr>,
    pub in_memory: bool,
}

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Prometheus scrape address, if metrics are exported
    pub metrics_bind: Option<SocketAddr>,
    /// `None` keeps all state in memory
    pub database: Option<DatabaseConfig>,
    /// Settings for tables created at startup
    pub table_defaults: TableDefaultsConfig,
    /// Tables to create when nothing was recovered
    pub num_tables: usize,
    pub rate_limit: RateLimitConfig,
    pub recovery: RecoveryConfig,
}

/// Default table configuration
#[derive(Debug, Clone)]
pub struct TableDefaultsConfig {
    pub max_players: usize,
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub min_buy_in: Chips,
    pub max_buy_in: Chips,
    pub speed: TableSpeed,
    /// Pause between hands in milliseconds
    pub hand_interval_ms: u64,
}

impl Default for TableDefaultsConfig {
    fn default() -> Self {
        let table = TableConfig::default();
        Self {
            max_players: table.max_players,
            small_blind: table.small_blind,
            big_blind: table.big_blind,
            min_buy_in: table.min_buy_in,
            max_buy_in: table.max_buy_in,
            speed: table.speed,
            hand_interval_ms: table.hand_interval_ms,
        }
    }
}

impl TableDefaultsConfig {
    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_players: parse_env_or("TABLE_MAX_PLAYERS", defaults.max_players),
            small_blind: parse_env_or("TABLE_SMALL_BLIND", defaults.small_blind),
            big_blind: parse_env_or("TABLE_BIG_BLIND", defaults.big_blind),
            min_buy_in: parse_env_or("TABLE_MIN_BUY_IN", defaults.min_buy_in),
            max_buy_in: parse_env_or("TABLE_MAX_BUY_IN", defaults.max_buy_in),
            speed: std::env::var("TABLE_SPEED")
                .ok()
                .and_then(|v| parse_speed(&v))
                .unwrap_or(defaults.speed),
            hand_interval_ms: parse_env_or("TABLE_HAND_INTERVAL_MS", defaults.hand_interval_ms),
        }
    }

    /// Table config for a new table called `name`.
    pub fn table_config(&self, name: impl Into<String>) -> TableConfig {
        TableConfig {
            name: name.into(),
            max_players: self.max_players,
            small_blind: self.small_blind,
            big_blind: self.big_blind,
            min_buy_in: self.min_buy_in,
            max_buy_in: self.max_buy_in,
            speed: self.speed,
            hand_interval_ms: self.hand_interval_ms,
            ..TableConfig::default()
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or invalid
    pub fn from_env(overrides: CliOverrides) -> Result<Self, ConfigError> {
        let bind = overrides
            .bind
            .or_else(|| {
                std::env::var("SERVER_BIND")
                    .ok()
                    .and_then(|s| s.parse().ok())
            })
            .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 6969)));

        let metrics_bind = overrides.metrics_bind.or_else(|| {
            std::env::var("METRICS_BIND")
                .ok()
                .and_then(|s| s.parse().ok())
        });

        let database = if overrides.in_memory {
            None
        } else {
            let database_url = overrides
                .database_url
                .or_else(|| std::env::var("DATABASE_URL").ok())
                .ok_or_else(|| ConfigError::MissingRequired {
                    var: "DATABASE_URL".to_string(),
                    hint: "Pass --db-url, or --in-memory to run without a database".to_string(),
                })?;
            let database = DatabaseConfig::from_env_with_url(database_url).map_err(|reason| {
                ConfigError::Invalid {
                    var: "DB_*".to_string(),
                    reason,
                }
            })?;
            Some(database)
        };

        let num_tables = overrides
            .num_tables
            .unwrap_or_else(|| parse_env_or("MAX_TABLES", 1));

        Ok(ServerConfig {
            bind,
            metrics_bind,
            database,
            table_defaults: TableDefaultsConfig::from_env(),
            num_tables,
            rate_limit: RateLimitConfig::actions(),
            recovery: RecoveryConfig::from_env(),
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.table_defaults
            .table_config("Table")
            .validate()
            .map_err(|reason| ConfigError::Invalid {
                var: "TABLE_*".to_string(),
                reason,
            })?;

        if !self.rate_limit.actions_per_sec.is_finite() || self.rate_limit.actions_per_sec <= 0.0 {
            return Err(ConfigError::Invalid {
                var: "RATE_LIMIT_ACTIONS_PER_SEC".to_string(),
                reason: "Must be a positive number".to_string(),
            });
        }

        if self.rate_limit.burst == 0 {
            return Err(ConfigError::Invalid {
                var: "RATE_LIMIT_ACTION_BURST".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.database.is_none() && self.num_tables == 0 {
            return Err(ConfigError::Invalid {
                var: "MAX_TABLES".to_string(),
                reason: "An in-memory server needs at least one table".to_string(),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

fn parse_speed(raw: &str) -> Option<TableSpeed> {
    match raw.to_lowercase().as_str() {
        "normal" => Some(TableSpeed::Normal),
        "turbo" => Some(TableSpeed::Turbo),
        "hyper" => Some(TableSpeed::Hyper),
        _ => None,
    }
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn config() -> ServerConfig {
        ServerConfig {
            bind: "127.0.0.1:8080".parse().unwrap(),
            metrics_bind: None,
            database: None,
            table_defaults: TableDefaultsConfig::default(),
            num_tables: 1,
            rate_limit: RateLimitConfig::default(),
            recovery: RecoveryConfig::default(),
        }
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingRequired {
            var: "DATABASE_URL".to_string(),
            hint: "Use --in-memory".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("DATABASE_URL"));
        assert!(msg.contains("Use --in-memory"));
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_config_validation_blind_zero() {
        let mut config = config();
        config.table_defaults.small_blind = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_config_validation_big_blind_too_small() {
        let mut config = config();
        config.table_defaults.small_blind = 20;
        config.table_defaults.big_blind = 10;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("TABLE_*"));
    }

    #[test]
    fn test_in_memory_needs_a_table() {
        let mut config = config();
        config.num_tables = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_table_config_uses_defaults() {
        let defaults = TableDefaultsConfig {
            speed: TableSpeed::Turbo,
            big_blind: 50,
            ..TableDefaultsConfig::default()
        };
        let table = defaults.table_config("Main");
        assert_eq!(table.name, "Main");
        assert_eq!(table.big_blind, 50);
        assert_eq!(table.action_timeout_secs(), 15);
    }

    #[test]
    fn test_parse_speed() {
        assert_eq!(parse_speed("HYPER"), Some(TableSpeed::Hyper));
        assert_eq!(parse_speed("slow"), None);
    }

    #[test]
    #[serial]
    fn test_overrides_win_over_environment() {
        // SAFETY: serialized with the other env-mutating tests.
        unsafe {
            std::env::set_var("SERVER_BIND", "0.0.0.0:7000");
            std::env::set_var("MAX_TABLES", "4");
        }
        let overrides = CliOverrides {
            bind: Some("127.0.0.1:9000".parse().unwrap()),
            in_memory: true,
            ..CliOverrides::default()
        };
        let config = ServerConfig::from_env(overrides).unwrap();
        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.num_tables, 4);
        assert!(config.database.is_none());
        unsafe {
            std::env::remove_var("SERVER_BIND");
            std::env::remove_var("MAX_TABLES");
        }
    }

    #[test]
    #[serial]
    fn test_database_url_required_without_in_memory() {
        unsafe {
            std::env::remove_var("DATABASE_URL");
        }
        let result = ServerConfig::from_env(CliOverrides::default());
        assert!(matches!(result, Err(ConfigError::MissingRequired { .. })));
    }
}
