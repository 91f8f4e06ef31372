//! CLI Configuration
//!
//! Layered configuration for the `bankline` binary. Sources, lowest
//! precedence first:
//!
//! 1. Built-in defaults (development admin, Sepolia ETH/USD feed)
//! 2. The file passed with `--config`
//! 3. `config/default` and `config/local` (TOML, JSON or YAML)
//! 4. `BANKLINE__`-prefixed environment variables, e.g.
//!    `BANKLINE__ENGINE__RATES__DEPOSIT_FEE_BPS=50`
//!
//! Command-line flags are applied on top by `main`.

use bankline_core::{AccountId, EngineConfig};
use serde::{Deserialize, Serialize};

/// Effective CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Engine construction parameters
    #[serde(default)]
    pub engine: EngineConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl CliConfig {
    /// Load configuration from files and environment
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false));

        builder = builder.add_source(
            config::Environment::with_prefix("BANKLINE")
                .separator("__")
                .try_parsing(true),
        );

        let cli_config: CliConfig = builder.build()?.try_deserialize()?;
        Ok(cli_config)
    }

    /// Apply command-line overrides
    pub fn apply_overrides(
        &mut self,
        admin: Option<&str>,
        price_feed: Option<&str>,
        log_level: Option<&str>,
        log_format: Option<&str>,
    ) -> anyhow::Result<()> {
        if let Some(admin) = admin {
            self.engine.admin = AccountId::parse(admin)?;
        }
        if let Some(feed) = price_feed {
            self.engine.price_feed = feed.to_string();
        }
        if let Some(level) = log_level {
            self.logging.level = level.to_string();
        }
        if let Some(format) = log_format {
            self.logging.format = format.to_string();
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.engine.validate()?;
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            anyhow::bail!(
                "Unknown log format '{}', expected 'pretty' or 'json'",
                self.logging.format
            );
        }
        Ok(())
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}
