//! Bankline CLI
//!
//! Drives an in-memory banking engine from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Run the deposit / withdraw / borrow / repay walkthrough
//! bankline demo
//!
//! # What does 2.5 ETH earn in 90 days?
//! bankline quote interest --balance 2.5eth --days 90
//!
//! # Terms for a 1 ETH loan
//! bankline quote loan --amount 1eth
//!
//! # Print the effective configuration
//! BANKLINE__ENGINE__RATES__DEPOSIT_FEE_BPS=50 bankline config
//! ```

mod commands;
mod config;
mod display;

use bankline_core::Wei;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::commands::{demo, quote};
use crate::config::{CliConfig, LoggingConfig};

/// Bankline - custodial deposits, interest and collateralized loans
#[derive(Parser, Debug)]
#[command(name = "bankline")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (TOML, JSON, or YAML)
    #[arg(short, long, global = true, env = "BANKLINE_CONFIG")]
    config: Option<String>,

    /// Admin account that receives fees and approves loans
    #[arg(long, global = true, env = "BANKLINE_ADMIN")]
    admin: Option<String>,

    /// ETH/USD price feed address
    #[arg(long, global = true, env = "BANKLINE_PRICE_FEED")]
    price_feed: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "BANKLINE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (json, pretty)
    #[arg(long, global = true, env = "BANKLINE_LOG_FORMAT")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full lending walkthrough against an in-memory engine
    Demo {
        /// ETH/USD answer reported by the simulated feed
        #[arg(long, default_value = "200000000000")]
        answer: i128,

        /// Decimals of the simulated feed's answer
        #[arg(long, default_value = "8")]
        decimals: u8,
    },

    /// Quote interest and loan terms under the configured rates
    Quote {
        #[command(subcommand)]
        quote: QuoteCommands,
    },

    /// Print the effective configuration as JSON
    Config,
}

#[derive(Subcommand, Debug)]
enum QuoteCommands {
    /// Interest a balance earns if left untouched
    Interest {
        /// Balance in wei, or ether with an `eth` suffix (e.g. `1.5eth`)
        #[arg(long, value_parser = quote::parse_wei)]
        balance: Wei,

        /// Days the balance stays untouched
        #[arg(long, default_value = "365")]
        days: u32,
    },

    /// Interest, amount due and collateral for a loan
    Loan {
        /// Loan amount in wei, or ether with an `eth` suffix
        #[arg(long, value_parser = quote::parse_wei)]
        amount: Wei,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cli_config = CliConfig::load(cli.config.as_deref())?;
    cli_config.apply_overrides(
        cli.admin.as_deref(),
        cli.price_feed.as_deref(),
        cli.log_level.as_deref(),
        cli.log_format.as_deref(),
    )?;
    cli_config.validate()?;

    init_logging(&cli_config.logging)?;

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        admin = %cli_config.engine.admin,
        "Configuration loaded"
    );

    match cli.command {
        Commands::Demo { answer, decimals } => {
            demo::run_demo(cli_config.engine, answer, decimals).await?;
        }
        Commands::Quote { quote } => match quote {
            QuoteCommands::Interest { balance, days } => {
                quote::interest(&cli_config.engine, balance, days)?;
            }
            QuoteCommands::Loan { amount } => {
                quote::loan(&cli_config.engine, amount)?;
            }
        },
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&cli_config)?);
        }
    }

    Ok(())
}

/// Initialize tracing/logging
///
/// Logs go to stderr so command output on stdout stays clean.
fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => {
            subscriber
                .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
                .try_init()?;
        }
        _ => {
            subscriber
                .with(fmt::layer().pretty().with_target(true).with_writer(std::io::stderr))
                .try_init()?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_quote_loan() {
        let cli = Cli::parse_from(["bankline", "quote", "loan", "--amount", "1eth"]);
        match cli.command {
            Commands::Quote {
                quote: QuoteCommands::Loan { amount },
            } => assert_eq!(amount, Wei::ether(1)),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["bankline", "config", "--log-format", "json"]);
        assert_eq!(cli.log_format.as_deref(), Some("json"));
        assert!(matches!(cli.command, Commands::Config));
    }
}
