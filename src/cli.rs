//! Command-line interface definitions using clap

use clap::{Parser, Subcommand};

use crate::models::Granularity;

/// Sales rollup - minute/hour/date sales aggregation jobs
#[derive(Parser, Debug)]
#[command(name = "sales-rollup")]
#[command(version)]
#[command(about = "Aggregates sale records into minute/hour/date rollups", long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file (default: config.toml)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Derive missing time keys on all sales and fold them into the rollups (default)
    Backfill,

    /// Check every rollup bucket against its sale summaries
    Verify {
        /// Only verify one granularity (minute, hour, date)
        #[arg(long, short = 'g')]
        granularity: Option<Granularity>,
    },

    /// Print a sample configuration file
    GenerateConfig,
}

impl Cli {
    /// Subcommand to run; no subcommand means backfill
    pub fn command(&self) -> &Commands {
        self.command.as_ref().unwrap_or(&Commands::Backfill)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_runs_backfill() {
        let cli = Cli::try_parse_from(["sales-rollup"]).unwrap();
        assert_eq!(cli.command(), &Commands::Backfill);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_verify_with_granularity() {
        let cli =
            Cli::try_parse_from(["sales-rollup", "-c", "prod.toml", "verify", "-g", "hour"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some("prod.toml"));
        assert_eq!(
            cli.command(),
            &Commands::Verify {
                granularity: Some(Granularity::Hour)
            }
        );
    }

    #[test]
    fn test_invalid_granularity_rejected() {
        assert!(Cli::try_parse_from(["sales-rollup", "verify", "-g", "week"]).is_err());
    }
}
