//! CLI command definitions
//!
//! All CLI structs and subcommand enums are defined here.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Default file written by `example-config`
pub const EXAMPLE_CONFIG_FILE: &str = "icinga2rt.yaml.example";

/// icinga2rt - open, comment and close RT tickets from Icinga2 notifications
#[derive(Parser, Debug)]
#[command(name = "icinga2rt")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (default: <config dir>/icinga2rt/config.yaml)
    #[arg(short, long, global = true, env = "ICINGA2RT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Log every received notification
    #[arg(long, global = true)]
    pub debug_events: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Process the Icinga2 event stream until interrupted
    Run,

    /// Print all cache entries as JSON
    DumpCache,

    /// List cache entries whose ticket is missing or deleted
    StaleCache,

    /// Remove cache entries whose ticket is missing or deleted
    CleanCache,

    /// Write an example configuration file
    ExampleConfig {
        /// Output path
        #[arg(default_value = EXAMPLE_CONFIG_FILE)]
        path: PathBuf,
    },
}

impl Cli {
    /// Config path given on the command line, or the default location
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(crate::config::Icinga2RtConfig::default_path)
    }
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
    fn test_parse_run_with_flags() {
        let cli = Cli::parse_from(["icinga2rt", "-vv", "--config", "/etc/i2rt.yaml", "run"]);
        assert_eq!(cli.command, Commands::Run);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config_path(), PathBuf::from("/etc/i2rt.yaml"));
        assert!(!cli.debug_events);
    }

    #[test]
    fn test_example_config_default_path() {
        let cli = Cli::parse_from(["icinga2rt", "example-config"]);
        assert_eq!(
            cli.command,
            Commands::ExampleConfig {
                path: PathBuf::from(EXAMPLE_CONFIG_FILE)
            }
        );
    }

    #[test]
    fn test_maintenance_commands() {
        for (arg, expected) in [
            ("dump-cache", Commands::DumpCache),
            ("stale-cache", Commands::StaleCache),
            ("clean-cache", Commands::CleanCache),
        ] {
            let cli = Cli::parse_from(["icinga2rt", arg, "--debug-events"]);
            assert_eq!(cli.command, expected);
            assert!(cli.debug_events);
        }
    }
}
