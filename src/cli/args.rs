//! Command-line argument parsing for precache
//!
//! This module defines the CLI structure using clap derive macros: caching
//! selected assets, listing what can be cached, and managing the
//! configuration file.

use std::collections::BTreeSet;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::app::Criteria;

/// Groups accepted by `--groups`
pub const GROUP_CHOICES: &[&str] = &[
    "AppleTV",
    "iPad",
    "iPhone",
    "iPod",
    "Watch",
    "app",
    "installer",
    "sucatalog",
];

/// precache - prime a caching server with Apple updates
#[derive(Parser, Debug)]
#[command(
    name = "precache",
    version,
    about = "Prime a local caching server with Apple software updates, apps and firmware",
    long_about = "Discovers iOS, watchOS and tvOS updates, Mac apps and installers, macOS software updates \
and device firmware from Apple's update feeds, then requests the selected items through a caching \
server so clients find them already cached."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Caching server to use instead of discovering one
    #[arg(long = "cache-server", global = true, value_name = "http://cacheserver:port")]
    pub cache_server: Option<String>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Cache the selected assets through the caching server
    Cache(CacheArgs),

    /// List everything that can be cached
    List(ListArgs),

    /// Manage the configuration file
    Config(ConfigArgs),
}

/// Arguments for the cache command
#[derive(Args, Debug, Clone, Default)]
pub struct CacheArgs {
    /// Device models, for example iPad6,8
    #[arg(short, long = "model", value_name = "MODEL", num_args = 1..)]
    pub models: Vec<String>,

    /// Asset groups
    #[arg(
        short,
        long = "group",
        value_name = "GROUP",
        num_args = 1..,
        value_parser = clap::builder::PossibleValuesParser::new(GROUP_CHOICES)
    )]
    pub groups: Vec<String>,

    /// App or installer names
    #[arg(short, long = "app", value_name = "NAME", num_args = 1..)]
    pub apps: Vec<String>,

    /// macOS software update product ids or keywords
    #[arg(short = 'u', long = "update", value_name = "PRODUCT", num_args = 1..)]
    pub mac_updates: Vec<String>,

    /// Device models to download firmware (IPSW) for; a family name such as
    /// iPad selects every capable model of that family
    #[arg(short, long = "ipsw", value_name = "MODEL", num_args = 1..)]
    pub ipsw: Vec<String>,

    /// Directory to save firmware images to
    #[arg(short, long, value_name = "DIR")]
    pub destination: Option<PathBuf>,

    /// Show what would be cached without downloading
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

/// Arguments for the list command
#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Look up a human-readable description for every device model
    #[arg(long)]
    pub describe: bool,
}

/// Arguments for configuration management
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a configuration file with every default
    Init {
        /// Where to write it (user config directory by default)
        #[arg(value_name = "FILE")]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,

    /// Print the configuration search paths
    Paths,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level based on global arguments
    pub fn log_level(&self) -> tracing::Level {
        self.global.log_level()
    }
}

impl GlobalArgs {
    /// Logging level implied by the verbosity flags
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.very_verbose {
            tracing::Level::DEBUG
        } else if self.verbose {
            tracing::Level::INFO
        } else {
            tracing::Level::WARN
        }
    }

    /// Whether any verbosity flag was given
    pub fn has_verbosity_flag(&self) -> bool {
        self.quiet || self.verbose || self.very_verbose
    }
}

impl CacheArgs {
    /// Selection criteria given on the command line
    pub fn criteria(&self) -> Criteria {
        fn set(items: &[String]) -> BTreeSet<String> {
            items.iter().cloned().collect()
        }

        Criteria {
            models: set(&self.models),
            groups: set(&self.groups),
            apps: set(&self.apps),
            mac_updates: set(&self.mac_updates),
            firmware_models: set(&self.ipsw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_args_parsing() {
        let cli = Cli::try_parse_from([
            "precache",
            "--cache-server",
            "http://thor:49672",
            "cache",
            "-m",
            "iPad6,8",
            "iPhone9,1",
            "-g",
            "sucatalog",
            "-u",
            "Sierra",
            "-n",
        ])
        .unwrap();

        assert_eq!(cli.global.cache_server.as_deref(), Some("http://thor:49672"));
        let Commands::Cache(args) = cli.command else {
            panic!("expected cache command");
        };
        assert!(args.dry_run);

        let criteria = args.criteria();
        assert_eq!(criteria.models.len(), 2);
        assert!(criteria.groups.contains("sucatalog"));
        assert!(criteria.mac_updates.contains("Sierra"));
        assert!(criteria.firmware_models.is_empty());
    }

    #[test]
    fn test_unknown_group_rejected() {
        let result = Cli::try_parse_from(["precache", "cache", "--group", "Vision"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_init_parsing() {
        let cli = Cli::try_parse_from(["precache", "config", "init", "--force", "/tmp/p.toml"]).unwrap();
        let Commands::Config(ConfigArgs {
            action: ConfigAction::Init { path, force },
        }) = cli.command
        else {
            panic!("expected config init");
        };
        assert!(force);
        assert_eq!(path, Some(PathBuf::from("/tmp/p.toml")));
    }

    #[test]
    fn test_log_level() {
        let quiet = GlobalArgs {
            quiet: true,
            ..Default::default()
        };
        let verbose = GlobalArgs {
            verbose: true,
            ..Default::default()
        };

        assert_eq!(quiet.log_level(), tracing::Level::ERROR);
        assert_eq!(verbose.log_level(), tracing::Level::INFO);
        assert_eq!(GlobalArgs::default().log_level(), tracing::Level::WARN);
        assert!(!GlobalArgs::default().has_verbosity_flag());
    }
}
