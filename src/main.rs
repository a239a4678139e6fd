//! precache CLI application
//!
//! Primes a local caching server with Apple software updates, apps,
//! installers and device firmware.

use std::process;

use tracing::info;
use tracing_subscriber::{filter::Directive, fmt, EnvFilter};

use precache::cli::{handle_cache, handle_config, handle_list, Cli, Commands};
use precache::config::AppConfig;
use precache::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(&cli).await;

    info!("precache v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Cache(args) => {
            info!("Executing cache command");
            handle_cache(&cli.global, args).await
        }
        Commands::List(args) => {
            info!("Executing list command");
            handle_list(&cli.global, args).await
        }
        Commands::Config(args) => {
            info!("Executing config command");
            handle_config(&cli.global, args).await
        }
    }
}

/// Initialize logging from the verbosity flags, falling back to the
/// configured level when no flag was given
async fn init_logging(cli: &Cli) {
    let level = if cli.global.has_verbosity_flag() {
        cli.log_level().to_string()
    } else {
        match AppConfig::load(cli.global.config.clone()).await {
            Ok(config) => config.logging.level,
            Err(_) => cli.log_level().to_string(),
        }
    };

    let mut filter = EnvFilter::from_default_env();
    match format!("precache={}", level.to_lowercase()).parse::<Directive>() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(e) => eprintln!("Ignoring invalid log level {:?}: {}", level, e),
    }

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
