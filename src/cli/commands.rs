//! Command handlers for precache CLI
//!
//! This module implements the command handlers that connect CLI arguments,
//! the configuration file and the core engine.

use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::app::{
    host_model, locate_server, AggregatorConfig, Asset, AssetAggregator, CacheDriver,
    CacheServer, PrecacheClient, RunSummary,
};
use crate::cli::{CacheArgs, ConfigAction, ConfigArgs, GlobalArgs, ListArgs};
use crate::config::AppConfig;
use crate::constants::groups;
use crate::errors::{AppError, Result};

/// Spinner shown while feeds are read, hidden in quiet mode
fn feed_spinner(message: &str, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        spinner.set_style(style.tick_strings(&["◐", "◓", "◑", "◒"]));
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

async fn aggregator_config(
    config: &AppConfig,
    server: CacheServer,
) -> Result<AggregatorConfig> {
    let host_model = host_model().await;
    debug!("Host model: {:?}", host_model);

    Ok(AggregatorConfig {
        server,
        host_model,
        feeds: config.feeds.to_feed_locations()?,
        excludes: config.catalog.excludes.clone(),
        min_post_date: config.catalog.min_post_date,
    })
}

/// Handle the cache command
///
/// Resolves criteria (command line first, then configuration), finds the
/// caching server, collects and selects assets and primes the server with
/// them.
pub async fn handle_cache(global: &GlobalArgs, args: CacheArgs) -> Result<()> {
    let start_time = Instant::now();
    let config = AppConfig::load(global.config.clone()).await?;

    let mut criteria = args.criteria();
    criteria.merge_defaults(&config.cache.to_criteria());
    criteria.ensure_not_empty()?;
    debug!("Selection criteria: {:?}", criteria);

    let server =
        locate_server(&config.server.to_locator_config(global.cache_server.clone())).await?;
    info!("Using caching server {}", server);

    let client = PrecacheClient::with_config(config.client.to_runtime_config())?;
    let aggregator = AssetAggregator::new(&client, aggregator_config(&config, server).await?);

    let spinner = feed_spinner(
        "Building and processing items to cache can take a few minutes. Please be patient.",
        global.quiet,
    );

    let collected = aggregator.collect(criteria.plan()).await;
    let mut collection = match collected {
        Ok(collection) => collection,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e.into());
        }
    };

    let (firmware_models, rejected) =
        criteria.resolve_firmware_models(collection.firmware_capable());
    for error in rejected {
        spinner.suspend(|| println!("{}", error));
    }
    aggregator
        .add_firmware(&mut collection, &firmware_models)
        .await;
    spinner.finish_and_clear();

    let selected = criteria.select(collection.into_assets());
    info!(
        "Selected {} assets in {:?}",
        selected.len(),
        start_time.elapsed()
    );

    let driver_config = config
        .download
        .to_driver_config(args.destination.clone(), args.dry_run);
    let driver = CacheDriver::new(&client, driver_config);
    let summary = driver.run(&selected, |line| println!("{}", line)).await;

    if !global.quiet {
        print_summary(&summary, args.dry_run, start_time.elapsed());
    }

    if summary.failed > 0 {
        warn!("{} downloads failed", summary.failed);
    }
    Ok(())
}

fn print_summary(summary: &RunSummary, dry_run: bool, elapsed: Duration) {
    println!();
    if dry_run {
        println!("Dry run, nothing was downloaded.");
    }
    println!(
        "{} already cached, {} cached, {} re-downloaded, {} skipped, {} failed ({:.1}s)",
        summary.already_cached,
        summary.fetched,
        summary.refetched,
        summary.skipped,
        summary.failed,
        elapsed.as_secs_f64()
    );
}

/// Push `line` unless already present
fn push_distinct(lines: &mut Vec<String>, line: String) {
    if !lines.contains(&line) {
        lines.push(line);
    }
}

/// Listing lines for apps and software updates, in collection order
pub fn listing_lines(assets: &[Asset]) -> (Vec<String>, Vec<String>) {
    let mut apps = Vec::new();
    let mut updates = Vec::new();

    for asset in assets {
        if asset.is_software_update() {
            let mut line = format!("{}: {}", asset.product_id_str(), asset.title_str());
            if let Some(version) = &asset.version {
                line = format!("{} {}", line, version);
            }
            push_distinct(&mut updates, line);
        } else if asset.group == groups::APP || asset.group == groups::INSTALLER {
            push_distinct(
                &mut apps,
                format!(
                    "{}: {}",
                    asset.title_str(),
                    asset.version.as_deref().unwrap_or("unknown")
                ),
            );
        }
    }

    (apps, updates)
}

/// Handle the list command
///
/// Reads every feed and prints device models, apps and software updates
/// that can be cached.
pub async fn handle_list(global: &GlobalArgs, args: ListArgs) -> Result<()> {
    let config = AppConfig::load(global.config.clone()).await?;

    // Listing never requests anything, so a missing server is not fatal
    let locator = config.server.to_locator_config(global.cache_server.clone());
    let server = match locate_server(&locator).await {
        Ok(server) => server,
        Err(e) => {
            debug!("No caching server for listing: {}", e);
            CacheServer::new("localhost", 0)
        }
    };

    let client = PrecacheClient::with_config(config.client.to_runtime_config())?;
    let aggregator = AssetAggregator::new(&client, aggregator_config(&config, server).await?);

    let spinner = feed_spinner(
        "Building and processing this list output can take a few minutes. Please be patient.",
        global.quiet,
    );

    let mobile = aggregator.mobile_assets().await;
    let mobile = match mobile {
        Ok(mobile) => mobile,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e.into());
        }
    };

    let mut models: Vec<String> = mobile.iter().filter_map(|a| a.model.clone()).collect();
    models.sort();
    models.dedup();

    let mut devices = Vec::with_capacity(models.len());
    for model in &models {
        if args.describe {
            let description = match aggregator.describe_model(model).await {
                Ok(description) => description,
                Err(e) => {
                    debug!("{}", e);
                    "unknown".to_string()
                }
            };
            devices.push(format!("{}: {}", model, description));
        } else {
            devices.push(model.clone());
        }
    }

    let mut rest = aggregator.app_assets().await;
    match aggregator.software_update_assets().await {
        Ok(updates) => rest.extend(updates),
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e.into());
        }
    }
    spinner.finish_and_clear();

    let (apps, updates) = listing_lines(&rest);

    if args.describe {
        println!("\niOS, watchOS, tvOS devices (model: description):");
    } else {
        println!("\niOS, watchOS, tvOS devices:");
    }
    for line in &devices {
        println!("{}", line);
    }

    println!("\nApps (app: version):");
    for line in &apps {
        println!("{}", line);
    }

    println!("\nmacOS Software Updates (product id: description):");
    for line in &updates {
        println!("{}", line);
    }

    println!("\nNote for iOS/watchOS/tvOS: Please use the model number (example: iPad6,7) when caching those items.");
    println!("Note for apps/macOS installers: Please use the app/installer name without the version when caching those items.");
    println!("Note for macOS Software updates: You can use the Product ID or part/all of the description to cache those items.");

    Ok(())
}

/// Handle the config command
pub async fn handle_config(global: &GlobalArgs, args: ConfigArgs) -> Result<()> {
    match args.action {
        ConfigAction::Init { path, force } => {
            let (path, created) = AppConfig::initialize_first_run(path, force).await?;
            if created {
                println!("📁 Created default configuration file:");
                println!("   {}", path.display());
                println!("   You can customize settings by editing this file.");
            } else {
                println!(
                    "Configuration file already exists: {} (use --force to overwrite)",
                    path.display()
                );
            }
        }
        ConfigAction::Show => {
            let config = AppConfig::load(global.config.clone()).await?;
            let rendered = toml::to_string_pretty(&config)
                .map_err(|e| AppError::generic(format!("Failed to render config: {}", e)))?;
            println!("{}", rendered);
        }
        ConfigAction::Paths => {
            for path in AppConfig::search_paths() {
                let marker = if path.exists() { "found" } else { "missing" };
                println!("{} ({})", path.display(), marker);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(group: &str, title: &str, version: Option<&str>, id: Option<&str>) -> Asset {
        Asset {
            group: group.to_string(),
            product_title: Some(title.to_string()),
            version: version.map(str::to_string),
            product_id: id.map(str::to_string),
            urls: vec!["http://thor:1/a?source=x".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_listing_lines() {
        let assets = vec![
            asset("app", "Server", Some("5.3"), None),
            asset("installer", "Sierra", Some("10.12.6"), None),
            asset("app", "Server", Some("5.3"), None),
            asset("sucatalog", "macOS Sierra Update", Some("10.12.6"), Some("041-1")),
            asset("sucatalog", "Safari El Capitan", None, Some("041-2")),
            asset("iPad", "iOS 10.3.2", None, None),
        ];

        let (apps, updates) = listing_lines(&assets);
        assert_eq!(apps, vec!["Server: 5.3", "Sierra: 10.12.6"]);
        assert_eq!(
            updates,
            vec!["041-1: macOS Sierra Update 10.12.6", "041-2: Safari El Capitan"]
        );
    }

    #[tokio::test]
    async fn test_config_init_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("precache.toml");
        let args = ConfigArgs {
            action: ConfigAction::Init {
                path: Some(path.clone()),
                force: false,
            },
        };

        handle_config(&GlobalArgs::default(), args).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_cache_without_criteria_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("precache.toml");
        tokio::fs::write(&path, "").await.unwrap();

        let global = GlobalArgs {
            config: Some(path),
            cache_server: Some("http://thor:49672".to_string()),
            ..Default::default()
        };
        let result = handle_cache(&global, CacheArgs::default()).await;
        assert!(matches!(
            result,
            Err(AppError::Selection(crate::errors::SelectionError::NoCriteria))
        ));
    }
}
