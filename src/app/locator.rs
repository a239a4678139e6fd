//! Caching server discovery and host facts
//!
//! The caching server is taken from, in order: an explicit URL, the port in
//! a local caching service configuration plist (`LastPort`, then `Port`), or
//! the first private address reported by the platform locator utility.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, info};

use crate::app::proxy::CacheServer;
use crate::constants::locator;
use crate::errors::{ConfigError, ConfigResult};

/// Where to look for a caching server
#[derive(Debug, Clone)]
pub struct LocatorConfig {
    /// Explicit `http://host:port`, wins when set
    pub server_url: Option<String>,
    /// Local caching service plists, first existing one is read
    pub config_plists: Vec<PathBuf>,
    /// Locator utility whose stderr lists reachable servers
    pub locator_command: PathBuf,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            config_plists: vec![
                PathBuf::from(locator::TETHERATOR_PLIST),
                PathBuf::from(locator::CACHE_SERVER_PLIST),
            ],
            locator_command: PathBuf::from(locator::LOCATOR_COMMAND),
        }
    }
}

/// Port recorded in a caching service plist
pub fn port_from_plist(path: &Path) -> Option<u16> {
    let value = plist::Value::from_file(path).ok()?;
    let dict = value.as_dictionary()?;

    ["LastPort", "Port"]
        .iter()
        .filter_map(|key| dict.get(key))
        .find_map(|port| port.as_unsigned_integer())
        .and_then(|port| u16::try_from(port).ok())
        .filter(|port| *port != 0)
}

/// Candidate server addresses in locator output, in order and without duplicates
pub fn parse_locator_output(output: &str) -> Vec<String> {
    let mut addresses: Vec<String> = Vec::new();
    for token in output.split_whitespace() {
        if !locator::LOCAL_ADDRESS_PREFIXES
            .iter()
            .any(|prefix| token.starts_with(prefix))
        {
            continue;
        }
        let address = token.replace(',', "");
        if !addresses.contains(&address) {
            addresses.push(address);
        }
    }
    addresses
}

async fn run_locator(command: &Path) -> Option<String> {
    match Command::new(command).output().await {
        Ok(output) => Some(String::from_utf8_lossy(&output.stderr).into_owned()),
        Err(e) => {
            debug!("Could not run {}: {}", command.display(), e);
            None
        }
    }
}

/// Find the caching server to route requests through
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` for a malformed explicit URL and
/// `ConfigError::ConfigurationMissing` when nothing could be found
pub async fn locate_server(config: &LocatorConfig) -> ConfigResult<CacheServer> {
    if let Some(url) = &config.server_url {
        return CacheServer::parse(url);
    }

    if let Some(plist) = config.config_plists.iter().find(|p| p.exists()) {
        if let Some(port) = port_from_plist(plist) {
            info!("Using local caching service from {}", plist.display());
            return Ok(CacheServer::new("localhost", port));
        }
        debug!("No port in {}", plist.display());
    }

    if let Some(output) = run_locator(&config.locator_command).await {
        for address in parse_locator_output(&output) {
            match CacheServer::parse(&format!("http://{}", address)) {
                Ok(server) => {
                    info!("Using caching server {} from locator", server);
                    return Ok(server);
                }
                Err(e) => debug!("Ignoring locator address {}: {}", address, e),
            }
        }
    }

    Err(ConfigError::ConfigurationMissing {
        field: "server.url".to_string(),
    })
}

/// Hardware model of this Mac, from `sysctl hw.model`
pub async fn host_model() -> Option<String> {
    let output = Command::new("/usr/sbin/sysctl")
        .arg("hw.model")
        .output()
        .await
        .ok()?;
    parse_sysctl_model(&String::from_utf8_lossy(&output.stdout))
}

fn parse_sysctl_model(output: &str) -> Option<String> {
    output.split_whitespace().nth(1).map(str::to_string)
}
