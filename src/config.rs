use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Port handed to custom handlers by the Azure Functions host.
pub const PORT_ENV: &str = "FUNCTIONS_CUSTOMHANDLER_PORT";

/// Top-level configuration for the photo-metadata function.
///
/// # Loading
///
/// ```rust,no_run
/// use photo_metadata::config::Config;
///
/// // From a JSON file
/// let mut config = Config::load(Some("config.json".as_ref())).unwrap();
///
/// // Let the functions host pick the port
/// config.apply_env();
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listener and route of the HTTP trigger.
    pub server: ServerConfig,
    /// Outbound image download settings.
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Path the function is mounted on.
    pub route: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Upper bound on the whole download, connect through last body byte.
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7071,
            route: "/api/GetPhotoMetadata".to_string(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: concat!("photo-metadata/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ServerConfig {
    /// Route with a guaranteed leading `/`.
    pub fn route_path(&self) -> String {
        let route = self.route.trim();
        if route.starts_with('/') {
            route.to_string()
        } else {
            format!("/{route}")
        }
    }
}

impl Config {
    /// Resolve the config file path - same directory as the executable.
    pub fn config_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("Failed to get executable path")?;
        let exe_dir = exe_path
            .parent()
            .context("Failed to get executable directory")?;
        Ok(exe_dir.join("config.json"))
    }

    /// Load config from the given path, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            log::warn!(
                "Config file not found at {}. Using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save config to the given path, or to the default location.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents).context("Failed to write config file")?;
        log::info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Apply [`PORT_ENV`] from the process environment.
    pub fn apply_env(&mut self) {
        let port = std::env::var(PORT_ENV).ok();
        self.apply_port_override(port.as_deref());
    }

    /// Override `server.port` when `value` parses as a port number.
    pub fn apply_port_override(&mut self, value: Option<&str>) {
        let Some(raw) = value else { return };
        match raw.trim().parse::<u16>() {
            Ok(port) => self.server.port = port,
            Err(_) => log::warn!("Ignoring {PORT_ENV}={raw:?}: not a port number"),
        }
    }
}
