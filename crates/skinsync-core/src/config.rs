use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::http::{IpResolve, Timeout};

/// Transfer timeouts and address family (optional `[http]` section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Abort when the transfer is slower than this many bytes/s ...
    pub low_speed_limit: u32,
    /// ... for this many seconds.
    pub low_speed_time_secs: u64,
    /// Address family used for name resolution.
    #[serde(default)]
    pub ip_resolve: IpResolve,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 8000,
            low_speed_limit: 500,
            low_speed_time_secs: 10,
            ip_resolve: IpResolve::Whatever,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Timeout {
        Timeout {
            connect: Duration::from_millis(self.connect_timeout_ms),
            low_speed_limit: self.low_speed_limit,
            low_speed_time: Duration::from_secs(self.low_speed_time_secs),
        }
    }
}

/// Global configuration loaded from `~/.config/skinsync/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Download skins referenced by the game but missing locally.
    pub download_skins: bool,
    /// Use the community skin database instead of the main one.
    pub download_community_skins: bool,
    /// Base URL for skin downloads; the escaped name and `.png` are appended.
    pub skin_download_url: String,
    /// Base URL for community skin downloads.
    pub skin_community_download_url: String,
    /// Prefix tried before the bare skin name (`<prefix>_<name>`). Empty = none.
    #[serde(default)]
    pub skin_prefix: String,
    /// Only expose the skins shipped with the vanilla game.
    #[serde(default)]
    pub vanilla_skins_only: bool,
    /// Verbose libcurl output and request logging regardless of per-request verbosity.
    #[serde(default)]
    pub debug_curl: bool,
    /// Extra read-only directories holding `skins/`, scanned after the save directory.
    #[serde(default)]
    pub data_dirs: Vec<PathBuf>,
    #[serde(default)]
    pub http: HttpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download_skins: true,
            download_community_skins: false,
            skin_download_url: "https://skins.ddnet.org/skin/".to_string(),
            skin_community_download_url: "https://skins.ddnet.org/skin/community/".to_string(),
            skin_prefix: String::new(),
            vanilla_skins_only: false,
            debug_curl: false,
            data_dirs: Vec::new(),
            http: HttpConfig::default(),
        }
    }
}

impl Config {
    /// Base URL skin downloads are built from, per `download_community_skins`.
    pub fn skin_base_url(&self) -> &str {
        if self.download_community_skins {
            &self.skin_community_download_url
        } else {
            &self.skin_download_url
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("skinsync")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<Config> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = Config::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data =
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let cfg: Config =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}
