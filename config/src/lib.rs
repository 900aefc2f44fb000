//! `~/.weeslack/config.toml` loading.
//!
//! ```toml
//! [app]
//! log_filter = "weeslack=debug"
//!
//! [network]
//! timeout_secs = 30
//! max_retries = 5
//!
//! [network.proxy]
//! type = "socks5"
//! address = "127.0.0.1"
//! port = 1080
//!
//! [workspaces.acme]
//! api_token = "${ACME_SLACK_TOKEN}"
//! api_cookies = "d=..."
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::{env, fs};

use serde::Deserialize;
use thiserror::Error;

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "WEESLACK_CONFIG";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_RETRIES: u32 = 5;

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

const fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

#[derive(Debug, Default, Deserialize)]
pub struct WeeslackConfig {
    pub app: Option<AppConfig>,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub workspaces: BTreeMap<String, WorkspaceConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub log_filter: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retries after a transport failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    pub proxy: Option<ProxySettings>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            proxy: None,
        }
    }
}

#[derive(Default, Deserialize)]
pub struct ProxySettings {
    #[serde(rename = "type")]
    pub proxy_type: String,
    pub address: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl std::fmt::Debug for ProxySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxySettings")
            .field("proxy_type", &self.proxy_type)
            .field("address", &self.address)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &mask(self.password.as_ref()))
            .finish()
    }
}

#[derive(Default, Deserialize)]
pub struct WorkspaceConfig {
    pub api_token: String,
    pub api_cookies: Option<String>,
    /// Overrides `[network] timeout_secs` for this workspace.
    pub timeout_secs: Option<u64>,
}

// Manual Debug impl to keep tokens out of logs.
impl std::fmt::Debug for WorkspaceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceConfig")
            .field("api_token", &"[REDACTED]")
            .field("api_cookies", &mask(self.api_cookies.as_ref()))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn mask(opt: Option<&String>) -> &'static str {
    if opt.is_some() { "[REDACTED]" } else { "None" }
}

/// Replace `${VAR}` with the variable's value; unset variables become empty.
///
/// An unclosed `${` is kept literally.
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let var = &after[..end];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

impl WeeslackConfig {
    /// Load from [`config_path`]. A missing file yields `Ok(None)`.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).map_err(|err| {
            tracing::warn!("Failed to read config at {:?}: {}", path, err);
            ConfigError::Read {
                path: path.to_path_buf(),
                source: err,
            }
        })?;

        Self::parse(&content)
            .map(Some)
            .map_err(|err| {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                }
            })
    }

    /// Parse TOML text and expand `${VAR}` references in credentials.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        let mut config: Self = toml::from_str(content)?;
        config.expand_env();
        Ok(config)
    }

    fn expand_env(&mut self) {
        for workspace in self.workspaces.values_mut() {
            workspace.api_token = expand_env_vars(&workspace.api_token);
            if let Some(cookies) = &mut workspace.api_cookies {
                *cookies = expand_env_vars(cookies);
            }
        }
        if let Some(proxy) = &mut self.network.proxy {
            proxy.address = expand_env_vars(&proxy.address);
            if let Some(username) = &mut proxy.username {
                *username = expand_env_vars(username);
            }
            if let Some(password) = &mut proxy.password {
                *password = expand_env_vars(password);
            }
        }
    }

    #[must_use]
    pub fn workspace(&self, name: &str) -> Option<&WorkspaceConfig> {
        self.workspaces.get(name)
    }

    /// Request timeout for `workspace`, falling back to the network default.
    #[must_use]
    pub fn timeout_secs(&self, workspace: &WorkspaceConfig) -> u64 {
        workspace.timeout_secs.unwrap_or(self.network.timeout_secs)
    }

    #[must_use]
    pub fn log_filter(&self) -> Option<&str> {
        self.app.as_ref()?.log_filter.as_deref()
    }
}

/// `$WEESLACK_CONFIG` if set, else `~/.weeslack/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".weeslack").join("config.toml"))
}
