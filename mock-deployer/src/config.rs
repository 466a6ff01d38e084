use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

use regex::{Captures, Regex};
use serde::Deserialize;
use tracing::{event, Level};

use crate::network::NetworkIdentity;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Network `{0}` is not configured")]
    UnknownNetwork(String),
    #[error("Network `{0}` has no host")]
    MissingHost(String),
    #[error("No `wallets.from_key` configured, required on network `{network}`")]
    MissingPrivateKey { network: String },
}

/// Source of the deployer private key for live networks.
pub trait KeyStore: Send + Sync {
    fn from_key(&self) -> Option<String>;
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct WalletsConfig {
    #[serde(default)]
    pub from_key: Option<String>,
}

impl KeyStore for WalletsConfig {
    fn from_key(&self) -> Option<String> {
        self.from_key.clone()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct NetworkSettings {
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default)]
    pub launch: bool,

    #[serde(default)]
    pub persist: Option<bool>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct NetworksConfig {
    #[serde(default)]
    pub default: Option<String>,

    #[serde(flatten)]
    pub entries: HashMap<String, NetworkSettings>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub dotenv: Option<PathBuf>,

    #[serde(default)]
    pub wallets: WalletsConfig,

    #[serde(default)]
    pub networks: NetworksConfig,
}

/// Replaces `${VAR}` with the environment value. Unset variables stay verbatim.
pub fn expand_env_vars(raw: &str) -> String {
    let regex = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var pattern");

    regex
        .replace_all(raw, |captures: &Captures| match env::var(&captures[1]) {
            Ok(value) => value,
            Err(_) => captures[0].to_string(),
        })
        .into_owned()
}

/// Pulls the `dotenv:` entry out of the raw document so that the file can be
/// loaded before the rest of the config is expanded.
fn dotenv_entry(raw: &str) -> Option<String> {
    let value: serde_yaml::Value = serde_yaml::from_str(raw).ok()?;
    value.get("dotenv")?.as_str().map(str::to_string)
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(dotenv_path) = dotenv_entry(&raw) {
            let dotenv_path = path
                .parent()
                .map(|dir| dir.join(&dotenv_path))
                .unwrap_or_else(|| PathBuf::from(&dotenv_path));

            if let Err(err) = dotenv::from_path(&dotenv_path) {
                event!(
                    Level::WARN,
                    "Could not load dotenv file {}: {}",
                    dotenv_path.display(),
                    err
                );
            }
        }

        Config::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Config, ConfigError> {
        let expanded = expand_env_vars(raw);
        let mut config: Config = serde_yaml::from_str(&expanded)?;

        config.wallets.from_key = config
            .wallets
            .from_key
            .take()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty() && !key.contains("${"));

        if config.wallets.from_key.is_none() {
            event!(Level::DEBUG, "No wallets.from_key configured");
        }

        Ok(config)
    }

    pub fn network_settings(&self, network: &NetworkIdentity) -> Result<&NetworkSettings, ConfigError> {
        self.networks
            .entries
            .get(network.name())
            .ok_or_else(|| ConfigError::UnknownNetwork(network.name().to_string()))
    }

    pub fn host(&self, network: &NetworkIdentity) -> Result<String, ConfigError> {
        self.network_settings(network)?
            .host
            .clone()
            .ok_or_else(|| ConfigError::MissingHost(network.name().to_string()))
    }

    /// Live networks keep their deployments between runs, local ones never do.
    pub fn persists_deployments(&self, network: &NetworkIdentity) -> bool {
        if network.is_local() {
            return false;
        }

        self.network_settings(network)
            .ok()
            .and_then(|settings| settings.persist)
            .unwrap_or(true)
    }
}
