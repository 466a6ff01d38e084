use std::{collections::HashMap, fs, io::ErrorKind, path::Path};

use ethers::types::Address;
use serde::{Deserialize, Serialize};
use tracing::{event, Level};

/// Deployed contract instances of the current session, grouped by contract name.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractRegistry {
    deployments: HashMap<String, Vec<Address>>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        ContractRegistry::default()
    }

    pub fn count(&self, name: &str) -> usize {
        self.deployments.get(name).map(Vec::len).unwrap_or(0)
    }

    /// Most recently recorded instance.
    pub fn latest(&self, name: &str) -> Option<Address> {
        self.deployments
            .get(name)
            .and_then(|addresses| addresses.last().copied())
    }

    pub fn record(&mut self, name: &str, address: Address) {
        event!(Level::DEBUG, "record {} at {:?}", name, address);
        self.deployments
            .entry(name.to_string())
            .or_default()
            .push(address);
    }

    /// A missing file is an empty registry.
    pub fn load(path: &Path) -> Result<Self, String> {
        match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).map_err(|err| {
                format!("Failed to parse registry {}: {}", path.display(), err)
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(ContractRegistry::new()),
            Err(err) => Err(format!("Failed to read registry {}: {}", path.display(), err)),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), String> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|err| err.to_string())?;
        }

        let content = serde_json::to_string_pretty(self).map_err(|err| err.to_string())?;
        fs::write(path, content)
            .map_err(|err| format!("Failed to write registry {}: {}", path.display(), err))
    }
}
