use async_trait::async_trait;
use ethers::{
    signers::{LocalWallet, Signer},
    types::Address,
};
use tracing::{event, Level};

use crate::{
    config::{ConfigError, KeyStore},
    network::NetworkIdentity,
};

/// Index of the local account used as deployer.
pub const LOCAL_ACCOUNT_INDEX: usize = 0;

#[derive(thiserror::Error, Debug)]
pub enum AccountError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    #[error("Invalid private key in wallets.from_key: {0}")]
    InvalidPrivateKey(String),
    #[error("No local account available on `{network}`: {reason}")]
    Environment { network: String, reason: String },
}

/// A signer able to send transactions on the active network.
#[derive(Debug, Clone)]
pub enum AccountHandle {
    /// Unlocked, pre-funded account of a local node.
    Local { index: usize, address: Address },
    /// Account imported from a private key.
    Imported(LocalWallet),
}

impl AccountHandle {
    pub fn address(&self) -> Address {
        match self {
            AccountHandle::Local { address, .. } => *address,
            AccountHandle::Imported(wallet) => wallet.address(),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, AccountHandle::Local { .. })
    }
}

/// Accounts the connected node holds unlocked.
#[async_trait]
pub trait AccountPool: Send + Sync {
    async fn local_accounts(&self) -> Result<Vec<Address>, String>;
}

pub async fn get_account<K, P>(
    network: &NetworkIdentity,
    keys: &K,
    pool: &P,
) -> Result<AccountHandle, AccountError>
where
    K: KeyStore + ?Sized,
    P: AccountPool + ?Sized,
{
    if network.is_local() {
        let accounts = pool
            .local_accounts()
            .await
            .map_err(|reason| AccountError::Environment {
                network: network.name().to_string(),
                reason,
            })?;

        let address = accounts
            .get(LOCAL_ACCOUNT_INDEX)
            .copied()
            .ok_or_else(|| AccountError::Environment {
                network: network.name().to_string(),
                reason: "node returned no accounts".to_string(),
            })?;

        event!(Level::DEBUG, "Using local account {:?} on {}", address, network);

        return Ok(AccountHandle::Local {
            index: LOCAL_ACCOUNT_INDEX,
            address,
        });
    }

    let key = keys.from_key().ok_or_else(|| ConfigError::MissingPrivateKey {
        network: network.name().to_string(),
    })?;

    let wallet = key
        .trim()
        .parse::<LocalWallet>()
        .map_err(|err| AccountError::InvalidPrivateKey(err.to_string()))?;

    event!(Level::DEBUG, "Imported account {:?} on {}", wallet.address(), network);

    Ok(AccountHandle::Imported(wallet))
}
