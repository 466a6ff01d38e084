pub mod account;
pub mod config;
pub mod mocks;
pub mod network;
pub mod registry;

pub use account::{get_account, AccountError, AccountHandle, AccountPool};
pub use config::{Config, ConfigError, KeyStore, NetworkSettings, WalletsConfig};
pub use mocks::{
    to_wei, ContractDeployer, DeployError, DeploySession, MockAggregatorArgs, MockDeployment,
    DECIMALS, MOCK_V3_AGGREGATOR, STARTING_PRICE,
};
pub use network::{NetworkIdentity, LOCAL_BLOCKCHAIN_ENVIRONMENTS};
pub use registry::ContractRegistry;
