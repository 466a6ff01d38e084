use std::path::PathBuf;

use async_trait::async_trait;
use ethers::{
    types::{Address, I256, U256},
    utils::{parse_units, ConversionError},
};
use tokio::sync::Mutex;
use tracing::{event, Level};

use crate::{
    account::{get_account, AccountError, AccountHandle, AccountPool},
    config::KeyStore,
    network::NetworkIdentity,
    registry::ContractRegistry,
};

pub const MOCK_V3_AGGREGATOR: &str = "MockV3Aggregator";

pub const DECIMALS: u8 = 8;

pub const STARTING_PRICE: u64 = 200_000_000;

#[derive(thiserror::Error, Debug)]
pub enum DeployError {
    #[error("Could not resolve deployer account: {0}")]
    AccountResolution(#[from] AccountError),
    #[error("Mock deployment failed: {0}")]
    Deployment(String),
    #[error("Deployment registry error: {0}")]
    Registry(String),
}

/// Converts `amount` expressed in `unit` ("ether", "gwei", ...) to wei.
pub fn to_wei(amount: u64, unit: &str) -> Result<I256, ConversionError> {
    Ok(parse_units(amount, unit)?.into())
}

/// Constructor arguments of `MockV3Aggregator(uint8 decimals, int256 initialAnswer)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockAggregatorArgs {
    pub decimals: u8,
    pub initial_answer: I256,
}

impl Default for MockAggregatorArgs {
    fn default() -> Self {
        MockAggregatorArgs {
            decimals: DECIMALS,
            // 200000000 * 10^18 always fits in an int256.
            initial_answer: I256::from_raw(U256::from(STARTING_PRICE) * U256::exp10(18)),
        }
    }
}

#[async_trait]
pub trait ContractDeployer: Send + Sync {
    /// Sends the creation transaction from `sender` and waits for its receipt.
    async fn deploy_mock_aggregator(
        &self,
        sender: &AccountHandle,
        args: &MockAggregatorArgs,
    ) -> Result<Address, String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockDeployment {
    pub address: Address,

    /// `false` when an instance from an earlier call was reused.
    pub newly_deployed: bool,
}

/// Everything one deployment run needs: the active network, where the deployer
/// key comes from, the chain backend and the contracts deployed so far.
pub struct DeploySession<B: AccountPool + ContractDeployer> {
    network: NetworkIdentity,
    keys: Box<dyn KeyStore>,
    backend: B,
    registry: Mutex<ContractRegistry>,
    registry_path: Option<PathBuf>,
    signers: Mutex<Vec<Address>>,
}

impl<B: AccountPool + ContractDeployer> DeploySession<B> {
    pub fn new(network: NetworkIdentity, keys: impl KeyStore + 'static, backend: B) -> Self {
        DeploySession {
            network,
            keys: Box::new(keys),
            backend,
            registry: Mutex::new(ContractRegistry::new()),
            registry_path: None,
            signers: Mutex::new(Vec::new()),
        }
    }

    /// Loads earlier deployments from `path` and writes every new one back to it.
    pub fn with_persisted_registry(mut self, path: PathBuf) -> Result<Self, DeployError> {
        let registry = ContractRegistry::load(&path).map_err(DeployError::Registry)?;

        event!(
            Level::INFO,
            "Loaded {} {} deployment(s) from {}",
            registry.count(MOCK_V3_AGGREGATOR),
            MOCK_V3_AGGREGATOR,
            path.display()
        );

        self.registry = Mutex::new(registry);
        self.registry_path = Some(path);
        Ok(self)
    }

    pub fn network(&self) -> &NetworkIdentity {
        &self.network
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn registry(&self) -> ContractRegistry {
        self.registry.lock().await.clone()
    }

    /// Addresses imported from private keys during this session.
    pub async fn signers(&self) -> Vec<Address> {
        self.signers.lock().await.clone()
    }

    pub async fn get_account(&self) -> Result<AccountHandle, AccountError> {
        let account = get_account(&self.network, self.keys.as_ref(), &self.backend).await?;

        if let AccountHandle::Imported(_) = &account {
            let mut signers = self.signers.lock().await;
            if !signers.contains(&account.address()) {
                signers.push(account.address());
            }
        }

        Ok(account)
    }

    /// Deploys a `MockV3Aggregator` unless this session already knows one.
    pub async fn deploy_mocks(&self) -> Result<MockDeployment, DeployError> {
        println!("The active network is {}", self.network);
        println!("Deploying Mocks...");

        // Held until the new instance is recorded.
        let mut registry = self.registry.lock().await;

        let deployment = match registry.latest(MOCK_V3_AGGREGATOR) {
            Some(address) => {
                event!(
                    Level::INFO,
                    "{} already deployed at {:?}, skipping",
                    MOCK_V3_AGGREGATOR,
                    address
                );

                MockDeployment {
                    address,
                    newly_deployed: false,
                }
            }
            None => {
                let account = self.get_account().await?;
                let args = MockAggregatorArgs::default();

                event!(
                    Level::INFO,
                    "Deploying {} from {:?} with decimals {} and initial answer {}",
                    MOCK_V3_AGGREGATOR,
                    account.address(),
                    args.decimals,
                    args.initial_answer
                );

                let address = self
                    .backend
                    .deploy_mock_aggregator(&account, &args)
                    .await
                    .map_err(DeployError::Deployment)?;

                registry.record(MOCK_V3_AGGREGATOR, address);

                if let Some(path) = &self.registry_path {
                    registry.save(path).map_err(DeployError::Registry)?;
                }

                MockDeployment {
                    address,
                    newly_deployed: true,
                }
            }
        };

        println!("Mocks Deployed");

        Ok(deployment)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    };

    use tracing_test::traced_test;

    use super::*;
    use crate::{
        account::tests::{CountingKeyStore, TEST_KEY, TEST_KEY_ADDRESS},
        config::WalletsConfig,
    };

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct DeployCall {
        sender: Address,
        local_sender: bool,
        args: MockAggregatorArgs,
    }

    #[derive(Default)]
    struct MockChain {
        accounts: Vec<Address>,
        calls: std::sync::Mutex<Vec<DeployCall>>,
        next_address: AtomicU64,
        fail_with: Option<String>,
    }

    impl MockChain {
        fn with_accounts(count: u64) -> Self {
            MockChain {
                accounts: (100..100 + count).map(Address::from_low_u64_be).collect(),
                next_address: AtomicU64::new(1),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<DeployCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AccountPool for MockChain {
        async fn local_accounts(&self) -> Result<Vec<Address>, String> {
            Ok(self.accounts.clone())
        }
    }

    #[async_trait]
    impl ContractDeployer for MockChain {
        async fn deploy_mock_aggregator(
            &self,
            sender: &AccountHandle,
            args: &MockAggregatorArgs,
        ) -> Result<Address, String> {
            if let Some(reason) = &self.fail_with {
                return Err(reason.clone());
            }

            // Widen the window between the registry check and the record.
            tokio::task::yield_now().await;

            self.calls.lock().unwrap().push(DeployCall {
                sender: sender.address(),
                local_sender: sender.is_local(),
                args: *args,
            });

            Ok(Address::from_low_u64_be(
                self.next_address.fetch_add(1, Ordering::SeqCst),
            ))
        }
    }

    #[test]
    fn test_default_args() {
        let args = MockAggregatorArgs::default();

        assert_eq!(args.decimals, 8);
        assert_eq!(
            args.initial_answer.into_raw(),
            U256::from_dec_str("200000000000000000000000000").unwrap()
        );
        assert_eq!(args.initial_answer, to_wei(STARTING_PRICE, "ether").unwrap());
    }

    #[test]
    fn test_to_wei() {
        assert_eq!(to_wei(1, "ether").unwrap(), I256::from_raw(U256::exp10(18)));
        assert_eq!(to_wei(3, "gwei").unwrap(), I256::from_raw(U256::from(3_000_000_000u64)));
        assert!(to_wei(1, "not-a-unit").is_err());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_deploys_on_development() {
        let session = DeploySession::new(
            NetworkIdentity::new("development"),
            WalletsConfig::default(),
            MockChain::with_accounts(3),
        );

        let deployment = session.deploy_mocks().await.unwrap();

        assert!(deployment.newly_deployed);
        assert_eq!(deployment.address, Address::from_low_u64_be(1));
        assert_eq!(
            session.backend().calls(),
            vec![DeployCall {
                sender: Address::from_low_u64_be(100),
                local_sender: true,
                args: MockAggregatorArgs::default(),
            }]
        );
        assert_eq!(session.registry().await.count(MOCK_V3_AGGREGATOR), 1);
        assert!(session.signers().await.is_empty());
        assert!(logs_contain("Deploying MockV3Aggregator"));
    }

    #[tokio::test]
    async fn test_second_call_is_noop() {
        let session = DeploySession::new(
            NetworkIdentity::new("ganache-local"),
            WalletsConfig::default(),
            MockChain::with_accounts(1),
        );

        let first = session.deploy_mocks().await.unwrap();
        let second = session.deploy_mocks().await.unwrap();

        assert!(first.newly_deployed);
        assert!(!second.newly_deployed);
        assert_eq!(first.address, second.address);
        assert_eq!(session.backend().calls().len(), 1);
        assert_eq!(session.registry().await.count(MOCK_V3_AGGREGATOR), 1);
    }

    #[tokio::test]
    async fn test_existing_instance_skips_deployment() {
        let existing = Address::from_low_u64_be(42);
        let dir = std::env::temp_dir().join(format!("mock-deployer-existing-{}", std::process::id()));
        let path = dir.join("rinkeby.json");
        let mut registry = ContractRegistry::new();
        registry.record(MOCK_V3_AGGREGATOR, existing);
        registry.save(&path).unwrap();

        let keys = CountingKeyStore::new(None);
        let session = DeploySession::new(
            NetworkIdentity::new("rinkeby"),
            keys,
            MockChain::with_accounts(0),
        )
        .with_persisted_registry(path)
        .unwrap();

        let deployment = session.deploy_mocks().await.unwrap();

        assert_eq!(
            deployment,
            MockDeployment {
                address: existing,
                newly_deployed: false,
            }
        );
        assert!(session.backend().calls().is_empty());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_live_network_uses_imported_key() {
        let dir = std::env::temp_dir().join(format!("mock-deployer-live-{}", std::process::id()));
        let path = dir.join("rinkeby.json");
        let _ = std::fs::remove_dir_all(&dir);

        let session = DeploySession::new(
            NetworkIdentity::new("rinkeby"),
            WalletsConfig {
                from_key: Some(TEST_KEY.to_string()),
            },
            MockChain::with_accounts(0),
        )
        .with_persisted_registry(path.clone())
        .unwrap();

        let deployment = session.deploy_mocks().await.unwrap();
        let expected_sender = TEST_KEY_ADDRESS.parse::<Address>().unwrap();

        let calls = session.backend().calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].sender, expected_sender);
        assert!(!calls[0].local_sender);
        assert_eq!(calls[0].args, MockAggregatorArgs::default());
        assert_eq!(session.signers().await, vec![expected_sender]);

        let persisted = ContractRegistry::load(&path).unwrap();
        assert_eq!(persisted.latest(MOCK_V3_AGGREGATOR), Some(deployment.address));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_deployment() {
        let session = DeploySession::new(
            NetworkIdentity::new("rinkeby"),
            WalletsConfig::default(),
            MockChain::with_accounts(2),
        );

        let err = session.deploy_mocks().await.unwrap_err();

        assert!(matches!(
            err,
            DeployError::AccountResolution(AccountError::Configuration(_))
        ));
        assert!(session.backend().calls().is_empty());
        assert_eq!(session.registry().await.count(MOCK_V3_AGGREGATOR), 0);
    }

    #[tokio::test]
    async fn test_failed_transaction() {
        let chain = MockChain {
            fail_with: Some("execution reverted".to_string()),
            ..MockChain::with_accounts(1)
        };
        let session = DeploySession::new(
            NetworkIdentity::new("development"),
            WalletsConfig::default(),
            chain,
        );

        let err = session.deploy_mocks().await.unwrap_err();

        assert!(matches!(err, DeployError::Deployment(ref reason) if reason == "execution reverted"));
        assert_eq!(session.registry().await.count(MOCK_V3_AGGREGATOR), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_calls_deploy_once() {
        let session = Arc::new(DeploySession::new(
            NetworkIdentity::new("development"),
            WalletsConfig::default(),
            MockChain::with_accounts(1),
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let session = Arc::clone(&session);
                tokio::spawn(async move { session.deploy_mocks().await.unwrap() })
            })
            .collect();

        let mut newly_deployed = 0;
        for handle in handles {
            let deployment = handle.await.unwrap();
            assert_eq!(deployment.address, Address::from_low_u64_be(1));
            if deployment.newly_deployed {
                newly_deployed += 1;
            }
        }

        assert_eq!(newly_deployed, 1);
        assert_eq!(session.backend().calls().len(), 1);
    }
}
