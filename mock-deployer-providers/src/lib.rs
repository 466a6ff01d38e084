pub mod artifact {
    use std::{fs, path::Path};

    use ethers::utils::hex;
    use ethers_core::{abi::Abi, types::Bytes};

    /// ABI and creation bytecode of a compiled contract.
    #[derive(Clone, Debug, PartialEq)]
    pub struct ContractArtifact {
        pub name: Option<String>,
        pub abi: Abi,
        pub bytecode: Bytes,
    }

    impl ContractArtifact {
        pub fn from_file(path: impl AsRef<Path>) -> Result<Self, String> {
            let path = path.as_ref();
            let content = fs::read_to_string(path)
                .map_err(|err| format!("Failed to read artifact {}: {}", path.display(), err))?;

            Self::from_json_str(&content)
                .map_err(|err| format!("Invalid artifact {}: {}", path.display(), err))
        }

        /// Accepts brownie build output (`"bytecode": "6080..."`) as well as
        /// forge output (`"bytecode": { "object": "0x6080..." }`).
        pub fn from_json_str(content: &str) -> Result<Self, String> {
            let json: serde_json::Value =
                serde_json::from_str(content).map_err(|err| err.to_string())?;

            let abi: Abi =
                serde_json::from_value(json["abi"].clone()).map_err(|err| err.to_string())?;

            let bytecode_hex = match &json["bytecode"] {
                serde_json::Value::String(hex) => hex.as_str(),
                serde_json::Value::Object(object) => object
                    .get("object")
                    .and_then(|object| object.as_str())
                    .ok_or("Missing bytecode.object")?,
                _ => return Err("Missing bytecode".to_string()),
            };

            let bytecode = hex::decode(bytecode_hex.trim_start_matches("0x"))
                .map_err(|err| format!("Bytecode is not valid hex: {}", err))?;

            if bytecode.is_empty() {
                return Err("Empty bytecode, contract is abstract or an interface".to_string());
            }

            Ok(ContractArtifact {
                name: json["contractName"].as_str().map(str::to_string),
                abi,
                bytecode: bytecode.into(),
            })
        }
    }
}

pub mod providers {
    use std::sync::Arc;

    use async_trait::async_trait;
    use ethers::{
        contract::ContractFactory,
        middleware::SignerMiddleware,
        signers::Signer,
        types::Address,
    };
    use ethers_providers::{Http, Middleware, Provider};
    use mock_deployer::{AccountHandle, AccountPool, ContractDeployer, MockAggregatorArgs};
    use tracing::{event, Level};

    use crate::artifact::ContractArtifact;

    #[derive(Clone, Debug)]
    pub struct EthersBackend {
        provider: Provider<Http>,
        artifact: ContractArtifact,
        chain_id: u64,
    }

    impl EthersBackend {
        pub async fn connect(url: &str, artifact: ContractArtifact) -> Result<Self, String> {
            let provider = Provider::<Http>::try_from(url).map_err(|err| err.to_string())?;

            let chain_id = provider
                .get_chainid()
                .await
                .map_err(|err| format!("Failed to reach {}: {}", url, err))?
                .as_u64();

            event!(Level::INFO, "Connected to {} (chain id {})", url, chain_id);

            Ok(EthersBackend {
                provider,
                artifact,
                chain_id,
            })
        }

        pub fn chain_id(&self) -> u64 {
            self.chain_id
        }
    }

    async fn deploy_with<M: Middleware + 'static>(
        client: Arc<M>,
        artifact: &ContractArtifact,
        args: &MockAggregatorArgs,
    ) -> Result<Address, String> {
        let factory = ContractFactory::new(artifact.abi.clone(), artifact.bytecode.clone(), client);

        let contract = factory
            .deploy((args.decimals, args.initial_answer))
            .map_err(|err| err.to_string())?
            .send()
            .await
            .map_err(|err| err.to_string())?;

        Ok(contract.address())
    }

    #[async_trait]
    impl AccountPool for EthersBackend {
        async fn local_accounts(&self) -> Result<Vec<Address>, String> {
            self.provider
                .get_accounts()
                .await
                .map_err(|err| err.to_string())
        }
    }

    #[async_trait]
    impl ContractDeployer for EthersBackend {
        async fn deploy_mock_aggregator(
            &self,
            sender: &AccountHandle,
            args: &MockAggregatorArgs,
        ) -> Result<Address, String> {
            let address = match sender {
                // Signed by the node itself.
                AccountHandle::Local { address, .. } => {
                    let client = Arc::new(self.provider.clone().with_sender(*address));
                    deploy_with(client, &self.artifact, args).await?
                }
                AccountHandle::Imported(wallet) => {
                    let wallet = wallet.clone().with_chain_id(self.chain_id);
                    let client = Arc::new(SignerMiddleware::new(self.provider.clone(), wallet));
                    deploy_with(client, &self.artifact, args).await?
                }
            };

            event!(Level::INFO, "Deployed to {:?}", address);

            Ok(address)
        }
    }
}
