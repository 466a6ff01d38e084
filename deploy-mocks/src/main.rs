use std::path::PathBuf;

use anvil_helpers::anvil_helpers::{is_port_open, Anvil};
use clap::Parser;
use mock_deployer::{Config, DeploySession, MockDeployment, NetworkIdentity, MOCK_V3_AGGREGATOR};
use mock_deployer_providers::{artifact::ContractArtifact, providers::EthersBackend};
use tracing::{event, Level};
use tracing_subscriber::EnvFilter;
use url::Url;

/// Deploys a MockV3Aggregator price feed unless one is already deployed.
#[derive(Parser, Debug)]
#[command(name = "deploy-mocks", version)]
struct Args {
    /// Network to deploy on, defaults to `networks.default` of the config.
    #[arg(long, env = "NETWORK")]
    network: Option<String>,

    #[arg(long, default_value = "brownie-config.yaml")]
    config: PathBuf,

    /// Compiled MockV3Aggregator, brownie or forge format.
    #[arg(long, default_value = "build/contracts/MockV3Aggregator.json")]
    artifact: PathBuf,

    /// Where deployments on live networks are remembered.
    #[arg(long, default_value = "build/deployments")]
    registry_dir: PathBuf,
}

/// Starts anvil for a local network configured with `launch: true` when
/// nothing listens on its host yet.
fn launch_local_node(
    network: &NetworkIdentity,
    config: &Config,
    host: &str,
) -> Result<Option<Anvil>, Box<dyn std::error::Error>> {
    let launch = config.network_settings(network)?.launch;

    if !launch {
        return Ok(None);
    }

    if !network.is_local() {
        event!(Level::WARN, "Ignoring launch for live network {}", network);
        return Ok(None);
    }

    let url = Url::parse(host)?;
    let host_str = url.host_str().ok_or("Host has no hostname")?;
    let port = url.port_or_known_default().ok_or("Host has no port")?;

    if is_port_open(host_str, port) {
        event!(Level::INFO, "Node already running at {}", host);
        return Ok(None);
    }

    event!(Level::INFO, "Launching anvil for {} on port {}", network, port);

    Ok(Some(Anvil::spawn(Some(port), None)?))
}

async fn run(
    args: &Args,
    config: &Config,
    network: NetworkIdentity,
    host: &str,
) -> Result<MockDeployment, Box<dyn std::error::Error>> {
    let artifact = ContractArtifact::from_file(&args.artifact)?;
    let backend = EthersBackend::connect(host, artifact).await?;

    let registry_path = args
        .registry_dir
        .join(format!("{}.json", backend.chain_id()));
    let persist = config.persists_deployments(&network);

    let mut session = DeploySession::new(network, config.wallets.clone(), backend);
    if persist {
        session = session.with_persisted_registry(registry_path)?;
    }

    Ok(session.deploy_mocks().await?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config = Config::from_file(&args.config)?;
    let network = NetworkIdentity::resolve(args.network.as_deref(), config.networks.default.as_deref());
    let host = config.host(&network)?;

    let anvil = launch_local_node(&network, &config, &host)?;

    let result = run(&args, &config, network, &host).await;

    if let Some(anvil) = anvil {
        anvil.kill()?;
    }

    let deployment = result?;

    println!("{}: {:?}", MOCK_V3_AGGREGATOR, deployment.address);

    Ok(())
}
