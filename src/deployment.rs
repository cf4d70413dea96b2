use chrono::Utc;
use color_eyre::eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{
    fmt, fs,
    io::Write,
    path::{Path, PathBuf},
};

pub const DEPLOYMENTS_ROOT: &str = ".deployments";
const DEPLOYMENTS_FILE: &str = "deployments.json";

/// Known contract address on a freshly provisioned local chain.
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x8D8e70143c2403Ad5FCe09abB4759cE4164D5EbE";

pub const DEFAULT_LOCAL_RPC_URL: &str = "http://127.0.0.1:7545";
pub const DEFAULT_LOCAL_CHAIN_ID: u64 = 1337;

pub const DEFAULT_TESTNET_RPC_URL: &str = "https://data-seed-prebsc-1-s1.binance.org:8545";
pub const DEFAULT_TESTNET_CHAIN_ID: u64 = 97;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeploymentEnv {
    Local,
    Testnet,
}

impl DeploymentEnv {
    pub fn dir_name(self) -> &'static str {
        match self {
            DeploymentEnv::Local => "local",
            DeploymentEnv::Testnet => "testnet",
        }
    }

    /// Built-in network parameters for this environment. Flags and recorded
    /// deployments override individual fields; the two environments share
    /// every line of game logic.
    pub fn default_network(self) -> NetworkConfig {
        match self {
            DeploymentEnv::Local => NetworkConfig {
                rpc_url: DEFAULT_LOCAL_RPC_URL.to_string(),
                chain_id: DEFAULT_LOCAL_CHAIN_ID,
                contract_address: DEFAULT_CONTRACT_ADDRESS.to_string(),
            },
            DeploymentEnv::Testnet => NetworkConfig {
                rpc_url: DEFAULT_TESTNET_RPC_URL.to_string(),
                chain_id: DEFAULT_TESTNET_CHAIN_ID,
                contract_address: DEFAULT_CONTRACT_ADDRESS.to_string(),
            },
        }
    }
}

impl fmt::Display for DeploymentEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentEnv::Local => "Local",
            DeploymentEnv::Testnet => "Testnet",
        };
        write!(f, "{name}")
    }
}

/// Everything that distinguishes one deployment target from another.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    pub contract_address: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub deployed_at: String,
    pub contract_address: String,
    pub code_hash: String,
    pub network_url: String,
    pub chain_id: u64,
}

impl DeploymentRecord {
    pub fn is_compatible_with_hash(&self, hash: &str) -> bool {
        self.code_hash == hash
    }
}

#[derive(Debug)]
pub struct DeploymentStore {
    path: PathBuf,
}

impl DeploymentStore {
    pub fn new(env: DeploymentEnv) -> Result<Self> {
        let path = ensure_store(Path::new(DEPLOYMENTS_ROOT), env)?;
        Ok(Self { path })
    }

    /// Store rooted somewhere other than the working directory.
    pub fn at(root: &Path, env: DeploymentEnv) -> Result<Self> {
        let path = ensure_store(root, env)?;
        Ok(Self { path })
    }

    pub fn load(&self) -> Result<Vec<DeploymentRecord>> {
        read_records(&self.path)
    }

    pub fn append(&self, record: DeploymentRecord) -> Result<()> {
        let mut records = self.load()?;
        records.push(record);
        write_records(&self.path, &records)
    }

    /// Most recent record matching the chain, if any.
    pub fn latest_for_chain(&self, chain_id: u64) -> Result<Option<DeploymentRecord>> {
        let records = self.load()?;
        Ok(records.into_iter().rev().find(|r| r.chain_id == chain_id))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn record_deployment(
    env: DeploymentEnv,
    contract_address: impl AsRef<str>,
    code_hash: impl AsRef<str>,
    network: &NetworkConfig,
) -> Result<()> {
    let store = DeploymentStore::new(env)?;
    let record = DeploymentRecord {
        deployed_at: Utc::now().to_rfc3339(),
        contract_address: contract_address.as_ref().to_string(),
        code_hash: code_hash.as_ref().to_string(),
        network_url: network.rpc_url.clone(),
        chain_id: network.chain_id,
    };
    store.append(record)
}

/// Hash of the deployed runtime bytecode, used to recognize whether the
/// contract at a recorded address still matches what was recorded.
pub fn compute_code_hash(code: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code);
    hex::encode(hasher.finalize())
}

pub fn ensure_structure() -> Result<()> {
    for env in [DeploymentEnv::Local, DeploymentEnv::Testnet] {
        let _ = ensure_store(Path::new(DEPLOYMENTS_ROOT), env)?;
    }
    Ok(())
}

fn ensure_store(root: &Path, env: DeploymentEnv) -> Result<PathBuf> {
    if !root.exists() {
        fs::create_dir_all(root).wrap_err("Failed to create .deployments directory")?;
    }

    let env_dir = root.join(env.dir_name());
    if !env_dir.exists() {
        fs::create_dir_all(&env_dir).wrap_err_with(|| {
            format!("Failed to create .deployments/{} directory", env.dir_name())
        })?;
    }

    let file_path = env_dir.join(DEPLOYMENTS_FILE);
    if !file_path.exists() {
        let mut file = fs::File::create(&file_path).wrap_err_with(|| {
            format!(
                "Failed to create deployment record file for {} at {:?}",
                env, file_path
            )
        })?;
        file.write_all(b"[]").wrap_err_with(|| {
            format!("Failed to initialize deployment record file for {}", env)
        })?;
    }

    Ok(file_path)
}

fn read_records(path: impl AsRef<Path>) -> Result<Vec<DeploymentRecord>> {
    let data = fs::read(path.as_ref()).wrap_err("Failed to read deployment records")?;
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let records = serde_json::from_slice::<Vec<DeploymentRecord>>(&data)
        .wrap_err("Failed to parse deployment records JSON")?;
    Ok(records)
}

fn write_records(path: impl AsRef<Path>, records: &[DeploymentRecord]) -> Result<()> {
    let json = serde_json::to_vec_pretty(records)
        .wrap_err("Failed to serialize deployment records")?;
    fs::write(path.as_ref(), json).wrap_err("Failed to write deployment records")?;
    Ok(())
}
