use chrono::Utc;
use color_eyre::eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::{
    fmt, fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::provider::{ChainDescriptor, NativeCurrency};

pub const DEPLOYMENTS_ROOT: &str = ".deployments";
const DEPLOYMENTS_FILE: &str = "deployments.json";

pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x7f460A9B660ce4bC7e87ECd130DdB544360CE90e";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeploymentEnv {
    Testnet,
    Local,
}

impl DeploymentEnv {
    pub fn dir_name(self) -> &'static str {
        match self {
            DeploymentEnv::Testnet => "testnet",
            DeploymentEnv::Local => "local",
        }
    }
}

impl fmt::Display for DeploymentEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentEnv::Testnet => "Testnet",
            DeploymentEnv::Local => "Local",
        };
        write!(f, "{name}")
    }
}

/// One recorded contract deployment: the address plus the chain descriptor
/// pushed to wallets. The last record per environment wins, so another
/// deployment target is a record edit away, not a code change.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContestDeployment {
    pub recorded_at: String,
    pub contract_address: String,
    pub chain: ChainDescriptor,
}

pub fn ancient8_testnet() -> ChainDescriptor {
    ChainDescriptor {
        chain_id: "0x1ABDAB8".to_owned(),
        chain_name: "Ancient8 Testnet".to_owned(),
        rpc_urls: vec!["https://rpcv2-testnet.ancient8.gg/".to_owned()],
        native_currency: NativeCurrency {
            name: "ETH".to_owned(),
            symbol: "ETH".to_owned(),
            decimals: 18,
        },
        block_explorer_urls: Vec::new(),
    }
}

pub fn local_devnet() -> ChainDescriptor {
    ChainDescriptor {
        chain_id: "0x7a69".to_owned(),
        chain_name: "Local Devnet".to_owned(),
        rpc_urls: vec!["http://localhost:8545/".to_owned()],
        native_currency: NativeCurrency {
            name: "ETH".to_owned(),
            symbol: "ETH".to_owned(),
            decimals: 18,
        },
        block_explorer_urls: Vec::new(),
    }
}

fn default_record(env: DeploymentEnv) -> ContestDeployment {
    let chain = match env {
        DeploymentEnv::Testnet => ancient8_testnet(),
        DeploymentEnv::Local => local_devnet(),
    };
    ContestDeployment {
        recorded_at: Utc::now().to_rfc3339(),
        contract_address: DEFAULT_CONTRACT_ADDRESS.to_owned(),
        chain,
    }
}

#[derive(Debug)]
pub struct DeploymentStore {
    env: DeploymentEnv,
    path: PathBuf,
}

impl DeploymentStore {
    pub fn new(env: DeploymentEnv) -> Result<Self> {
        let path = ensure_store(env)?;
        Ok(Self { env, path })
    }

    pub fn load(&self) -> Result<Vec<ContestDeployment>> {
        read_records(&self.path)
    }

    pub fn append(&self, record: ContestDeployment) -> Result<()> {
        let mut records = self.load()?;
        records.push(record);
        write_records(&self.path, &records)
    }

    /// Latest record for this environment, seeding the store with the
    /// shipped defaults when it is empty.
    pub fn latest_or_default(&self) -> Result<ContestDeployment> {
        let records = self.load()?;
        if let Some(latest) = records.into_iter().next_back() {
            return Ok(latest);
        }
        let record = default_record(self.env);
        self.append(record.clone())?;
        Ok(record)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn ensure_structure() -> Result<()> {
    for env in [DeploymentEnv::Testnet, DeploymentEnv::Local] {
        let _ = ensure_store(env)?;
    }
    Ok(())
}

fn ensure_store(env: DeploymentEnv) -> Result<PathBuf> {
    let root = Path::new(DEPLOYMENTS_ROOT);
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

fn read_records(path: impl AsRef<Path>) -> Result<Vec<ContestDeployment>> {
    let data = fs::read(path.as_ref()).wrap_err("Failed to read deployment records")?;
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let records = serde_json::from_slice::<Vec<ContestDeployment>>(&data)
        .wrap_err("Failed to parse deployment records JSON")?;
    Ok(records)
}

fn write_records(path: impl AsRef<Path>, records: &[ContestDeployment]) -> Result<()> {
    let json = serde_json::to_vec_pretty(records)
        .wrap_err("Failed to serialize deployment records")?;
    fs::write(path.as_ref(), json).wrap_err("Failed to write deployment records")?;
    Ok(())
}
