//! Configuration management
//!
//! Keeper settings and the pool list come from a TOML file; the RPC endpoint
//! and signing key come from a .env file.
//!
//! ```toml
//! [general]
//! operator = "0x..."
//! v3_router = "0x..."
//! stable_decimals = { fixed = 6 }   # or "query"
//! max_slippage_bps = 50             # omit for no minimum output
//!
//! [general.privilege]
//! v2_operator_only = true
//! v3_operator_only = false
//!
//! [[pool]]
//! exchange = "0x..."   # factory
//! kind = "v3"
//! fee = 500
//! native = "0x..."
//! stable = "0x..."
//! pegged = false
//! ```

use crate::correction::{
    ExecutePrivilege, ExecutorSettings, KeeperSettings, MaxSlippageBps, NoMinimum, Normalization,
    SlippagePolicy, StableDecimals,
};
use crate::pool::PoolRegistry;
use crate::types::{PoolDescriptor, PoolKind, PoolVersion};
use alloy::primitives::Address;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Top-level TOML configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct KeeperConfig {
    pub general: GeneralConfig,
    #[serde(rename = "pool", default)]
    pub pools: Vec<PoolConfig>,
}

/// General settings
#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    /// Registry operator
    pub operator: String,
    /// Receiver of swap outputs (defaults to the signer)
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde(default)]
    pub v3_router: Option<String>,
    #[serde(default = "default_common_decimals")]
    pub common_decimals: u8,
    #[serde(default)]
    pub stable_decimals: StableDecimals,
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    #[serde(default)]
    pub max_slippage_bps: Option<u32>,
    #[serde(default)]
    pub privilege: ExecutePrivilege,
    #[serde(default = "default_true")]
    pub dry_run: bool,
}

fn default_common_decimals() -> u8 { 18 }
fn default_deadline_secs() -> u64 { 300 }
fn default_true() -> bool { true }

/// One `[[pool]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    /// Factory address
    pub exchange: String,
    /// "v2" or "v3"
    pub kind: String,
    /// Fee tier, required for v3
    #[serde(default)]
    pub fee: Option<u32>,
    pub native: String,
    pub stable: String,
    #[serde(default)]
    pub pegged: bool,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn parse_address(value: &str, what: &str) -> Result<Address> {
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid {} address: {}", what, value))
}

impl PoolConfig {
    pub fn to_descriptor(&self) -> Result<PoolDescriptor> {
        let kind = match self.kind.parse::<PoolVersion>()? {
            PoolVersion::V2 => PoolKind::ConstantProduct,
            PoolVersion::V3 => PoolKind::ConcentratedLiquidity {
                fee: self
                    .fee
                    .ok_or_else(|| anyhow!("v3 pool on {} has no fee tier", self.exchange))?,
            },
        };

        Ok(PoolDescriptor {
            exchange: parse_address(&self.exchange, "exchange")?,
            kind,
            native_token: parse_address(&self.native, "native token")?,
            stable_token: parse_address(&self.stable, "stable token")?,
            active: self.active,
            is_pegged: self.pegged,
        })
    }
}

impl KeeperConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;

        Ok(config)
    }

    pub fn operator(&self) -> Result<Address> {
        parse_address(&self.general.operator, "operator")
    }

    pub fn settings(&self) -> Result<KeeperSettings> {
        let general = &self.general;
        Ok(KeeperSettings {
            normalization: Normalization {
                common_decimals: general.common_decimals,
                stable_decimals: general.stable_decimals,
            },
            executor: ExecutorSettings {
                recipient: general
                    .recipient
                    .as_deref()
                    .map(|r| parse_address(r, "recipient"))
                    .transpose()?,
                v3_router: general
                    .v3_router
                    .as_deref()
                    .map(|r| parse_address(r, "v3 router"))
                    .transpose()?,
                deadline_secs: general.deadline_secs,
                privilege: general.privilege,
                dry_run: general.dry_run,
            },
        })
    }

    pub fn slippage_policy(&self) -> Arc<dyn SlippagePolicy> {
        match self.general.max_slippage_bps {
            Some(bps) => Arc::new(MaxSlippageBps::new(bps)),
            None => Arc::new(NoMinimum),
        }
    }

    /// Registry populated by the configured operator, in file order
    pub fn build_registry(&self) -> Result<PoolRegistry> {
        let operator = self.operator()?;
        let mut registry = PoolRegistry::new(operator);

        for (i, pool) in self.pools.iter().enumerate() {
            let descriptor = pool
                .to_descriptor()
                .with_context(|| format!("Invalid [[pool]] entry #{}", i))?;
            registry
                .register(operator, descriptor)
                .with_context(|| format!("Failed to register [[pool]] entry #{}", i))?;
        }

        let (active, pegged) = registry.stats();
        info!(
            "Registry loaded: {} pools ({} active, {} pegged)",
            registry.len(),
            active,
            pegged
        );
        Ok(registry)
    }
}

/// RPC endpoint and signing key
#[derive(Debug, Clone)]
pub struct ChainEnv {
    pub rpc_url: String,
    /// Only needed for live corrections
    pub private_key: Option<String>,
}

/// Load RPC_URL / PRIVATE_KEY from `env_file` (or `.env`) and the process environment
pub fn load_env(env_file: Option<&str>) -> Result<ChainEnv> {
    match env_file {
        Some(file) => {
            dotenv::from_filename(file).ok();
        }
        None => {
            dotenv::dotenv().ok();
        }
    }

    Ok(ChainEnv {
        rpc_url: std::env::var("RPC_URL").context("RPC_URL not set")?,
        private_key: std::env::var("PRIVATE_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty()),
    })
}
