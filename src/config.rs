//! 配置管理模块
//! 支持从环境变量和配置文件加载配置

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::{ChainId, RuntimeFamily};

/// 应用配置结构体
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub quoter: QuoterConfig,
    pub keys: SigningKeysConfig,
    pub relay: RelayConfig,
    /// 链表：chainId → 端点与计价参数
    pub chains: Vec<ChainEntry>,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
    pub enable_file_logging: bool,
    pub log_file_path: Option<String>,
}

/// 报价方配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuoterConfig {
    /// 报价签名私钥（十六进制，secp256k1）
    pub quoter_key: String,
    /// 自身之外额外信任的报价方地址
    pub allowed_quoters: Vec<String>,
    /// 报价有效期（秒）
    pub quote_ttl_secs: u64,
    /// VAA 查询服务地址
    pub guardian_url: String,
    /// 价格源地址（CoinGecko 兼容）
    pub price_api_url: String,
}

/// 交易提交密钥配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningKeysConfig {
    /// EVM 提交私钥 (signing_key_ref = "eth")
    pub eth_key: Option<String>,
    /// SVM 提交私钥 (signing_key_ref = "sol")
    pub sol_key: Option<String>,
}

/// 转发循环配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// 队列空时的休眠间隔（秒）
    pub sleep_secs: u64,
    /// 指数退避上限（秒）
    pub max_backoff_secs: u64,
}

/// 单条链配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainEntry {
    pub chain_id: ChainId,
    pub name: String,
    pub rpc: String,
    pub runtime_family: RuntimeFamily,
    /// 报价 base fee（10^-10 USD 定点）
    pub base_fee: u64,
    /// 源链收款地址（32 字节规范形式十六进制）
    pub payee_address: String,
    pub gas_price_decimals: u8,
    pub native_decimals: u8,
    /// 执行合约/程序地址
    pub executor_address: String,
    /// EVM 签名用链 ID (EIP-155)；非 EVM 链为空
    #[serde(default)]
    pub evm_chain_id: Option<u64>,
    /// 提交密钥引用："eth" / "sol"
    #[serde(default)]
    pub signing_key_ref: Option<String>,
    /// 价格源中的资产 ID
    pub price_asset_id: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| {
            let port = std::env::var("PORT").unwrap_or_else(|_| "3000".into());
            format!("0.0.0.0:{}", port)
        });
        Self { bind_addr }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "ironrelay=info".into()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
            enable_file_logging: std::env::var("LOG_TO_FILE")
                .ok()
                .map(|v| v == "1")
                .unwrap_or(false),
            log_file_path: std::env::var("LOG_FILE_PATH").ok(),
        }
    }
}

impl Default for QuoterConfig {
    fn default() -> Self {
        Self {
            quoter_key: std::env::var("QUOTER_KEY").unwrap_or_else(|_| {
                // 开发默认密钥，生产环境必须通过 QUOTER_KEY 覆盖
                "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318".into()
            }),
            allowed_quoters: std::env::var("ALLOWED_QUOTERS")
                .ok()
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            quote_ttl_secs: std::env::var("QUOTE_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3600),
            guardian_url: std::env::var("GUARDIAN_URL")
                .unwrap_or_else(|_| "https://api.wormholescan.io".into()),
            price_api_url: std::env::var("PRICE_API_URL")
                .unwrap_or_else(|_| "https://api.coingecko.com".into()),
        }
    }
}

impl Default for SigningKeysConfig {
    fn default() -> Self {
        Self {
            eth_key: std::env::var("ETH_KEY").ok(),
            sol_key: std::env::var("SOL_KEY").ok(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            sleep_secs: std::env::var("RELAY_SLEEP")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            max_backoff_secs: std::env::var("RELAY_MAX_BACKOFF_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            quoter: QuoterConfig::default(),
            keys: SigningKeysConfig::default(),
            relay: RelayConfig::default(),
            chains: default_chains(),
        }
    }
}

/// 默认链表：以太坊主网 (2) 与 Solana (1)
fn default_chains() -> Vec<ChainEntry> {
    vec![
        ChainEntry {
            chain_id: 2,
            name: "ethereum".into(),
            rpc: std::env::var("ETH_RPC_URL")
                .unwrap_or_else(|_| "https://ethereum-rpc.publicnode.com".into()),
            runtime_family: RuntimeFamily::Evm,
            base_fee: 100,
            payee_address:
                "0x0000000000000000000000000000000000000000000000000000000000000000".into(),
            gas_price_decimals: 18,
            native_decimals: 18,
            executor_address: "0x0000000000000000000000000000000000000000".into(),
            evm_chain_id: Some(1),
            signing_key_ref: Some("eth".into()),
            price_asset_id: "ethereum".into(),
        },
        ChainEntry {
            chain_id: 1,
            name: "solana".into(),
            rpc: std::env::var("SOLANA_RPC_URL")
                .unwrap_or_else(|_| "https://api.mainnet-beta.solana.com".into()),
            runtime_family: RuntimeFamily::Svm,
            base_fee: 100,
            payee_address:
                "0x0000000000000000000000000000000000000000000000000000000000000000".into(),
            gas_price_decimals: 15,
            native_decimals: 9,
            executor_address: "Ax7mtQPbNPQmghd7C3BHrMdwwmkAXBDq7kNGfXNcc7dg".into(),
            evm_chain_id: None,
            signing_key_ref: Some("sol".into()),
            price_asset_id: "solana".into(),
        },
    ]
}

impl Config {
    /// 从环境变量加载
    pub fn from_env() -> Result<Self> {
        Ok(Self::default())
    }

    /// 从环境变量加载，再用可选的 TOML 文件覆盖
    pub fn from_env_and_file(path: Option<&str>) -> Result<Self> {
        let Some(path) = path else {
            return Self::from_env();
        };
        let path = Path::new(path);
        if !path.exists() {
            anyhow::bail!("config file not found: {}", path.display());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn chain(&self, chain_id: ChainId) -> Option<&ChainEntry> {
        self.chains.iter().find(|c| c.chain_id == chain_id)
    }

    pub fn is_supported_chain(&self, chain_id: ChainId) -> bool {
        self.chain(chain_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_chains_cover_both_families() {
        let config = Config::default();
        assert!(config
            .chains
            .iter()
            .any(|c| c.runtime_family == RuntimeFamily::Evm));
        assert!(config
            .chains
            .iter()
            .any(|c| c.runtime_family == RuntimeFamily::Svm));
        assert!(config.is_supported_chain(2));
        assert!(!config.is_supported_chain(999));
    }

    #[test]
    fn loads_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[server]
bind_addr = "127.0.0.1:9000"

[[chains]]
chain_id = 10002
name = "sepolia"
rpc = "http://localhost:8545"
runtime_family = "evm"
base_fee = 50
payee_address = "0x000000000000000000000000aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
gas_price_decimals = 18
native_decimals = 18
executor_address = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"
evm_chain_id = 11155111
signing_key_ref = "eth"
price_asset_id = "ethereum"
"#
        )
        .unwrap();
        let config = Config::from_env_and_file(file.path().to_str()).unwrap();
        assert_eq!(config.server.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.chains.len(), 1);
        let chain = config.chain(10002).unwrap();
        assert_eq!(chain.base_fee, 50);
        assert_eq!(chain.runtime_family, RuntimeFamily::Evm);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(Config::from_env_and_file(Some("/nonexistent/ironrelay.toml")).is_err());
    }
}
