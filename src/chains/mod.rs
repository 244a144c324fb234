//! 链适配器层
//!
//! 每个配置的链一个适配器，能力集 {get_gas_price, get_request,
//! relay_vaa_v1, relay_modular}。只有这一层知道链家族细节，上层完全不感知。

pub mod evm;
pub mod svm;

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use ethers::types::U256;
use thiserror::Error;

use crate::{
    codec::ExecutionRequest,
    config::Config,
    domain::{ChainId, RequestForExecution, RuntimeFamily},
};

/// 适配器错误：转发循环依据类型做生命周期转换
#[derive(Debug, Error)]
pub enum AdapterError {
    /// 瞬时故障（RPC 超时等），重新排队
    #[error("transient adapter error: {0}")]
    Transient(String),
    /// 终态故障（目的合约 revert 等）
    #[error("terminal adapter error: {0}")]
    Terminal(String),
    /// 该链家族不支持此能力
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl AdapterError {
    /// 按 RPC 诊断信息分类：带 revert 标记的是终态
    pub fn from_rpc_diagnostics(message: String) -> Self {
        if message.to_ascii_lowercase().contains("revert") {
            AdapterError::Terminal(message)
        } else {
            AdapterError::Transient(message)
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, AdapterError::Transient(_))
    }
}

/// 链适配器能力集
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    fn chain_id(&self) -> ChainId;

    /// 当前链的 gas 价格（链原生计价单位）
    async fn get_gas_price(&self) -> Result<U256, AdapterError>;

    /// 按链内定位符取回执行请求事件；交易不存在、无执行器事件或
    /// 定位符不匹配时返回 None
    async fn get_request(
        &self,
        locator: &[u8],
    ) -> Result<Option<RequestForExecution>, AdapterError>;

    /// VAA v1 投递：返回按提交顺序排列的目的链交易标识
    async fn relay_vaa_v1(
        &self,
        rfe: &RequestForExecution,
        request: &ExecutionRequest,
        attested_bytes: &[u8],
    ) -> Result<Vec<String>, AdapterError>;

    /// 模块化消息投递
    async fn relay_modular(
        &self,
        rfe: &RequestForExecution,
        request: &ExecutionRequest,
    ) -> Result<Vec<String>, AdapterError>;
}

/// chainId → 适配器
pub struct AdapterRegistry {
    adapters: HashMap<ChainId, Arc<dyn ChainAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    pub fn insert(&mut self, adapter: Arc<dyn ChainAdapter>) {
        self.adapters.insert(adapter.chain_id(), adapter);
    }

    pub fn get(&self, chain_id: ChainId) -> Option<Arc<dyn ChainAdapter>> {
        self.adapters.get(&chain_id).cloned()
    }

    /// 按配置构建所有适配器
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let mut registry = Self::new();
        for entry in &config.chains {
            let adapter: Arc<dyn ChainAdapter> = match entry.runtime_family {
                RuntimeFamily::Evm => {
                    Arc::new(evm::EvmAdapter::from_config(entry, &config.keys)?)
                }
                RuntimeFamily::Svm => Arc::new(svm::SvmAdapter::from_config(entry)?),
            };
            tracing::info!(
                chain = entry.chain_id,
                family = entry.runtime_family.as_str(),
                "chain adapter registered"
            );
            registry.insert(adapter);
        }
        Ok(registry)
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
