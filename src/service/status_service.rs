//! 状态查询与准入服务
//!
//! `/v0/status/:id` 的业务流程：已知 id 直接返回注册表条目；未知 id 则
//! 解码 id → 源链适配器取回事件 → 验内嵌报价 → 解码中继指令 → 按报价
//! 估算成本并与实付金额比较 → 分类。只有 pending 分类会准入注册表并排队，
//! 终态分类（underpaid / unsupported）每次轮询重新计算，无副作用。

use std::sync::Arc;

use ethers::types::U256;
use thiserror::Error;

use crate::{
    chains::{AdapterError, AdapterRegistry},
    codec::{self, CodecError, ExecutionRequest, SignedQuote},
    config::Config,
    domain::{
        request_id::RequestIdError, ChainId, RelayEntry, RelayStatus, RequestId, RuntimeFamily,
    },
    metrics,
    service::{
        quote_engine::{self, QuoteEngine, QuoteError},
        relay_registry::RelayRegistry,
    },
    utils::time_utils,
};

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("invalid request id: {0}")]
    RequestId(#[from] RequestIdError),
    #[error("unsupported chain: {0}")]
    UnknownChain(ChainId),
    #[error("no execution request found for this id")]
    NotFound,
    #[error(transparent)]
    Decode(#[from] CodecError),
    #[error(transparent)]
    Quote(#[from] QuoteError),
    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

pub struct StatusService {
    config: Arc<Config>,
    adapters: Arc<AdapterRegistry>,
    registry: Arc<RelayRegistry>,
    quote_engine: Arc<QuoteEngine>,
}

impl StatusService {
    pub fn new(
        config: Arc<Config>,
        adapters: Arc<AdapterRegistry>,
        registry: Arc<RelayRegistry>,
        quote_engine: Arc<QuoteEngine>,
    ) -> Self {
        Self {
            config,
            adapters,
            registry,
            quote_engine,
        }
    }

    /// 查询（并在首次观察时启动）一次转发
    pub async fn status(&self, raw_id: &str) -> Result<RelayEntry, StatusError> {
        let id = RequestId::parse(raw_id)?;

        // 已知 id：幂等读取
        if let Some(entry) = self.registry.get(&id).await {
            return Ok(entry);
        }

        let entry = self.classify(&id).await?;

        if entry.status == RelayStatus::Pending {
            // 守卫插入：并发轮询只有一个会真正入队
            if !self.registry.admit(entry.clone()).await {
                if let Some(existing) = self.registry.get(&id).await {
                    return Ok(existing);
                }
            }
        } else {
            match entry.status {
                RelayStatus::Underpaid => metrics::inc_relay_underpaid(),
                RelayStatus::Unsupported => metrics::inc_relay_unsupported(),
                _ => {}
            }
        }
        Ok(entry)
    }

    /// 取回事件并做完整校验与分类
    async fn classify(&self, id: &RequestId) -> Result<RelayEntry, StatusError> {
        let src_chain = self
            .config
            .chain(id.chain_id())
            .ok_or(StatusError::UnknownChain(id.chain_id()))?;
        let adapter = self
            .adapters
            .get(id.chain_id())
            .ok_or(StatusError::UnknownChain(id.chain_id()))?;

        let rfe = adapter
            .get_request(id.locator())
            .await?
            .ok_or(StatusError::NotFound)?;

        let quote = SignedQuote::decode(&rfe.signed_quote_bytes)?;
        let now = time_utils::current_timestamp_u64();
        self.quote_engine.verify(&quote, now)?;
        if quote.src_chain != id.chain_id() {
            return Err(QuoteError::ChainMismatch {
                quoted: quote.src_chain,
                actual: id.chain_id(),
            }
            .into());
        }
        if quote.dst_chain != rfe.dst_chain {
            return Err(QuoteError::ChainMismatch {
                quoted: quote.dst_chain,
                actual: rfe.dst_chain,
            }
            .into());
        }
        // 源链要求 EVM 收款地址时的硬校验
        if src_chain.runtime_family == RuntimeFamily::Evm {
            quote.payee_as_evm()?;
        }

        let dst_chain = self
            .config
            .chain(rfe.dst_chain)
            .ok_or(StatusError::UnknownChain(rfe.dst_chain))?;

        let instructions = codec::decode_relay_instructions(&rfe.relay_instructions_bytes)?;
        let (gas_limit, msg_value) = codec::total_gas_limit_and_msg_value(&instructions)?;
        let estimate = quote_engine::estimate(
            &quote,
            gas_limit,
            msg_value,
            dst_chain.gas_price_decimals,
            src_chain.native_decimals,
            dst_chain.native_decimals,
        )?;

        // 分类规则是全函数：underpaid → unsupported → pending
        let instruction = ExecutionRequest::decode(&rfe.request_bytes).ok();
        let status = if estimate > rfe.amt_paid {
            RelayStatus::Underpaid
        } else if instruction.is_none() {
            RelayStatus::Unsupported
        } else {
            RelayStatus::Pending
        };

        tracing::info!(
            id = %id,
            status = status.as_str(),
            estimate = %estimate,
            amt_paid = %rfe.amt_paid,
            "execution request classified"
        );

        Ok(RelayEntry {
            id: id.clone(),
            status,
            failure_cause: match status {
                RelayStatus::Underpaid => Some(underpaid_cause(estimate, rfe.amt_paid)),
                RelayStatus::Unsupported => Some("unknown request prefix".to_string()),
                _ => None,
            },
            request_for_execution: rfe,
            instruction,
            quote,
            estimate,
            txs: vec![],
        })
    }
}

fn underpaid_cause(estimate: U256, amt_paid: U256) -> String {
    format!("estimate {} exceeds paid amount {}", estimate, amt_paid)
}
