//! EVM 链适配器
//!
//! 定位符为 txHash(32) ‖ logIndex(u256)。执行请求事件按日志地址、
//! logIndex 与事件签名 topic 匹配；投递先做 eth_call 预演再提交已签名交易。

use std::time::Instant;

use async_trait::async_trait;
use ethers::{
    abi::{self, ParamType, Token},
    providers::{Http, Middleware, Provider},
    signers::{LocalWallet, Signer},
    types::{
        transaction::eip2718::TypedTransaction, Address, BlockId, Bytes, H256,
        TransactionRequest, U256,
    },
    utils::keccak256,
};
use once_cell::sync::Lazy;

use crate::{
    chains::{AdapterError, ChainAdapter},
    codec::{self, ExecutionRequest},
    config::{ChainEntry, SigningKeysConfig},
    domain::{ChainId, EvmAddress, RequestForExecution, UniversalAddress},
    metrics,
    utils::hex_utils,
};

/// RequestForExecution 事件的规范签名 topic
static RFE_EVENT_TOPIC: Lazy<H256> = Lazy::new(|| {
    H256::from(keccak256(
        "RequestForExecution(address,uint256,uint16,bytes32,address,bytes,bytes,bytes)",
    ))
});

/// 事件 data 的 ABI 形状（全部字段非索引）
static RFE_EVENT_PARAMS: Lazy<Vec<ParamType>> = Lazy::new(|| {
    vec![
        ParamType::Address,        // quoterAddress
        ParamType::Uint(256),      // amtPaid
        ParamType::Uint(16),       // dstChain
        ParamType::FixedBytes(32), // dstAddr
        ParamType::Address,        // refundAddr
        ParamType::Bytes,          // signedQuoteBytes
        ParamType::Bytes,          // requestBytes
        ParamType::Bytes,          // relayInstructionsBytes
    ]
});

pub struct EvmAdapter {
    chain_id: ChainId,
    provider: Provider<Http>,
    executor: Address,
    wallet: Option<LocalWallet>,
}

impl EvmAdapter {
    pub fn from_config(entry: &ChainEntry, keys: &SigningKeysConfig) -> anyhow::Result<Self> {
        let provider = Provider::<Http>::try_from(entry.rpc.as_str())?;
        let executor = Address::from(hex_utils::decode_fixed::<20>(&entry.executor_address)?);
        let wallet = match entry.signing_key_ref.as_deref() {
            Some("eth") => match &keys.eth_key {
                Some(key) => {
                    let wallet: LocalWallet = key.parse()?;
                    Some(wallet.with_chain_id(entry.evm_chain_id.unwrap_or(1)))
                }
                None => None,
            },
            _ => None,
        };
        Ok(Self {
            chain_id: entry.chain_id,
            provider,
            executor,
            wallet,
        })
    }

    /// 测试注入用
    pub fn new(
        chain_id: ChainId,
        provider: Provider<Http>,
        executor: Address,
        wallet: Option<LocalWallet>,
    ) -> Self {
        Self {
            chain_id,
            provider,
            executor,
            wallet,
        }
    }

    fn classify<E: std::fmt::Display>(err: E) -> AdapterError {
        AdapterError::from_rpc_diagnostics(err.to_string())
    }

    /// 预演 + 签名提交；返回交易哈希
    async fn simulate_and_submit(
        &self,
        to: Address,
        calldata: Vec<u8>,
        gas_limit: u128,
        msg_value: u128,
    ) -> Result<String, AdapterError> {
        let wallet = self.wallet.as_ref().ok_or_else(|| {
            AdapterError::Unsupported(format!(
                "no submission key configured for chain {}",
                self.chain_id
            ))
        })?;

        let started = Instant::now();
        let gas_price = self
            .provider
            .get_gas_price()
            .await
            .map_err(Self::classify)?;
        let nonce = self
            .provider
            .get_transaction_count(wallet.address(), None)
            .await
            .map_err(Self::classify)?;

        let tx: TypedTransaction = TransactionRequest::new()
            .from(wallet.address())
            .to(to)
            .value(U256::from(msg_value))
            .gas(U256::from(gas_limit))
            .gas_price(gas_price)
            .nonce(nonce)
            .chain_id(wallet.chain_id())
            .data(Bytes::from(calldata))
            .into();

        // 预演：revert 直接判终态，其余按瞬时处理
        self.provider
            .call(&tx, None::<BlockId>)
            .await
            .map_err(|e| {
                metrics::observe_upstream(false, started.elapsed().as_millis());
                Self::classify(e)
            })?;

        let signature = wallet
            .sign_transaction(&tx)
            .await
            .map_err(|e| AdapterError::Terminal(format!("signing failed: {}", e)))?;
        let raw = tx.rlp_signed(&signature);
        let pending = self
            .provider
            .send_raw_transaction(raw)
            .await
            .map_err(|e| {
                metrics::observe_upstream(false, started.elapsed().as_millis());
                Self::classify(e)
            })?;
        let tx_hash = hex_utils::encode_prefixed((*pending).as_bytes());
        metrics::observe_upstream(true, started.elapsed().as_millis());

        tracing::info!(
            chain = self.chain_id,
            tx_hash = %tx_hash,
            gas_limit = gas_limit,
            "destination transaction submitted"
        );
        Ok(tx_hash)
    }

    fn decode_rfe_log(&self, data: &[u8], timestamp: i64) -> Result<RequestForExecution, AdapterError> {
        let tokens = abi::decode(&RFE_EVENT_PARAMS, data)
            .map_err(|e| AdapterError::Terminal(format!("malformed executor event: {}", e)))?;
        let malformed = || AdapterError::Terminal("malformed executor event".to_string());

        let quoter = tokens[0].clone().into_address().ok_or_else(malformed)?;
        let amt_paid = tokens[1].clone().into_uint().ok_or_else(malformed)?;
        let dst_chain = tokens[2].clone().into_uint().ok_or_else(malformed)?;
        let dst_addr = tokens[3].clone().into_fixed_bytes().ok_or_else(malformed)?;
        let refund = tokens[4].clone().into_address().ok_or_else(malformed)?;
        let signed_quote_bytes = tokens[5].clone().into_bytes().ok_or_else(malformed)?;
        let request_bytes = tokens[6].clone().into_bytes().ok_or_else(malformed)?;
        let relay_instructions_bytes = tokens[7].clone().into_bytes().ok_or_else(malformed)?;

        Ok(RequestForExecution {
            quoter_address: EvmAddress(quoter.0),
            amt_paid,
            dst_chain: dst_chain.as_u64() as ChainId,
            dst_addr: UniversalAddress::from_slice(&dst_addr).ok_or_else(malformed)?,
            refund_addr: EvmAddress(refund.0).to_universal(),
            signed_quote_bytes,
            request_bytes,
            relay_instructions_bytes,
            timestamp,
        })
    }
}

#[async_trait]
impl ChainAdapter for EvmAdapter {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    async fn get_gas_price(&self) -> Result<U256, AdapterError> {
        let started = Instant::now();
        let result = self.provider.get_gas_price().await.map_err(Self::classify);
        metrics::observe_upstream(result.is_ok(), started.elapsed().as_millis());
        result
    }

    async fn get_request(
        &self,
        locator: &[u8],
    ) -> Result<Option<RequestForExecution>, AdapterError> {
        if locator.len() != 64 {
            return Ok(None);
        }
        let tx_hash = H256::from_slice(&locator[..32]);
        let log_index = U256::from_big_endian(&locator[32..]);

        let Some(receipt) = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(Self::classify)?
        else {
            return Ok(None);
        };

        let Some(log) = receipt.logs.iter().find(|log| {
            log.log_index == Some(log_index)
                && log.address == self.executor
                && log.topics.first() == Some(&*RFE_EVENT_TOPIC)
                && !log.removed.unwrap_or(false)
        }) else {
            return Ok(None);
        };

        let timestamp = match receipt.block_number {
            Some(number) => self
                .provider
                .get_block(number)
                .await
                .map_err(Self::classify)?
                .map(|b| b.timestamp.as_u64() as i64)
                .unwrap_or(0),
            None => 0,
        };

        self.decode_rfe_log(&log.data, timestamp).map(Some)
    }

    async fn relay_vaa_v1(
        &self,
        rfe: &RequestForExecution,
        request: &ExecutionRequest,
        attested_bytes: &[u8],
    ) -> Result<Vec<String>, AdapterError> {
        debug_assert!(matches!(request, ExecutionRequest::VaaV1 { .. }));
        let dst = rfe.dst_addr.to_evm().ok_or_else(|| {
            AdapterError::Terminal("non-EVM destination address on an EVM chain".to_string())
        })?;
        let instructions = codec::decode_relay_instructions(&rfe.relay_instructions_bytes)
            .map_err(|e| AdapterError::Terminal(format!("bad relay instructions: {}", e)))?;
        let (gas_limit, msg_value) = codec::total_gas_limit_and_msg_value(&instructions)
            .map_err(|e| AdapterError::Terminal(format!("bad relay instructions: {}", e)))?;

        let mut calldata = ethers::utils::id("executeVAAv1(bytes)").to_vec();
        calldata.extend(abi::encode(&[Token::Bytes(attested_bytes.to_vec())]));

        let tx_hash = self
            .simulate_and_submit(Address::from(dst), calldata, gas_limit, msg_value)
            .await?;
        Ok(vec![tx_hash])
    }

    async fn relay_modular(
        &self,
        rfe: &RequestForExecution,
        request: &ExecutionRequest,
    ) -> Result<Vec<String>, AdapterError> {
        let ExecutionRequest::NttV1 {
            src_chain,
            src_manager,
            message_id,
        } = request
        else {
            return Err(AdapterError::Unsupported(
                "modular delivery only handles ERN1 requests".to_string(),
            ));
        };
        let dst = rfe.dst_addr.to_evm().ok_or_else(|| {
            AdapterError::Terminal("non-EVM destination address on an EVM chain".to_string())
        })?;
        let instructions = codec::decode_relay_instructions(&rfe.relay_instructions_bytes)
            .map_err(|e| AdapterError::Terminal(format!("bad relay instructions: {}", e)))?;
        let (gas_limit, msg_value) = codec::total_gas_limit_and_msg_value(&instructions)
            .map_err(|e| AdapterError::Terminal(format!("bad relay instructions: {}", e)))?;

        // 统一执行接口：目的合约自行从其传输层取回消息体
        let mut calldata = ethers::utils::id("executeMsg(uint16,bytes32,bytes32)").to_vec();
        calldata.extend(abi::encode(&[
            Token::Uint(U256::from(*src_chain)),
            Token::FixedBytes(src_manager.as_bytes().to_vec()),
            Token::FixedBytes(message_id.to_vec()),
        ]));

        let tx_hash = self
            .simulate_and_submit(Address::from(dst), calldata, gas_limit, msg_value)
            .await?;
        Ok(vec![tx_hash])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_topic_is_stable() {
        // topic 是协议常量；任何重排字段的改动都必须同步链上合约
        assert_eq!(
            hex_utils::encode_prefixed(RFE_EVENT_TOPIC.as_bytes()).len(),
            66
        );
    }

    #[test]
    fn decodes_rfe_event_data() {
        let adapter = EvmAdapter::new(
            2,
            Provider::<Http>::try_from("http://localhost:8545").unwrap(),
            Address::zero(),
            None,
        );
        let data = abi::encode(&[
            Token::Address(Address::from([0x11; 20])),
            Token::Uint(U256::from(777u64)),
            Token::Uint(U256::from(1u64)),
            Token::FixedBytes(vec![0x22; 32]),
            Token::Address(Address::from([0x33; 20])),
            Token::Bytes(vec![1, 2, 3]),
            Token::Bytes(vec![4, 5]),
            Token::Bytes(vec![]),
        ]);
        let rfe = adapter.decode_rfe_log(&data, 1_700_000_000).unwrap();
        assert_eq!(rfe.quoter_address, EvmAddress([0x11; 20]));
        assert_eq!(rfe.amt_paid, U256::from(777u64));
        assert_eq!(rfe.dst_chain, 1);
        assert_eq!(rfe.dst_addr, UniversalAddress([0x22; 32]));
        assert_eq!(rfe.signed_quote_bytes, vec![1, 2, 3]);
        assert_eq!(rfe.timestamp, 1_700_000_000);
    }

    #[test]
    fn malformed_event_data_is_terminal() {
        let adapter = EvmAdapter::new(
            2,
            Provider::<Http>::try_from("http://localhost:8545").unwrap(),
            Address::zero(),
            None,
        );
        assert!(matches!(
            adapter.decode_rfe_log(&[0u8; 7], 0),
            Err(AdapterError::Terminal(_))
        ));
    }
}
