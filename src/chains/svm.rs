//! SVM 链适配器
//!
//! 定位符为 64 字节交易签名。执行请求是执行器程序的一条指令：
//! 8 字节 anchor 判别符后接小端 borsh 参数
//! (amount u64, dstChain u16, dstAddr 32, refundAddr 32, 三段 u32 长度前缀字节)。
//! 报价方地址从内嵌签名报价的 [4..24] 截取。
//! 本家族的投递能力尚未接通，relay_* 返回 Unsupported。

use std::time::{Duration, Instant};

use async_trait::async_trait;
use ethers::types::U256;
use serde_json::{json, Value};

use crate::{
    chains::{AdapterError, ChainAdapter},
    codec::ExecutionRequest,
    config::ChainEntry,
    domain::{ChainId, EvmAddress, RequestForExecution, UniversalAddress},
    metrics,
};

/// 无优先费样本时的保底价格（micro-lamports / CU）
const MIN_PRIORITIZATION_FEE: u64 = 1;

pub struct SvmAdapter {
    chain_id: ChainId,
    rpc: String,
    executor: String,
    client: reqwest::Client,
}

impl SvmAdapter {
    pub fn from_config(entry: &ChainEntry) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Ok(Self {
            chain_id: entry.chain_id,
            rpc: entry.rpc.clone(),
            executor: entry.executor_address.clone(),
            client,
        })
    }

    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, AdapterError> {
        let started = Instant::now();
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response = self
            .client
            .post(&self.rpc)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                metrics::observe_upstream(false, started.elapsed().as_millis());
                AdapterError::Transient(format!("{} request failed: {}", method, e))
            })?;
        let body: Value = response.json().await.map_err(|e| {
            metrics::observe_upstream(false, started.elapsed().as_millis());
            AdapterError::Transient(format!("{} malformed response: {}", method, e))
        })?;
        if let Some(err) = body.get("error").filter(|e| !e.is_null()) {
            metrics::observe_upstream(false, started.elapsed().as_millis());
            return Err(AdapterError::from_rpc_diagnostics(format!(
                "{} rpc error: {}",
                method, err
            )));
        }
        metrics::observe_upstream(true, started.elapsed().as_millis());
        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }

    /// 在外层与内层指令中找第一条执行器程序指令，解码为 RFE
    fn extract_request(&self, tx: &Value) -> Option<RequestForExecution> {
        let message = tx.pointer("/transaction/message")?;
        let account_keys: Vec<String> = message
            .get("accountKeys")?
            .as_array()?
            .iter()
            .filter_map(|k| k.as_str().map(str::to_string))
            .collect();
        let block_time = tx.get("blockTime").and_then(Value::as_i64).unwrap_or(0);

        let mut candidates: Vec<&Value> = Vec::new();
        if let Some(instructions) = message.get("instructions").and_then(Value::as_array) {
            candidates.extend(instructions.iter());
        }
        if let Some(inner_sets) = tx.pointer("/meta/innerInstructions").and_then(Value::as_array) {
            for set in inner_sets {
                if let Some(instructions) = set.get("instructions").and_then(Value::as_array) {
                    candidates.extend(instructions.iter());
                }
            }
        }

        for instruction in candidates {
            let program_index = instruction.get("programIdIndex")?.as_u64()? as usize;
            if account_keys.get(program_index).map(String::as_str) != Some(self.executor.as_str())
            {
                continue;
            }
            let data_b58 = instruction.get("data").and_then(Value::as_str)?;
            let data = bs58::decode(data_b58).into_vec().ok()?;
            if let Some(rfe) = decode_request_instruction(&data, block_time) {
                return Some(rfe);
            }
        }
        None
    }
}

fn take<'a>(data: &'a [u8], offset: &mut usize, n: usize) -> Option<&'a [u8]> {
    if data.len() < *offset + n {
        return None;
    }
    let out = &data[*offset..*offset + n];
    *offset += n;
    Some(out)
}

fn take_vec(data: &[u8], offset: &mut usize) -> Option<Vec<u8>> {
    let len = u32::from_le_bytes(take(data, offset, 4)?.try_into().ok()?) as usize;
    Some(take(data, offset, len)?.to_vec())
}

/// 解码执行器指令参数（anchor 判别符 + 小端 borsh）
fn decode_request_instruction(data: &[u8], block_time: i64) -> Option<RequestForExecution> {
    // 8 字节判别符
    let mut offset = 8usize;
    if data.len() < offset {
        return None;
    }

    let amount = u64::from_le_bytes(take(data, &mut offset, 8)?.try_into().ok()?);
    let dst_chain = u16::from_le_bytes(take(data, &mut offset, 2)?.try_into().ok()?);
    let dst_addr = UniversalAddress::from_slice(take(data, &mut offset, 32)?)?;
    let refund_addr = UniversalAddress::from_slice(take(data, &mut offset, 32)?)?;
    let signed_quote_bytes = take_vec(data, &mut offset)?;
    let request_bytes = take_vec(data, &mut offset)?;
    let relay_instructions_bytes = take_vec(data, &mut offset)?;
    if offset != data.len() {
        return None;
    }

    // 报价方地址位于签名报价的固定偏移 [4..24]
    let quoter_address = EvmAddress::from_slice(signed_quote_bytes.get(4..24)?)?;

    Some(RequestForExecution {
        quoter_address,
        amt_paid: U256::from(amount),
        dst_chain,
        dst_addr,
        refund_addr,
        signed_quote_bytes,
        request_bytes,
        relay_instructions_bytes,
        timestamp: block_time,
    })
}

#[async_trait]
impl ChainAdapter for SvmAdapter {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    async fn get_gas_price(&self) -> Result<U256, AdapterError> {
        let result = self
            .rpc_call("getRecentPrioritizationFees", json!([[]]))
            .await?;
        let mut fees: Vec<u64> = result
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| e.get("prioritizationFee").and_then(Value::as_u64))
                    .collect()
            })
            .unwrap_or_default();
        if fees.is_empty() {
            return Ok(U256::from(MIN_PRIORITIZATION_FEE));
        }
        fees.sort_unstable();
        let median = fees[fees.len() / 2].max(MIN_PRIORITIZATION_FEE);
        Ok(U256::from(median))
    }

    async fn get_request(
        &self,
        locator: &[u8],
    ) -> Result<Option<RequestForExecution>, AdapterError> {
        if locator.len() != 64 {
            return Ok(None);
        }
        let signature = bs58::encode(locator).into_string();
        let result = self
            .rpc_call(
                "getTransaction",
                json!([signature, {"encoding": "json", "maxSupportedTransactionVersion": 0}]),
            )
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        // 失败交易不会产生有效的执行请求
        if result
            .pointer("/meta/err")
            .map(|e| !e.is_null())
            .unwrap_or(false)
        {
            return Ok(None);
        }
        Ok(self.extract_request(&result))
    }

    async fn relay_vaa_v1(
        &self,
        _rfe: &RequestForExecution,
        _request: &ExecutionRequest,
        _attested_bytes: &[u8],
    ) -> Result<Vec<String>, AdapterError> {
        Err(AdapterError::Unsupported(
            "VAA v1 delivery is not yet wired for the SVM family".to_string(),
        ))
    }

    async fn relay_modular(
        &self,
        _rfe: &RequestForExecution,
        _request: &ExecutionRequest,
    ) -> Result<Vec<String>, AdapterError> {
        Err(AdapterError::Unsupported(
            "modular delivery is not yet wired for the SVM family".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 构造一条合法的执行器指令数据
    fn sample_instruction_data() -> Vec<u8> {
        let mut quote = vec![0u8; 173];
        quote[..4].copy_from_slice(b"EQ01");
        quote[4..24].copy_from_slice(&[0xAA; 20]);

        let mut data = Vec::new();
        data.extend_from_slice(&[0u8; 8]); // anchor 判别符
        data.extend_from_slice(&555u64.to_le_bytes());
        data.extend_from_slice(&2u16.to_le_bytes());
        data.extend_from_slice(&[0x11; 32]);
        data.extend_from_slice(&[0x22; 32]);
        for payload in [&quote[..], &b"ERV1rest"[..], &b"\x01"[..]] {
            data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            data.extend_from_slice(payload);
        }
        data
    }

    #[test]
    fn decodes_request_instruction() {
        let rfe = decode_request_instruction(&sample_instruction_data(), 1_700_000_000).unwrap();
        assert_eq!(rfe.amt_paid, U256::from(555u64));
        assert_eq!(rfe.dst_chain, 2);
        assert_eq!(rfe.quoter_address, EvmAddress([0xAA; 20]));
        assert_eq!(rfe.dst_addr, UniversalAddress([0x11; 32]));
        assert_eq!(rfe.timestamp, 1_700_000_000);
    }

    #[test]
    fn rejects_truncated_instruction() {
        let data = sample_instruction_data();
        assert!(decode_request_instruction(&data[..40], 0).is_none());
        // 尾部多余字节同样拒绝
        let mut padded = data;
        padded.push(0);
        assert!(decode_request_instruction(&padded, 0).is_none());
    }

    #[test]
    fn extracts_first_matching_executor_instruction() {
        let executor = "Ax7mtQPbNPQmghd7C3BHrMdwwmkAXBDq7kNGfXNcc7dg";
        let adapter = SvmAdapter {
            chain_id: 1,
            rpc: "http://localhost:8899".into(),
            executor: executor.into(),
            client: reqwest::Client::new(),
        };
        let tx = json!({
            "blockTime": 1_700_000_000,
            "meta": {"err": null, "innerInstructions": []},
            "transaction": {"message": {
                "accountKeys": ["SomeOtherProgram1111111111111111111111111111", executor],
                "instructions": [
                    {"programIdIndex": 0, "accounts": [], "data": "1111"},
                    {"programIdIndex": 1, "accounts": [],
                     "data": bs58::encode(sample_instruction_data()).into_string()},
                ],
            }},
        });
        let rfe = adapter.extract_request(&tx).unwrap();
        assert_eq!(rfe.dst_chain, 2);
    }
}
