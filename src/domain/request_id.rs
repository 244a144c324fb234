//! 请求 ID
//!
//! 格式：chainId (u16 大端) ‖ 链内定位符。EVM 定位符为 txHash(32) ‖ logIndex(u256)，
//! SVM 定位符为 64 字节交易签名；定位符的解释交给对应链适配器。
//! 边界输入先规范化（去 0x、小写）再解析，规范字符串形式作为注册表键。

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::{domain::ChainId, utils::hex_utils};

#[derive(Debug, Error)]
pub enum RequestIdError {
    #[error("invalid hex in request id: {0}")]
    Hex(#[from] hex_utils::HexError),
    #[error("request id too short: {0} bytes")]
    TooShort(usize),
}

/// 已解析的请求 ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub struct RequestId {
    chain_id: ChainId,
    locator: Vec<u8>,
}

impl RequestId {
    pub fn new(chain_id: ChainId, locator: Vec<u8>) -> Self {
        Self { chain_id, locator }
    }

    /// 解析外部输入（容忍 0x 前缀与大小写）
    pub fn parse(input: &str) -> Result<Self, RequestIdError> {
        let bytes = hex_utils::decode(input)?;
        if bytes.len() <= 2 {
            return Err(RequestIdError::TooShort(bytes.len()));
        }
        let chain_id = u16::from_be_bytes(bytes[..2].try_into().unwrap());
        Ok(Self {
            chain_id,
            locator: bytes[2..].to_vec(),
        })
    }

    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    pub fn locator(&self) -> &[u8] {
        &self.locator
    }

    /// 规范字符串形式：0x + 小写十六进制(chainId ‖ locator)
    pub fn canonical(&self) -> String {
        let mut bytes = Vec::with_capacity(2 + self.locator.len());
        bytes.extend_from_slice(&self.chain_id.to_be_bytes());
        bytes.extend_from_slice(&self.locator);
        hex_utils::encode_prefixed(&bytes)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl From<RequestId> for String {
    fn from(id: RequestId) -> String {
        id.canonical()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_normalizes_case_and_prefix() {
        let a = RequestId::parse("0x0002ABCDEF").unwrap();
        let b = RequestId::parse("0002abcdef").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.chain_id(), 2);
        assert_eq!(a.locator(), &[0xAB, 0xCD, 0xEF]);
        assert_eq!(a.canonical(), "0x0002abcdef");
    }

    #[test]
    fn evm_shaped_id_round_trip() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&2u16.to_be_bytes());
        raw.extend_from_slice(&[0x11; 32]); // tx hash
        raw.extend_from_slice(&[0u8; 31]);
        raw.push(5); // log index 5 (u256)
        let id = RequestId::parse(&hex::encode(&raw)).unwrap();
        assert_eq!(id.locator().len(), 64);
        assert_eq!(RequestId::parse(&id.canonical()).unwrap(), id);
    }

    #[test]
    fn short_input_rejected() {
        assert!(RequestId::parse("0x0002").is_err());
        assert!(RequestId::parse("zz").is_err());
    }
}
