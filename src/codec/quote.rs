//! 签名报价编解码
//!
//! EQ01 固定 173 字节：68 字节头 + 40 字节价格体 + 65 字节 r‖s‖v 签名。
//! 签名覆盖前 108 字节（头+体）的 keccak256 摘要。
//! EG01 为治理消息（更换报价合约），159 字节。

use serde::Serialize;

use crate::{
    codec::{CodecError, Reader},
    domain::{ChainId, EvmAddress, UniversalAddress},
    utils::hex_utils,
};

pub const QUOTE_PREFIX: &[u8; 4] = b"EQ01";
pub const GOVERNANCE_PREFIX: &[u8; 4] = b"EG01";

/// EQ01 总长度
pub const SIGNED_QUOTE_LEN: usize = 173;
/// 签名覆盖的报价体长度（不含签名）
pub const QUOTE_BODY_LEN: usize = 108;

/// 签名报价 (EQ01)
///
/// 价格均为 10^-10 USD 定点数。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignedQuote {
    #[schema(value_type = String)]
    pub quoter_address: EvmAddress,
    #[schema(value_type = String)]
    pub payee_address: UniversalAddress,
    pub src_chain: ChainId,
    pub dst_chain: ChainId,
    /// unix 秒
    #[serde(with = "crate::codec::quote::string_u64")]
    #[schema(value_type = String)]
    pub expiry_time: u64,
    #[serde(with = "crate::codec::quote::string_u64")]
    #[schema(value_type = String)]
    pub base_fee: u64,
    #[serde(with = "crate::codec::quote::string_u64")]
    #[schema(value_type = String)]
    pub dst_gas_price: u64,
    #[serde(with = "crate::codec::quote::string_u64")]
    #[schema(value_type = String)]
    pub src_price: u64,
    #[serde(with = "crate::codec::quote::string_u64")]
    #[schema(value_type = String)]
    pub dst_price: u64,
    /// r(32) ‖ s(32) ‖ v(1)，v ∈ {27, 28}
    #[serde(serialize_with = "serialize_signature")]
    #[schema(value_type = String)]
    pub signature: [u8; 65],
}

/// 大整数按十进制字符串序列化（对齐外部 JSON 约定）
pub(crate) mod string_u64 {
    use serde::{self, Serializer};

    pub fn serialize<S: Serializer>(v: &u64, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&v.to_string())
    }
}

fn serialize_signature<S: serde::Serializer>(sig: &[u8; 65], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&hex_utils::encode_prefixed(sig))
}

impl SignedQuote {
    /// 序列化签名覆盖的报价体（108 字节）
    pub fn body_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(QUOTE_BODY_LEN);
        out.extend_from_slice(QUOTE_PREFIX);
        out.extend_from_slice(self.quoter_address.as_bytes());
        out.extend_from_slice(self.payee_address.as_bytes());
        out.extend_from_slice(&self.src_chain.to_be_bytes());
        out.extend_from_slice(&self.dst_chain.to_be_bytes());
        out.extend_from_slice(&self.expiry_time.to_be_bytes());
        out.extend_from_slice(&self.base_fee.to_be_bytes());
        out.extend_from_slice(&self.dst_gas_price.to_be_bytes());
        out.extend_from_slice(&self.src_price.to_be_bytes());
        out.extend_from_slice(&self.dst_price.to_be_bytes());
        out
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = self.body_bytes();
        out.extend_from_slice(&self.signature);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut r = Reader::new(bytes);
        let prefix = r.array::<4>()?;
        if &prefix != QUOTE_PREFIX {
            return Err(CodecError::UnknownPrefix(
                String::from_utf8_lossy(&prefix).into_owned(),
            ));
        }
        let quoter_address = EvmAddress(r.array::<20>()?);
        let payee_address = UniversalAddress(r.array::<32>()?);
        let quote = SignedQuote {
            quoter_address,
            payee_address,
            src_chain: r.u16()?,
            dst_chain: r.u16()?,
            expiry_time: r.u64()?,
            base_fee: r.u64()?,
            dst_gas_price: r.u64()?,
            src_price: r.u64()?,
            dst_price: r.u64()?,
            signature: r.array::<65>()?,
        };
        r.finish()?;
        Ok(quote)
    }

    /// 源链要求 EVM 收款地址时的硬校验
    pub fn payee_as_evm(&self) -> Result<EvmAddress, CodecError> {
        self.payee_address.to_evm().ok_or(CodecError::NonEvmAddress)
    }
}

/// 治理消息 (EG01)：轮换链上报价合约
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GovernanceMessage {
    pub src_chain: ChainId,
    pub quoter_address: EvmAddress,
    pub contract_address: UniversalAddress,
    pub sender_address: UniversalAddress,
    pub expiry_time: u64,
    pub signature: [u8; 65],
}

impl GovernanceMessage {
    pub fn body_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(94);
        out.extend_from_slice(GOVERNANCE_PREFIX);
        out.extend_from_slice(&self.src_chain.to_be_bytes());
        out.extend_from_slice(self.quoter_address.as_bytes());
        out.extend_from_slice(self.contract_address.as_bytes());
        out.extend_from_slice(self.sender_address.as_bytes());
        out.extend_from_slice(&self.expiry_time.to_be_bytes());
        out
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = self.body_bytes();
        out.extend_from_slice(&self.signature);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut r = Reader::new(bytes);
        let prefix = r.array::<4>()?;
        if &prefix != GOVERNANCE_PREFIX {
            return Err(CodecError::UnknownPrefix(
                String::from_utf8_lossy(&prefix).into_owned(),
            ));
        }
        let msg = GovernanceMessage {
            src_chain: r.u16()?,
            quoter_address: EvmAddress(r.array::<20>()?),
            contract_address: UniversalAddress(r.array::<32>()?),
            sender_address: UniversalAddress(r.array::<32>()?),
            expiry_time: r.u64()?,
            signature: r.array::<65>()?,
        };
        r.finish()?;
        Ok(msg)
    }
}
