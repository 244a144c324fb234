//! 执行请求载荷编解码
//!
//! 4 字节前缀判别的联合类型：
//! - ERV1: VAA v1 转发 (46 B)
//! - ERN1: NTT v1 / 模块化消息转发 (70 B)
//! - ERC1: CCTP v1 (16 B)
//! - ERC2: CCTP v2 自动发现 (5 B)

use serde::Serialize;

use crate::{
    codec::{CodecError, Reader},
    domain::{ChainId, UniversalAddress},
};

pub const REQ_VAA_V1: &[u8; 4] = b"ERV1";
pub const REQ_NTT_V1: &[u8; 4] = b"ERN1";
pub const REQ_CCTP_V1: &[u8; 4] = b"ERC1";
pub const REQ_CCTP_V2: &[u8; 4] = b"ERC2";

/// 解码后的执行请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(tag = "type")]
pub enum ExecutionRequest {
    #[serde(rename = "ERV1", rename_all = "camelCase")]
    VaaV1 {
        emitter_chain: ChainId,
        #[schema(value_type = String)]
        emitter_address: UniversalAddress,
        #[serde(with = "crate::codec::quote::string_u64")]
        #[schema(value_type = String)]
        sequence: u64,
    },
    #[serde(rename = "ERN1", rename_all = "camelCase")]
    NttV1 {
        src_chain: ChainId,
        #[schema(value_type = String)]
        src_manager: UniversalAddress,
        #[serde(serialize_with = "serialize_bytes32")]
        #[schema(value_type = String)]
        message_id: [u8; 32],
    },
    #[serde(rename = "ERC1", rename_all = "camelCase")]
    CctpV1 {
        source_domain: u32,
        #[serde(with = "crate::codec::quote::string_u64")]
        #[schema(value_type = String)]
        nonce: u64,
    },
    #[serde(rename = "ERC2", rename_all = "camelCase")]
    CctpV2 { auto_discover: bool },
}

fn serialize_bytes32<S: serde::Serializer>(bytes: &[u8; 32], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&crate::utils::hex_utils::encode_prefixed(bytes))
}

impl ExecutionRequest {
    pub fn prefix(&self) -> &'static [u8; 4] {
        match self {
            ExecutionRequest::VaaV1 { .. } => REQ_VAA_V1,
            ExecutionRequest::NttV1 { .. } => REQ_NTT_V1,
            ExecutionRequest::CctpV1 { .. } => REQ_CCTP_V1,
            ExecutionRequest::CctpV2 { .. } => REQ_CCTP_V2,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            ExecutionRequest::VaaV1 {
                emitter_chain,
                emitter_address,
                sequence,
            } => {
                let mut out = Vec::with_capacity(46);
                out.extend_from_slice(REQ_VAA_V1);
                out.extend_from_slice(&emitter_chain.to_be_bytes());
                out.extend_from_slice(emitter_address.as_bytes());
                out.extend_from_slice(&sequence.to_be_bytes());
                out
            }
            ExecutionRequest::NttV1 {
                src_chain,
                src_manager,
                message_id,
            } => {
                let mut out = Vec::with_capacity(70);
                out.extend_from_slice(REQ_NTT_V1);
                out.extend_from_slice(&src_chain.to_be_bytes());
                out.extend_from_slice(src_manager.as_bytes());
                out.extend_from_slice(message_id);
                out
            }
            ExecutionRequest::CctpV1 {
                source_domain,
                nonce,
            } => {
                let mut out = Vec::with_capacity(16);
                out.extend_from_slice(REQ_CCTP_V1);
                out.extend_from_slice(&source_domain.to_be_bytes());
                out.extend_from_slice(&nonce.to_be_bytes());
                out
            }
            ExecutionRequest::CctpV2 { .. } => {
                let mut out = Vec::with_capacity(5);
                out.extend_from_slice(REQ_CCTP_V2);
                out.push(1);
                out
            }
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut r = Reader::new(bytes);
        let prefix = r.array::<4>()?;
        let req = match &prefix {
            p if p == REQ_VAA_V1 => ExecutionRequest::VaaV1 {
                emitter_chain: r.u16()?,
                emitter_address: UniversalAddress(r.array::<32>()?),
                sequence: r.u64()?,
            },
            p if p == REQ_NTT_V1 => ExecutionRequest::NttV1 {
                src_chain: r.u16()?,
                src_manager: UniversalAddress(r.array::<32>()?),
                message_id: r.array::<32>()?,
            },
            p if p == REQ_CCTP_V1 => ExecutionRequest::CctpV1 {
                source_domain: r.u32()?,
                nonce: r.u64()?,
            },
            p if p == REQ_CCTP_V2 => {
                let flag = r.u8()?;
                if flag != 1 {
                    return Err(CodecError::InvalidField("autoDiscover"));
                }
                ExecutionRequest::CctpV2 {
                    auto_discover: true,
                }
            }
            _ => {
                return Err(CodecError::UnknownPrefix(
                    String::from_utf8_lossy(&prefix).into_owned(),
                ))
            }
        };
        r.finish()?;
        Ok(req)
    }
}
