//! 二进制编解码层
//!
//! 签名报价 (EQ01/EG01)、执行请求载荷 (ERV1/ERN1/ERC1/ERC2) 与中继指令的
//! 位精确编解码。所有多字节整数均为大端序。

pub mod quote;
pub mod relay_instructions;
pub mod request;

use thiserror::Error;

pub use quote::{GovernanceMessage, SignedQuote};
pub use relay_instructions::{
    decode_relay_instructions, encode_relay_instructions, total_gas_limit_and_msg_value,
    RelayInstruction,
};
pub use request::ExecutionRequest;

/// 编解码错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("truncated input: need {need} bytes at offset {offset}, have {have}")]
    Truncated {
        offset: usize,
        need: usize,
        have: usize,
    },
    #[error("trailing bytes: {0} bytes left after decode")]
    TrailingBytes(usize),
    #[error("unknown prefix: {0}")]
    UnknownPrefix(String),
    #[error("unsupported relay instruction type: {0}")]
    UnsupportedInstruction(u8),
    #[error("more than one gas drop-off instruction")]
    DuplicateDropOff,
    #[error("non-EVM address where an EVM address is required")]
    NonEvmAddress,
    #[error("invalid field value: {0}")]
    InvalidField(&'static str),
}

/// 大端序字节读取游标，所有解码器共用
pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::Truncated {
                offset: self.offset,
                need: n,
                have: self.remaining(),
            });
        }
        let out = &self.bytes[self.offset..self.offset + n];
        self.offset += n;
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_be_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub fn u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn u64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn u128(&mut self) -> Result<u128, CodecError> {
        Ok(u128::from_be_bytes(self.take(16)?.try_into().unwrap()))
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        Ok(self.take(N)?.try_into().unwrap())
    }

    /// 解码结束后必须恰好耗尽输入
    pub fn finish(self) -> Result<(), CodecError> {
        if self.remaining() != 0 {
            return Err(CodecError::TrailingBytes(self.remaining()));
        }
        Ok(())
    }
}
