//! 跨链地址类型
//!
//! UniversalAddress 是 32 字节的跨运行时规范地址形式；EVM 地址左侧补零到 32 字节。
//! 高 12 字节非零即视为非 EVM 地址，在要求 EVM 地址的位置必须拒绝。

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::utils::hex_utils;

/// 32 字节规范跨链地址
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UniversalAddress(pub [u8; 32]);

/// 20 字节 EVM 地址
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EvmAddress(pub [u8; 20]);

impl UniversalAddress {
    pub const ZERO: UniversalAddress = UniversalAddress([0u8; 32]);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// 高 12 字节是否全零（EVM 形式）
    pub fn is_evm_form(&self) -> bool {
        self.0[..12].iter().all(|b| *b == 0)
    }

    /// 转换为 EVM 地址；高 12 字节非零返回 None
    pub fn to_evm(&self) -> Option<EvmAddress> {
        if !self.is_evm_form() {
            return None;
        }
        let mut out = [0u8; 20];
        out.copy_from_slice(&self.0[12..]);
        Some(EvmAddress(out))
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(UniversalAddress(arr))
    }
}

impl EvmAddress {
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// 左侧补零扩展为 32 字节规范形式
    pub fn to_universal(&self) -> UniversalAddress {
        let mut out = [0u8; 32];
        out[12..].copy_from_slice(&self.0);
        UniversalAddress(out)
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 20] = bytes.try_into().ok()?;
        Some(EvmAddress(arr))
    }
}

impl From<ethers::types::Address> for EvmAddress {
    fn from(addr: ethers::types::Address) -> Self {
        EvmAddress(addr.0)
    }
}

impl From<EvmAddress> for ethers::types::Address {
    fn from(addr: EvmAddress) -> Self {
        ethers::types::Address::from(addr.0)
    }
}

impl fmt::Display for UniversalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for EvmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for UniversalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UniversalAddress({})", self)
    }
}

impl fmt::Debug for EvmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EvmAddress({})", self)
    }
}

impl From<UniversalAddress> for String {
    fn from(addr: UniversalAddress) -> String {
        addr.to_string()
    }
}

impl From<EvmAddress> for String {
    fn from(addr: EvmAddress) -> String {
        addr.to_string()
    }
}

impl TryFrom<String> for UniversalAddress {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let bytes = hex_utils::decode_fixed::<32>(&s)
            .map_err(|e| format!("invalid universal address: {}", e))?;
        Ok(UniversalAddress(bytes))
    }
}

impl TryFrom<String> for EvmAddress {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let bytes =
            hex_utils::decode_fixed::<20>(&s).map_err(|e| format!("invalid evm address: {}", e))?;
        Ok(EvmAddress(bytes))
    }
}

impl std::str::FromStr for UniversalAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UniversalAddress::try_from(s.to_string())
    }
}

impl std::str::FromStr for EvmAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EvmAddress::try_from(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evm_form_detection() {
        let mut raw = [0u8; 32];
        raw[12..].copy_from_slice(&[0xAB; 20]);
        let addr = UniversalAddress(raw);
        assert!(addr.is_evm_form());
        assert_eq!(addr.to_evm().unwrap().0, [0xAB; 20]);

        let mut non_evm = raw;
        non_evm[0] = 1;
        let addr = UniversalAddress(non_evm);
        assert!(!addr.is_evm_form());
        assert!(addr.to_evm().is_none());
    }

    #[test]
    fn universal_round_trip_via_string() {
        let addr = EvmAddress([0x11; 20]).to_universal();
        let s = addr.to_string();
        let parsed: UniversalAddress = s.parse().unwrap();
        assert_eq!(parsed, addr);
    }
}
