//! 领域类型模块
//!
//! 跨链执行的核心领域类型：地址、链标识、请求记录与生命周期

pub mod address;
pub mod execution;
pub mod request_id;

pub use address::{EvmAddress, UniversalAddress};
pub use execution::{RelayEntry, RelayStatus, RequestForExecution};
pub use request_id::RequestId;

/// 逻辑链标识（跨链端点命名空间，16位无符号）
///
/// 链的运行时家族由配置查表决定，不从链ID推导。
pub type ChainId = u16;

/// 链运行时家族
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeFamily {
    /// EVM 系列 (Ethereum, BSC, Polygon, Arbitrum, ...)
    Evm,
    /// Solana 虚拟机系列
    Svm,
}

impl RuntimeFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeFamily::Evm => "evm",
            RuntimeFamily::Svm => "svm",
        }
    }
}
