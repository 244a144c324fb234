//! 执行请求记录与生命周期
//!
//! RequestForExecution 是从源链观察到的付款事件；RelayEntry 是注册表中
//! 一次转发的权威生命周期记录。

use ethers::types::U256;
use serde::{Serialize, Serializer};

use crate::{
    codec::{ExecutionRequest, SignedQuote},
    domain::{ChainId, EvmAddress, RequestId, UniversalAddress},
    utils::hex_utils,
};

/// 链上 Request-For-Execution 事件的统一记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestForExecution {
    #[schema(value_type = String)]
    pub quoter_address: EvmAddress,
    /// 源链支付金额（源链原生最小单位）
    #[serde(serialize_with = "serialize_u256")]
    #[schema(value_type = String)]
    pub amt_paid: U256,
    pub dst_chain: ChainId,
    #[schema(value_type = String)]
    pub dst_addr: UniversalAddress,
    #[schema(value_type = String)]
    pub refund_addr: UniversalAddress,
    #[serde(serialize_with = "serialize_hex")]
    #[schema(value_type = String)]
    pub signed_quote_bytes: Vec<u8>,
    #[serde(serialize_with = "serialize_hex")]
    #[schema(value_type = String)]
    pub request_bytes: Vec<u8>,
    #[serde(serialize_with = "serialize_hex")]
    #[schema(value_type = String)]
    pub relay_instructions_bytes: Vec<u8>,
    /// 源链出块时间（unix 秒）
    pub timestamp: i64,
}

pub(crate) fn serialize_u256<S: Serializer>(v: &U256, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&v.to_string())
}

fn serialize_hex<S: Serializer>(bytes: &Vec<u8>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&hex_utils::encode_prefixed(bytes))
}

/// 转发生命周期状态
///
/// `pending` 在队列中等待投递；`underpaid` 与 `unsupported` 在校验期产生且终态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RelayStatus {
    Pending,
    Submitted,
    Failed,
    Underpaid,
    Unsupported,
}

impl RelayStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayStatus::Pending => "pending",
            RelayStatus::Submitted => "submitted",
            RelayStatus::Failed => "failed",
            RelayStatus::Underpaid => "underpaid",
            RelayStatus::Unsupported => "unsupported",
        }
    }

    /// 终态不再参与调度
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RelayStatus::Pending)
    }
}

/// 注册表中的转发条目
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RelayEntry {
    #[schema(value_type = String)]
    pub id: RequestId,
    pub status: RelayStatus,
    pub request_for_execution: RequestForExecution,
    /// 解码后的执行请求；前缀未知时为空
    pub instruction: Option<ExecutionRequest>,
    pub quote: SignedQuote,
    /// 校验时按报价算出的成本（源链原生最小单位）
    #[serde(serialize_with = "serialize_u256")]
    #[schema(value_type = String)]
    pub estimate: U256,
    /// 目的链交易标识，按提交顺序追加
    pub txs: Vec<String>,
    /// 终态原因（失败/不支持时的诊断信息）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_cause: Option<String>,
}
