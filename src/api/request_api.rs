// 请求载荷构造 API
// GET /v0/request/VAAv1/:chain/:emitter/:sequence
// GET /v0/request/MM/:chain/:emitter/:sequence/:payload

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use sha3::{Digest, Keccak256};

use crate::{
    app_state::AppState,
    codec::ExecutionRequest,
    domain::{ChainId, EvmAddress, UniversalAddress},
    error::AppError,
    metrics,
    utils::hex_utils,
};

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RequestBytesResponse {
    /// 编码后的请求载荷（0x 前缀十六进制）
    pub bytes: String,
}

/// 发射方地址：接受 32 字节规范形式或 20 字节 EVM 形式（左侧补零）
fn parse_emitter(emitter: &str) -> Result<UniversalAddress, AppError> {
    let bytes = hex_utils::decode(emitter)
        .map_err(|e| AppError::bad_request(format!("invalid emitter hex: {}", e)))?;
    match bytes.len() {
        32 => Ok(UniversalAddress::from_slice(&bytes).unwrap()),
        20 => Ok(EvmAddress::from_slice(&bytes).unwrap().to_universal()),
        n => Err(AppError::bad_request(format!(
            "emitter must be 20 or 32 bytes, got {}",
            n
        ))),
    }
}

/// GET /v0/request/VAAv1/:chain/:emitter/:sequence
///
/// 构造 ERV1 请求字节，供链上 requestExecution 调用使用。
#[utoipa::path(
    get,
    path = "/v0/request/VAAv1/{chain}/{emitter}/{sequence}",
    params(
        ("chain" = u16, Path, description = "Emitter chain id"),
        ("emitter" = String, Path, description = "Emitter address, hex"),
        ("sequence" = u64, Path, description = "Message sequence")
    ),
    responses(
        (status = 200, description = "Encoded request", body = RequestBytesResponse),
        (status = 400, description = "Invalid parameters")
    ),
    tag = "request"
)]
pub async fn build_vaa_v1(
    State(_state): State<Arc<AppState>>,
    Path((chain, emitter, sequence)): Path<(ChainId, String, u64)>,
) -> Result<Json<RequestBytesResponse>, AppError> {
    let emitter_address = match parse_emitter(&emitter) {
        Ok(addr) => addr,
        Err(e) => {
            metrics::count_err("/v0/request/VAAv1");
            return Err(e);
        }
    };
    let request = ExecutionRequest::VaaV1 {
        emitter_chain: chain,
        emitter_address,
        sequence,
    };
    metrics::count_ok("/v0/request/VAAv1");
    Ok(Json(RequestBytesResponse {
        bytes: hex_utils::encode_prefixed(&request.encode()),
    }))
}

/// GET /v0/request/MM/:chain/:emitter/:sequence/:payload
///
/// 模块化消息变体：编码为 ERN1，消息 ID 为对
/// chain ‖ emitter ‖ sequence ‖ keccak(payload) 的 keccak 摘要。
#[utoipa::path(
    get,
    path = "/v0/request/MM/{chain}/{emitter}/{sequence}/{payload}",
    params(
        ("chain" = u16, Path, description = "Source chain id"),
        ("emitter" = String, Path, description = "Source manager address, hex"),
        ("sequence" = u64, Path, description = "Message sequence"),
        ("payload" = String, Path, description = "Message payload, hex")
    ),
    responses(
        (status = 200, description = "Encoded request", body = RequestBytesResponse),
        (status = 400, description = "Invalid parameters")
    ),
    tag = "request"
)]
pub async fn build_modular(
    State(_state): State<Arc<AppState>>,
    Path((chain, emitter, sequence, payload)): Path<(ChainId, String, u64, String)>,
) -> Result<Json<RequestBytesResponse>, AppError> {
    let result = encode_modular(chain, &emitter, sequence, &payload);
    match &result {
        Ok(_) => metrics::count_ok("/v0/request/MM"),
        Err(_) => metrics::count_err("/v0/request/MM"),
    }
    result
}

fn encode_modular(
    chain: ChainId,
    emitter: &str,
    sequence: u64,
    payload: &str,
) -> Result<Json<RequestBytesResponse>, AppError> {
    let src_manager = parse_emitter(emitter)?;
    let payload_bytes = hex_utils::decode(payload)
        .map_err(|e| AppError::bad_request(format!("invalid payload hex: {}", e)))?;

    let mut hasher = Keccak256::new();
    hasher.update(chain.to_be_bytes());
    hasher.update(src_manager.as_bytes());
    hasher.update(sequence.to_be_bytes());
    hasher.update(Keccak256::digest(&payload_bytes));
    let message_id: [u8; 32] = hasher.finalize().into();

    let request = ExecutionRequest::NttV1 {
        src_chain: chain,
        src_manager,
        message_id,
    };
    Ok(Json(RequestBytesResponse {
        bytes: hex_utils::encode_prefixed(&request.encode()),
    }))
}
