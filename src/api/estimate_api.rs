// 成本估算 API
// GET /v0/estimate/:quote/:relay_instructions

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::{
    app_state::AppState,
    codec::{self, SignedQuote},
    domain::RuntimeFamily,
    error::AppError,
    metrics,
    service::quote_engine,
    utils::{hex_utils, time_utils},
};

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EstimateResponse {
    pub quote: SignedQuote,
    /// 源链原生最小单位，十进制字符串
    pub estimate: String,
}

/// GET /v0/estimate/:quote/:relay_instructions
///
/// 按报价与中继指令估算一次执行的源链成本。报价必须通过可信报价方验签。
#[utoipa::path(
    get,
    path = "/v0/estimate/{quote}/{relay_instructions}",
    params(
        ("quote" = String, Path, description = "EQ01 bytes, hex"),
        ("relay_instructions" = String, Path, description = "Relay instruction bytes, hex")
    ),
    responses(
        (status = 200, description = "Estimate computed", body = EstimateResponse),
        (status = 400, description = "Bad quote, bad instructions or unsupported chain")
    ),
    tag = "quote"
)]
pub async fn get_estimate(
    State(state): State<Arc<AppState>>,
    Path((quote_hex, instructions_hex)): Path<(String, String)>,
) -> Result<Json<EstimateResponse>, AppError> {
    let result = compute_estimate(&state, &quote_hex, &instructions_hex).await;
    match &result {
        Ok(_) => metrics::count_ok("/v0/estimate"),
        Err(_) => metrics::count_err("/v0/estimate"),
    }
    result
}

async fn compute_estimate(
    state: &AppState,
    quote_hex: &str,
    instructions_hex: &str,
) -> Result<Json<EstimateResponse>, AppError> {
    let quote_bytes = hex_utils::decode(quote_hex)
        .map_err(|e| AppError::bad_request(format!("invalid quote hex: {}", e)))?;
    let quote = SignedQuote::decode(&quote_bytes)?;
    state
        .quote_engine
        .verify(&quote, time_utils::current_timestamp_u64())?;

    let src = state
        .config
        .chain(quote.src_chain)
        .ok_or_else(|| AppError::chain_not_supported(quote.src_chain))?;
    let dst = state
        .config
        .chain(quote.dst_chain)
        .ok_or_else(|| AppError::chain_not_supported(quote.dst_chain))?;
    if src.runtime_family == RuntimeFamily::Evm {
        quote.payee_as_evm()?;
    }

    let instruction_bytes = hex_utils::decode(instructions_hex)
        .map_err(|e| AppError::bad_request(format!("invalid relay instructions hex: {}", e)))?;
    let instructions = codec::decode_relay_instructions(&instruction_bytes)?;
    let (gas_limit, msg_value) = codec::total_gas_limit_and_msg_value(&instructions)?;

    let estimate = quote_engine::estimate(
        &quote,
        gas_limit,
        msg_value,
        dst.gas_price_decimals,
        src.native_decimals,
        dst.native_decimals,
    )?;

    tracing::debug!(
        src_chain = quote.src_chain,
        dst_chain = quote.dst_chain,
        gas_limit = gas_limit,
        estimate = %estimate,
        "estimate served"
    );
    metrics::inc_estimate_served();

    Ok(Json(EstimateResponse {
        quote,
        estimate: estimate.to_string(),
    }))
}
