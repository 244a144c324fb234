// 报价 API
// GET /v0/quote/:src_chain/:dst_chain

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::{
    app_state::AppState,
    domain::{ChainId, RuntimeFamily, UniversalAddress},
    error::AppError,
    metrics,
    utils::{hex_utils, time_utils},
};

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    /// EQ01 字节（0x 前缀十六进制）
    pub signed_quote: String,
}

/// GET /v0/quote/:src_chain/:dst_chain
///
/// 签发一张从源链到目的链的 EQ01 报价：目的链 gas 价格从链上实时获取，
/// 双边原生币 USD 价格走价格缓存，收款地址与 base fee 来自源链配置。
#[utoipa::path(
    get,
    path = "/v0/quote/{src_chain}/{dst_chain}",
    params(
        ("src_chain" = u16, Path, description = "Source chain id"),
        ("dst_chain" = u16, Path, description = "Destination chain id")
    ),
    responses(
        (status = 200, description = "Signed quote issued", body = QuoteResponse),
        (status = 400, description = "Unsupported chain or price unavailable")
    ),
    tag = "quote"
)]
pub async fn get_quote(
    State(state): State<Arc<AppState>>,
    Path((src_chain, dst_chain)): Path<(ChainId, ChainId)>,
) -> Result<Json<QuoteResponse>, AppError> {
    let result = issue_quote(&state, src_chain, dst_chain).await;
    match &result {
        Ok(_) => metrics::count_ok("/v0/quote"),
        Err(_) => metrics::count_err("/v0/quote"),
    }
    result
}

async fn issue_quote(
    state: &AppState,
    src_chain: ChainId,
    dst_chain: ChainId,
) -> Result<Json<QuoteResponse>, AppError> {
    let src = state
        .config
        .chain(src_chain)
        .ok_or_else(|| AppError::chain_not_supported(src_chain))?;
    let dst = state
        .config
        .chain(dst_chain)
        .ok_or_else(|| AppError::chain_not_supported(dst_chain))?;
    let dst_adapter = state
        .adapters
        .get(dst_chain)
        .ok_or_else(|| AppError::chain_not_supported(dst_chain))?;

    let payee: UniversalAddress = src
        .payee_address
        .parse()
        .map_err(|e: String| AppError::internal(format!("bad payee config: {}", e)))?;
    // 源链是 EVM 家族时收款地址必须是 EVM 形式
    if src.runtime_family == RuntimeFamily::Evm && !payee.is_evm_form() {
        return Err(AppError::internal(format!(
            "payee for chain {} is not an EVM address",
            src_chain
        )));
    }

    let gas_price = dst_adapter.get_gas_price().await?;
    if gas_price > ethers::types::U256::from(u64::MAX) {
        return Err(AppError::upstream("destination gas price out of range"));
    }

    let (src_price, dst_price) = state
        .price_service
        .get_prices(&src.price_asset_id, &dst.price_asset_id)
        .await?;

    let expiry = time_utils::current_timestamp_u64() + state.config.quoter.quote_ttl_secs;
    let quote = state.quote_engine.issue(
        payee,
        src_chain,
        dst_chain,
        expiry,
        src.base_fee,
        gas_price.as_u64(),
        src_price,
        dst_price,
    )?;

    tracing::info!(
        src_chain = src_chain,
        dst_chain = dst_chain,
        dst_gas_price = gas_price.as_u64(),
        expiry = expiry,
        "quote issued"
    );
    metrics::inc_quote_issued();

    Ok(Json(QuoteResponse {
        signed_quote: hex_utils::encode_prefixed(&quote.encode()),
    }))
}
