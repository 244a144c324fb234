//! HTTP API 层
//!
//! 路由、输入校验与错误映射。成功返回 JSON（大整数为十进制字符串），
//! 失败返回 HTTP 状态码 + 纯文本消息。

use std::sync::Arc;

use axum::{middleware::from_fn, response::IntoResponse, routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;

use crate::{app_state::AppState, metrics};

pub mod estimate_api;
pub mod middleware;
pub mod quote_api;
pub mod request_api;
pub mod status_api;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "IronRelay API",
        version = "0.1.0",
        description = "Cross-chain executor / quoter service"
    ),
    paths(
        quote_api::get_quote,
        estimate_api::get_estimate,
        request_api::build_vaa_v1,
        request_api::build_modular,
        status_api::get_status,
    ),
    tags(
        (name = "quote", description = "报价与成本估算"),
        (name = "request", description = "请求载荷构造"),
        (name = "status", description = "转发生命周期查询"),
    )
)]
pub struct ApiDoc;

/// 构建完整路由
pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v0/quote/:src_chain/:dst_chain", get(quote_api::get_quote))
        .route(
            "/v0/estimate/:quote/:relay_instructions",
            get(estimate_api::get_estimate),
        )
        .route(
            "/v0/request/VAAv1/:chain/:emitter/:sequence",
            get(request_api::build_vaa_v1),
        )
        .route(
            "/v0/request/MM/:chain/:emitter/:sequence/:payload",
            get(request_api::build_modular),
        )
        .route("/v0/status/:id", get(status_api::get_status))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_endpoint))
        .route("/openapi.json", get(openapi_json))
        .layer(from_fn(middleware::trace_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// 存活检查
async fn healthz() -> &'static str {
    "ok"
}

/// Prometheus 文本指标
async fn metrics_endpoint() -> impl IntoResponse {
    metrics::render_prometheus()
}

/// OpenAPI 文档
async fn openapi_json() -> impl IntoResponse {
    axum::Json(ApiDoc::openapi())
}
