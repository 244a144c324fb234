// 状态查询 API
// GET /v0/status/:id

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{app_state::AppState, domain::RelayEntry, error::AppError, metrics};

/// GET /v0/status/:id
///
/// 查询一次执行请求的生命周期状态。首次观察到一个可转发的请求时，
/// 这个端点会把它准入注册表并排队 —— 轮询即启动转发。
/// 对已知 id 是幂等读取，不会产生重复条目。
#[utoipa::path(
    get,
    path = "/v0/status/{id}",
    params(
        ("id" = String, Path, description = "chainId(u16) ‖ chain-local locator, hex")
    ),
    responses(
        (status = 200, description = "Lifecycle record", body = RelayEntry),
        (status = 400, description = "Malformed id, bad quote or unsupported chain"),
        (status = 404, description = "No execution request found for this id")
    ),
    tag = "status"
)]
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RelayEntry>, AppError> {
    match state.status_service.status(&id).await {
        Ok(entry) => {
            metrics::count_ok("/v0/status");
            Ok(Json(entry))
        }
        Err(e) => {
            metrics::count_err("/v0/status");
            Err(e.into())
        }
    }
}
