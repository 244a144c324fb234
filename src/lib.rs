//! IronRelay - 跨链执行/报价服务
//!
//! 无托管转发：签发 EQ01 报价、摄取源链执行请求事件、投递目的链交易

pub mod api;
pub mod app_state;
pub mod chains;
pub mod codec;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod metrics;
pub mod service;
pub mod utils;

// 重新导出常用类型
pub use app_state::AppState;
pub use error::{AppError, AppErrorCode};

// 企业级标准：统一模块导出
pub mod prelude {
    pub use crate::{
        app_state::AppState,
        chains::{AdapterError, AdapterRegistry, ChainAdapter},
        codec::{ExecutionRequest, RelayInstruction, SignedQuote},
        domain::{ChainId, RelayEntry, RelayStatus, RequestId},
        error::{AppError, AppErrorCode},
    };
}
