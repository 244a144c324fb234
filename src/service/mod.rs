//! 业务服务模块

pub mod price_service;
pub mod quote_engine;
pub mod relay_registry;
pub mod relay_worker;
pub mod status_service;
