use std::sync::Arc;

use anyhow::Context;

use crate::{
    chains::AdapterRegistry,
    config::Config,
    domain::EvmAddress,
    service::{
        price_service::PriceService, quote_engine::QuoteEngine, relay_registry::RelayRegistry,
        status_service::StatusService,
    },
};

/// 应用状态
/// 包含所有共享资源
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub quote_engine: Arc<QuoteEngine>,
    pub price_service: Arc<PriceService>,
    pub adapters: Arc<AdapterRegistry>,
    pub registry: Arc<RelayRegistry>,
    pub status_service: Arc<StatusService>,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(config: Arc<Config>) -> anyhow::Result<Self> {
        let adapters =
            Arc::new(AdapterRegistry::from_config(&config).context("failed to build adapters")?);
        Self::with_adapters(config, adapters)
    }

    /// 注入适配器的构造（测试用同一入口）
    pub fn with_adapters(
        config: Arc<Config>,
        adapters: Arc<AdapterRegistry>,
    ) -> anyhow::Result<Self> {
        let extra_allowed: Vec<EvmAddress> = config
            .quoter
            .allowed_quoters
            .iter()
            .map(|s| s.parse::<EvmAddress>())
            .collect::<Result<_, _>>()
            .map_err(|e| anyhow::anyhow!("bad allowed_quoters entry: {}", e))?;
        let quote_engine = Arc::new(
            QuoteEngine::new(&config.quoter.quoter_key, &extra_allowed)
                .context("failed to initialize quote engine")?,
        );
        tracing::info!(quoter = %quote_engine.quoter_address(), "quote engine initialized");

        let price_service = Arc::new(PriceService::new(config.quoter.price_api_url.clone()));
        let registry = Arc::new(RelayRegistry::new());
        let status_service = Arc::new(StatusService::new(
            config.clone(),
            adapters.clone(),
            registry.clone(),
            quote_engine.clone(),
        ));

        Ok(Self {
            config,
            quote_engine,
            price_service,
            adapters,
            registry,
            status_service,
        })
    }
}
