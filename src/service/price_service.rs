//! 价格服务
//!
//! 源/目的链原生币的短时 USD 价格缓存。价格从 CoinGecko 拉取，
//! 以 10^-10 USD 定点 u64 存储供报价引擎使用，有效期 5 分钟。

use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::Context;
use chrono::{DateTime, Utc};
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;

/// 缓存有效期
const PRICE_TTL_SECS: i64 = 300;
/// 定点精度：10^-10 USD
const PRICE_SCALE: u32 = 10;

#[derive(Debug, Error)]
pub enum PriceError {
    #[error("price for {0} is expired or unavailable")]
    ExpiredPrice(String),
    #[error("price for {asset} out of range: {value}")]
    RangeOutOfBounds { asset: String, value: String },
    #[error("price source error: {0}")]
    Source(String),
}

/// 缓存的定点价格
#[derive(Debug, Clone)]
struct CachedPrice {
    /// 10^-10 USD 定点
    usd: u64,
    expiry: DateTime<Utc>,
}

/// CoinGecko simple/price 响应
#[derive(Debug, Deserialize)]
struct CoinGeckoEntry {
    usd: f64,
}

/// 价格服务
pub struct PriceService {
    cache: Arc<RwLock<HashMap<String, CachedPrice>>>,
    client: reqwest::Client,
    base_url: String,
}

impl PriceService {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            client,
            base_url,
        }
    }

    /// 刷新已过期的资产价格（一次批量请求）
    pub async fn update_price_cache(&self, asset_ids: &[&str]) -> Result<(), PriceError> {
        let now = Utc::now();
        let mut stale: Vec<&str> = Vec::new();
        {
            let cache = self.cache.read().await;
            for id in asset_ids {
                match cache.get(*id) {
                    Some(entry) if entry.expiry > now => {}
                    _ => {
                        if !stale.contains(id) {
                            stale.push(id);
                        }
                    }
                }
            }
        }
        if stale.is_empty() {
            return Ok(());
        }

        let url = format!(
            "{}/api/v3/simple/price?ids={}&vs_currencies=usd",
            self.base_url,
            stale.join(",")
        );
        tracing::debug!(url = %url, "fetching prices");

        let fetched = self
            .fetch(&url)
            .await
            .map_err(|e| PriceError::Source(format!("{:#}", e)))?;

        let expiry = Utc::now() + chrono::Duration::seconds(PRICE_TTL_SECS);
        let mut cache = self.cache.write().await;
        for (id, entry) in fetched {
            let usd = scale_price(&id, entry.usd)?;
            tracing::info!(asset = %id, usd_fixed = usd, "price updated");
            cache.insert(id, CachedPrice { usd, expiry });
        }
        Ok(())
    }

    async fn fetch(&self, url: &str) -> anyhow::Result<HashMap<String, CoinGeckoEntry>> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", "IronRelay/0.1")
            .send()
            .await
            .context("price request failed")?;
        if !response.status().is_success() {
            anyhow::bail!("price source returned {}", response.status());
        }
        response.json().await.context("malformed price response")
    }

    /// 取源/目的资产的定点价格；刷新后仍过期则报错
    pub async fn get_prices(&self, src_id: &str, dst_id: &str) -> Result<(u64, u64), PriceError> {
        if let Err(e) = self.update_price_cache(&[src_id, dst_id]).await {
            // 刷新失败不立即致命：缓存里可能还有未过期的值
            tracing::warn!(error = %e, "price cache refresh failed");
        }
        let now = Utc::now();
        let cache = self.cache.read().await;
        let src = cache
            .get(src_id)
            .filter(|p| p.expiry > now)
            .ok_or_else(|| PriceError::ExpiredPrice(src_id.to_string()))?;
        let dst = cache
            .get(dst_id)
            .filter(|p| p.expiry > now)
            .ok_or_else(|| PriceError::ExpiredPrice(dst_id.to_string()))?;
        Ok((src.usd, dst.usd))
    }

    /// 测试/运维用：直接写入一个价格（最后写入者生效）
    pub async fn set_price(&self, asset_id: &str, usd_fixed: u64, ttl_secs: i64) {
        let mut cache = self.cache.write().await;
        cache.insert(
            asset_id.to_string(),
            CachedPrice {
                usd: usd_fixed,
                expiry: Utc::now() + chrono::Duration::seconds(ttl_secs),
            },
        );
    }
}

/// 浮点 USD 价格换算为 10^-10 定点，范围 (0, 2^64)
fn scale_price(asset: &str, usd: f64) -> Result<u64, PriceError> {
    let out_of_range = || PriceError::RangeOutOfBounds {
        asset: asset.to_string(),
        value: usd.to_string(),
    };
    let decimal = Decimal::from_f64_retain(usd).ok_or_else(out_of_range)?;
    if decimal <= Decimal::ZERO {
        return Err(out_of_range());
    }
    let scaled = decimal
        .checked_mul(Decimal::from(10u64.pow(PRICE_SCALE)))
        .ok_or_else(out_of_range)?;
    scaled.trunc().to_u64().filter(|v| *v > 0).ok_or_else(out_of_range)
}
