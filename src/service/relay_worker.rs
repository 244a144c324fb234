//! 转发循环
//!
//! 单消费者协作式循环：从待处理队列取 id，按解码后的请求类型分发到
//! 对应链适配器，记录结果。瞬时失败重新入队；revert 类失败置为终态。
//! 外层护栏对未捕获错误做指数退避，成功一轮后计数归零。
//! 停止信号在两次迭代之间检查，退出是协作式的。

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tokio::sync::watch;

use crate::{
    chains::{AdapterError, AdapterRegistry},
    codec::ExecutionRequest,
    config::Config,
    domain::{RelayEntry, RelayStatus, UniversalAddress},
    metrics,
    service::relay_registry::RelayRegistry,
    utils::hex_utils,
};

pub struct RelayWorker {
    config: Arc<Config>,
    registry: Arc<RelayRegistry>,
    adapters: Arc<AdapterRegistry>,
    client: reqwest::Client,
    stop: watch::Receiver<bool>,
}

impl RelayWorker {
    pub fn new(
        config: Arc<Config>,
        registry: Arc<RelayRegistry>,
        adapters: Arc<AdapterRegistry>,
        stop: watch::Receiver<bool>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            config,
            registry,
            adapters,
            client,
            stop,
        }
    }

    /// 主循环：持有到停止信号为止
    pub async fn run(mut self) {
        let sleep_secs = self.config.relay.sleep_secs;
        let max_backoff = self.config.relay.max_backoff_secs;
        let mut retry: u32 = 0;

        tracing::info!(sleep_secs = sleep_secs, "relay worker started");

        loop {
            if *self.stop.borrow() {
                break;
            }
            match self.tick().await {
                Ok(true) => {
                    retry = 0;
                }
                Ok(false) => {
                    retry = 0;
                    self.sleep(Duration::from_secs(sleep_secs)).await;
                }
                Err(e) => {
                    retry = retry.saturating_add(1);
                    let backoff = sleep_secs
                        .saturating_mul(1u64 << retry.min(16))
                        .min(max_backoff);
                    tracing::error!(
                        error = ?e,
                        retry = retry,
                        backoff_secs = backoff,
                        "relay worker iteration failed"
                    );
                    self.sleep(Duration::from_secs(backoff)).await;
                }
            }
        }

        tracing::info!("relay worker stopped");
    }

    /// 可被停止信号打断的休眠
    async fn sleep(&mut self, duration: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.stop.changed() => {}
        }
    }

    /// 处理一个待处理条目；返回是否有工作可做。
    /// 单独暴露是为了能一步步驱动调度（测试与诊断）。
    pub async fn tick(&self) -> Result<bool> {
        let Some(id) = self.registry.pop_pending().await else {
            return Ok(false);
        };
        let entry = self
            .registry
            .get(&id)
            .await
            .context("pending id without a registry entry")?;

        tracing::debug!(id = %id, "dispatching relay");
        self.dispatch(entry).await;
        Ok(true)
    }

    /// 按请求类型分发并记录生命周期转换
    async fn dispatch(&self, entry: RelayEntry) {
        let id = entry.id.clone();
        let dst_chain = entry.request_for_execution.dst_chain;

        let Some(adapter) = self.adapters.get(dst_chain) else {
            self.registry
                .update(
                    &id,
                    RelayStatus::Unsupported,
                    vec![],
                    Some(format!("destination chain {} is not configured", dst_chain)),
                )
                .await;
            metrics::inc_relay_unsupported();
            return;
        };

        let outcome = match &entry.instruction {
            Some(request @ ExecutionRequest::VaaV1 {
                emitter_chain,
                emitter_address,
                sequence,
            }) => match self
                .fetch_vaa(*emitter_chain, emitter_address, *sequence)
                .await
            {
                Ok(vaa) => {
                    adapter
                        .relay_vaa_v1(&entry.request_for_execution, request, &vaa)
                        .await
                }
                Err(e) => Err(e),
            },
            Some(request @ ExecutionRequest::NttV1 { .. }) => {
                adapter
                    .relay_modular(&entry.request_for_execution, request)
                    .await
            }
            Some(ExecutionRequest::CctpV1 { .. }) | Some(ExecutionRequest::CctpV2 { .. }) => {
                Err(AdapterError::Unsupported(
                    "CCTP delivery is not implemented".to_string(),
                ))
            }
            None => Err(AdapterError::Unsupported(
                "unknown request prefix".to_string(),
            )),
        };

        match outcome {
            Ok(txs) => {
                tracing::info!(id = %id, txs = ?txs, "relay submitted");
                self.registry
                    .update(&id, RelayStatus::Submitted, txs, None)
                    .await;
                metrics::inc_relay_submitted();
            }
            Err(AdapterError::Transient(cause)) => {
                tracing::warn!(id = %id, cause = %cause, "transient relay failure, requeueing");
                self.registry.requeue(id).await;
                metrics::inc_relay_requeued();
            }
            Err(AdapterError::Terminal(cause)) => {
                tracing::error!(id = %id, cause = %cause, "terminal relay failure");
                self.registry
                    .update(&id, RelayStatus::Failed, vec![], Some(cause))
                    .await;
                metrics::inc_relay_failed();
            }
            Err(AdapterError::Unsupported(cause)) => {
                tracing::warn!(id = %id, cause = %cause, "relay not supported");
                self.registry
                    .update(&id, RelayStatus::Unsupported, vec![], Some(cause))
                    .await;
                metrics::inc_relay_unsupported();
            }
        }
    }

    /// 从 guardian 接口取回已签名的 VAA
    async fn fetch_vaa(
        &self,
        chain: u16,
        emitter: &UniversalAddress,
        sequence: u64,
    ) -> Result<Vec<u8>, AdapterError> {
        let url = format!(
            "{}/v1/signed_vaa/{}/{}/{}",
            self.config.quoter.guardian_url,
            chain,
            hex::encode(emitter.as_bytes()),
            sequence
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AdapterError::Transient(format!("vaa fetch failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(AdapterError::Transient(format!(
                "vaa fetch returned {}",
                response.status()
            )));
        }
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AdapterError::Transient(format!("vaa fetch malformed body: {}", e)))?;
        let encoded = body
            .get("vaaBytes")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| AdapterError::Transient("vaa not yet available".to_string()))?;
        use base64::Engine;
        match base64::engine::general_purpose::STANDARD.decode(encoded) {
            Ok(bytes) => Ok(bytes),
            // 个别部署返回十六进制形式
            Err(_) => hex_utils::decode(encoded)
                .map_err(|e| AdapterError::Transient(format!("vaa bytes undecodable: {}", e))),
        }
    }
}
