//! 集成测试共用工具
//!
//! 提供可编程的 mock 链适配器与一套双 EVM 链的测试配置。

#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use ethers::types::U256;
use ironrelay::{
    app_state::AppState,
    chains::{AdapterError, AdapterRegistry, ChainAdapter},
    codec::{self, ExecutionRequest, RelayInstruction, SignedQuote},
    config::{
        ChainEntry, Config, LoggingConfig, QuoterConfig, RelayConfig, ServerConfig,
        SigningKeysConfig,
    },
    domain::{ChainId, RequestForExecution, RuntimeFamily, UniversalAddress},
};

pub const TEST_QUOTER_KEY: &str =
    "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
pub const SRC_CHAIN: ChainId = 2;
pub const DST_CHAIN: ChainId = 4;

/// 可编程 mock 适配器
pub struct MockAdapter {
    chain_id: ChainId,
    pub gas_price: U256,
    /// get_request 的固定返回
    pub request: Mutex<Option<RequestForExecution>>,
    /// relay_* 的逐次返回队列
    pub relay_outcomes: Mutex<VecDeque<Result<Vec<String>, AdapterError>>>,
    pub relay_calls: AtomicUsize,
}

impl MockAdapter {
    pub fn new(chain_id: ChainId) -> Self {
        Self {
            chain_id,
            gas_price: U256::from(200u64),
            request: Mutex::new(None),
            relay_outcomes: Mutex::new(VecDeque::new()),
            relay_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_request(&self, rfe: Option<RequestForExecution>) {
        *self.request.lock().unwrap() = rfe;
    }

    pub fn push_relay_outcome(&self, outcome: Result<Vec<String>, AdapterError>) {
        self.relay_outcomes.lock().unwrap().push_back(outcome);
    }

    fn next_outcome(&self) -> Result<Vec<String>, AdapterError> {
        self.relay_calls.fetch_add(1, Ordering::SeqCst);
        self.relay_outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(vec!["0xmock".to_string()]))
    }
}

#[async_trait]
impl ChainAdapter for MockAdapter {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    async fn get_gas_price(&self) -> Result<U256, AdapterError> {
        Ok(self.gas_price)
    }

    async fn get_request(
        &self,
        _locator: &[u8],
    ) -> Result<Option<RequestForExecution>, AdapterError> {
        Ok(self.request.lock().unwrap().clone())
    }

    async fn relay_vaa_v1(
        &self,
        _rfe: &RequestForExecution,
        _request: &ExecutionRequest,
        _attested_bytes: &[u8],
    ) -> Result<Vec<String>, AdapterError> {
        self.next_outcome()
    }

    async fn relay_modular(
        &self,
        _rfe: &RequestForExecution,
        _request: &ExecutionRequest,
    ) -> Result<Vec<String>, AdapterError> {
        self.next_outcome()
    }
}

fn chain_entry(chain_id: ChainId, name: &str) -> ChainEntry {
    ChainEntry {
        chain_id,
        name: name.to_string(),
        rpc: "http://127.0.0.1:1".to_string(),
        runtime_family: RuntimeFamily::Evm,
        base_fee: 0,
        payee_address: format!("0x{}{}", "00".repeat(12), "aa".repeat(20)),
        gas_price_decimals: 18,
        native_decimals: 18,
        executor_address: format!("0x{}", "bb".repeat(20)),
        evm_chain_id: Some(1),
        signing_key_ref: None,
        price_asset_id: format!("{}-native", name),
    }
}

pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
        },
        logging: LoggingConfig {
            level: "warn".to_string(),
            format: "text".to_string(),
            enable_file_logging: false,
            log_file_path: None,
        },
        quoter: QuoterConfig {
            quoter_key: TEST_QUOTER_KEY.to_string(),
            allowed_quoters: vec![],
            quote_ttl_secs: 3600,
            guardian_url: "http://127.0.0.1:1".to_string(),
            price_api_url: "http://127.0.0.1:1".to_string(),
        },
        keys: SigningKeysConfig {
            eth_key: None,
            sol_key: None,
        },
        relay: RelayConfig {
            sleep_secs: 1,
            max_backoff_secs: 4,
        },
        chains: vec![chain_entry(SRC_CHAIN, "srcchain"), chain_entry(DST_CHAIN, "dstchain")],
    }
}

pub struct TestHarness {
    pub state: Arc<AppState>,
    pub config: Arc<Config>,
    pub src_adapter: Arc<MockAdapter>,
    pub dst_adapter: Arc<MockAdapter>,
}

pub fn test_harness() -> TestHarness {
    let config = Arc::new(test_config());
    let src_adapter = Arc::new(MockAdapter::new(SRC_CHAIN));
    let dst_adapter = Arc::new(MockAdapter::new(DST_CHAIN));
    let mut adapters = AdapterRegistry::new();
    adapters.insert(src_adapter.clone());
    adapters.insert(dst_adapter.clone());
    let state = Arc::new(AppState::with_adapters(config.clone(), Arc::new(adapters)).unwrap());
    TestHarness {
        state,
        config,
        src_adapter,
        dst_adapter,
    }
}

/// 签发一张 src → dst 的测试报价
pub fn issue_test_quote(state: &AppState) -> SignedQuote {
    let payee = format!("0x{}{}", "00".repeat(12), "aa".repeat(20))
        .parse::<UniversalAddress>()
        .unwrap();
    state
        .quote_engine
        .issue(
            payee,
            SRC_CHAIN,
            DST_CHAIN,
            now() + 3600,
            100,
            200,
            300,
            400,
        )
        .unwrap()
}

/// 构造一条带有效内嵌报价的 RFE
pub fn signed_rfe(
    state: &AppState,
    request: &ExecutionRequest,
    amt_paid: U256,
) -> RequestForExecution {
    let quote = issue_test_quote(state);
    let instructions = codec::encode_relay_instructions(&[RelayInstruction::Gas {
        gas_limit: 1000,
        msg_value: 0,
    }]);
    RequestForExecution {
        quoter_address: quote.quoter_address,
        amt_paid,
        dst_chain: DST_CHAIN,
        dst_addr: UniversalAddress::from_slice(&[0u8; 32]).unwrap(),
        refund_addr: UniversalAddress::from_slice(&[0u8; 32]).unwrap(),
        signed_quote_bytes: quote.encode(),
        request_bytes: request.encode(),
        relay_instructions_bytes: instructions,
        timestamp: now() as i64,
    }
}

/// EVM 形状的请求 id：chainId ‖ txHash(32) ‖ logIndex(u256)
pub fn evm_request_id(chain: ChainId, tx_byte: u8, log_index: u8) -> String {
    let mut raw = Vec::with_capacity(66);
    raw.extend_from_slice(&chain.to_be_bytes());
    raw.extend_from_slice(&[tx_byte; 32]);
    raw.extend_from_slice(&[0u8; 31]);
    raw.push(log_index);
    format!("0x{}", hex::encode(raw))
}

pub fn sample_vaa_request() -> ExecutionRequest {
    ExecutionRequest::VaaV1 {
        emitter_chain: SRC_CHAIN,
        emitter_address: UniversalAddress::from_slice(&[0x11; 32]).unwrap(),
        sequence: 7,
    }
}

pub fn sample_modular_request() -> ExecutionRequest {
    ExecutionRequest::NttV1 {
        src_chain: SRC_CHAIN,
        src_manager: UniversalAddress::from_slice(&[0x22; 32]).unwrap(),
        message_id: [0x33; 32],
    }
}

pub fn now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}
