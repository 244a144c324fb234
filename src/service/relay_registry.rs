//! 转发注册表
//!
//! 进程级权威状态：id → RelayEntry 映射加 FIFO 待处理队列。
//! `admit` 是唯一的插入口（带守卫，等价于按键 compare-and-set），
//! 保证同一 id 全进程生命周期只有一个条目、至多一次并发投递。

use std::collections::{HashMap, VecDeque};

use tokio::sync::Mutex;

use crate::domain::{RelayEntry, RelayStatus, RequestId};

#[derive(Default)]
struct RegistryInner {
    entries: HashMap<String, RelayEntry>,
    pending: VecDeque<RequestId>,
}

pub struct RelayRegistry {
    inner: Mutex<RegistryInner>,
}

impl RelayRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    /// 守卫插入：id 不存在时写入并入队，返回 true；已存在时不做任何事
    pub async fn admit(&self, entry: RelayEntry) -> bool {
        let key = entry.id.canonical();
        let mut inner = self.inner.lock().await;
        if inner.entries.contains_key(&key) {
            return false;
        }
        let id = entry.id.clone();
        let enqueue = entry.status == RelayStatus::Pending;
        inner.entries.insert(key, entry);
        if enqueue {
            inner.pending.push_back(id);
        }
        true
    }

    pub async fn get(&self, id: &RequestId) -> Option<RelayEntry> {
        let inner = self.inner.lock().await;
        inner.entries.get(&id.canonical()).cloned()
    }

    /// 取出队首待处理 id
    pub async fn pop_pending(&self) -> Option<RequestId> {
        let mut inner = self.inner.lock().await;
        inner.pending.pop_front()
    }

    /// 瞬时失败后重新入队
    pub async fn requeue(&self, id: RequestId) {
        let mut inner = self.inner.lock().await;
        inner.pending.push_back(id);
    }

    /// 原子地改状态并追加交易标识
    pub async fn update(
        &self,
        id: &RequestId,
        status: RelayStatus,
        txs: Vec<String>,
        failure_cause: Option<String>,
    ) {
        let mut inner = self.inner.lock().await;
        if let Some(entry) = inner.entries.get_mut(&id.canonical()) {
            entry.status = status;
            entry.txs.extend(txs);
            if failure_cause.is_some() {
                entry.failure_cause = failure_cause;
            }
        }
    }

    pub async fn entry_count(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn pending_count(&self) -> usize {
        self.inner.lock().await.pending.len()
    }
}

impl Default for RelayRegistry {
    fn default() -> Self {
        Self::new()
    }
}
