// 离线同步队列
// 断网时写请求追加到本地日志，联网后按入队顺序逐条重放。
// 任意一条重放失败立即停下，失败的这条和之后的都原样保留，下次从它继续。
// 被服务器拒绝（4xx）的请求不会自动重试，需要调用方显式丢弃后才能继续。

use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::action::{Method, QueuedAction, is_auth_endpoint};
use super::error::{GatewayError, StoreError, SyncError};
use super::gateway::{GatewayRequest, RequestGateway};
use super::store::KeyValueStore;

const QUEUE_KEY: &str = "sync:queue";

/// 队列的持久化格式，序号和日志放在同一条记录里一起写
#[derive(Debug, Default, Serialize, Deserialize)]
struct QueueLog {
    next_seq: u64,
    actions: Vec<QueuedAction>,
}

/// 重放状态机
#[derive(Debug, Clone, PartialEq)]
pub enum DrainState {
    Idle,
    Draining,
    /// 上一次重放停在 `seq` 这条上，下次 drain 会重试
    Blocked { seq: u64, error: GatewayError },
    /// `seq` 被服务器拒绝，丢弃之前不再重放
    Rejected { seq: u64, error: GatewayError },
}

/// 一次 drain 的结果
#[derive(Debug, Clone, PartialEq)]
pub enum DrainOutcome {
    /// 队列已清空
    Completed { replayed: usize },
    /// 重放到 `seq` 失败，剩余 `remaining` 条（含失败的这条）
    Halted {
        replayed: usize,
        seq: u64,
        remaining: usize,
        error: GatewayError,
    },
    /// 队首 `seq` 被服务器拒绝，需要先 `discard_head`
    Rejected {
        replayed: usize,
        seq: u64,
        remaining: usize,
        error: GatewayError,
    },
    /// 已有一次 drain 在进行，本次触发被合并
    AlreadyRunning,
}

pub struct SyncQueue<S> {
    store: S,
    state: Mutex<DrainState>,
    // 串行化对日志的读-改-写，不在网络请求期间持有
    log_lock: tokio::sync::Mutex<()>,
}

/// drain 结束（包括 future 被丢弃）时把状态从 Draining 复位
struct DrainGuard<'a> {
    state: &'a Mutex<DrainState>,
    next: DrainState,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        *state = std::mem::replace(&mut self.next, DrainState::Idle);
    }
}

impl<S: KeyValueStore> SyncQueue<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            state: Mutex::new(DrainState::Idle),
            log_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn state(&self) -> DrainState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    async fn load(&self) -> Result<QueueLog, StoreError> {
        match self.store.get(QUEUE_KEY).await? {
            Some(json) => serde_json::from_str(&json).map_err(|e| StoreError::Corrupt {
                key: QUEUE_KEY.to_string(),
                reason: e.to_string(),
            }),
            None => Ok(QueueLog::default()),
        }
    }

    async fn save(&self, log: &QueueLog) -> Result<(), StoreError> {
        let json = serde_json::to_string(log).map_err(|e| StoreError::Corrupt {
            key: QUEUE_KEY.to_string(),
            reason: e.to_string(),
        })?;
        self.store.set(QUEUE_KEY, json).await
    }

    /// 追加一条写请求，返回它的序号
    ///
    /// 读请求和登录/注册请求不入队。
    pub async fn enqueue(
        &self,
        endpoint: &str,
        method: Method,
        payload: Option<Value>,
    ) -> Result<u64, SyncError> {
        if is_auth_endpoint(endpoint) {
            return Err(SyncError::AuthOffline);
        }
        if !method.is_mutating() {
            return Err(SyncError::NotQueueable {
                endpoint: endpoint.to_string(),
                method: method.to_string(),
            });
        }

        let _guard = self.log_lock.lock().await;
        let mut log = self.load().await?;
        let seq = log.next_seq;
        log.next_seq += 1;
        log.actions.push(QueuedAction {
            seq,
            endpoint: endpoint.to_string(),
            method,
            payload,
            enqueued_at: Utc::now(),
        });
        self.save(&log).await?;

        tracing::info!("Queued {} {} as #{} for sync", method, endpoint, seq);
        Ok(seq)
    }

    /// 按序号升序列出所有待重放请求
    pub async fn pending(&self) -> Result<Vec<QueuedAction>, SyncError> {
        let _guard = self.log_lock.lock().await;
        let mut actions = self.load().await?.actions;
        actions.sort_by_key(|a| a.seq);
        Ok(actions)
    }

    pub async fn len(&self) -> Result<usize, SyncError> {
        Ok(self.pending().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool, SyncError> {
        Ok(self.len().await? == 0)
    }

    pub async fn is_pending(&self, seq: u64) -> Result<bool, SyncError> {
        Ok(self.pending().await?.iter().any(|a| a.seq == seq))
    }

    /// 丢弃队首的请求并解除阻塞，返回被丢弃的那条
    ///
    /// 正在重放时不做任何事。
    pub async fn discard_head(&self) -> Result<Option<QueuedAction>, SyncError> {
        if self.state() == DrainState::Draining {
            tracing::debug!("Drain in flight, not discarding");
            return Ok(None);
        }

        let discarded = {
            let _guard = self.log_lock.lock().await;
            let mut log = self.load().await?;
            let Some(head) = log
                .actions
                .iter()
                .enumerate()
                .min_by_key(|(_, a)| a.seq)
                .map(|(i, _)| i)
            else {
                return Ok(None);
            };
            let action = log.actions.remove(head);
            self.save(&log).await?;
            action
        };

        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if matches!(
                *state,
                DrainState::Blocked { .. } | DrainState::Rejected { .. }
            ) {
                *state = DrainState::Idle;
            }
        }

        tracing::info!(
            "Discarded #{} {} {} from sync queue",
            discarded.seq,
            discarded.method,
            discarded.endpoint
        );
        Ok(Some(discarded))
    }

    async fn front(&self) -> Result<Option<QueuedAction>, StoreError> {
        let _guard = self.log_lock.lock().await;
        Ok(self.load().await?.actions.into_iter().min_by_key(|a| a.seq))
    }

    /// 只删除指定序号的那一条
    async fn remove(&self, seq: u64) -> Result<usize, StoreError> {
        let _guard = self.log_lock.lock().await;
        let mut log = self.load().await?;
        log.actions.retain(|a| a.seq != seq);
        self.save(&log).await?;
        Ok(log.actions.len())
    }

    /// 重放队列
    ///
    /// 同一时间只允许一个 drain，重复触发直接返回 `AlreadyRunning`。
    /// 队首被拒绝后不再发请求，一直返回 `Rejected` 直到它被丢弃。
    /// 本地存储出错时返回 `Err`，日志本身不受影响。
    pub async fn drain<G: RequestGateway>(
        &self,
        gateway: &G,
        token: Option<&str>,
    ) -> Result<DrainOutcome, SyncError> {
        let rejected = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            let rejected = match &*state {
                DrainState::Draining => {
                    tracing::debug!("Drain already in flight, coalescing trigger");
                    return Ok(DrainOutcome::AlreadyRunning);
                }
                DrainState::Rejected { seq, error } => Some((*seq, error.clone())),
                _ => None,
            };
            if rejected.is_none() {
                *state = DrainState::Draining;
            }
            rejected
        };
        if let Some((seq, error)) = rejected {
            return Ok(DrainOutcome::Rejected {
                replayed: 0,
                seq,
                remaining: self.len().await?,
                error,
            });
        }
        let mut guard = DrainGuard {
            state: &self.state,
            next: DrainState::Idle,
        };

        let mut replayed = 0;
        while let Some(action) = self.front().await? {
            let request = GatewayRequest::new(action.endpoint.clone(), action.method)
                .with_body(action.payload.clone())
                .with_token(token.map(str::to_string));

            match gateway.call(&request).await {
                Ok(_) => {
                    self.remove(action.seq).await?;
                    replayed += 1;
                    tracing::debug!("Replayed #{} {} {}", action.seq, action.method, action.endpoint);
                }
                Err(error) if error.is_rejection() => {
                    let remaining = self.len().await?;
                    tracing::warn!(
                        "Server rejected #{} {} {}, holding {} action(s) until it is discarded: {}",
                        action.seq,
                        action.method,
                        action.endpoint,
                        remaining,
                        error
                    );
                    guard.next = DrainState::Rejected {
                        seq: action.seq,
                        error: error.clone(),
                    };
                    return Ok(DrainOutcome::Rejected {
                        replayed,
                        seq: action.seq,
                        remaining,
                        error,
                    });
                }
                Err(error) => {
                    let remaining = self.len().await?;
                    tracing::warn!(
                        "Replay of #{} {} {} failed, {} action(s) left: {}",
                        action.seq,
                        action.method,
                        action.endpoint,
                        remaining,
                        error
                    );
                    guard.next = DrainState::Blocked {
                        seq: action.seq,
                        error: error.clone(),
                    };
                    return Ok(DrainOutcome::Halted {
                        replayed,
                        seq: action.seq,
                        remaining,
                        error,
                    });
                }
            }
        }

        tracing::info!("Sync queue drained, {} action(s) replayed", replayed);
        Ok(DrainOutcome::Completed { replayed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::store::MemoryStore;

    #[tokio::test]
    async fn sequence_numbers_keep_growing_after_removal() {
        let queue = SyncQueue::new(MemoryStore::new());
        let first = queue.enqueue("/transactions/add", Method::Post, None).await.unwrap();
        queue.remove(first).await.unwrap();
        let second = queue.enqueue("/roster/update", Method::Put, None).await.unwrap();
        assert!(second > first);
        assert_eq!(queue.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn discard_head_takes_the_oldest_action() {
        let queue = SyncQueue::new(MemoryStore::new());
        assert_eq!(queue.discard_head().await.unwrap(), None);

        let first = queue.enqueue("/transactions/add", Method::Post, None).await.unwrap();
        let second = queue.enqueue("/roster/update", Method::Put, None).await.unwrap();
        let discarded = queue.discard_head().await.unwrap().unwrap();
        assert_eq!(discarded.seq, first);
        assert!(!queue.is_pending(first).await.unwrap());
        assert!(queue.is_pending(second).await.unwrap());
    }

    #[tokio::test]
    async fn refuses_reads_and_auth() {
        let queue = SyncQueue::new(MemoryStore::new());
        assert!(matches!(
            queue.enqueue("/roster/week", Method::Get, None).await,
            Err(SyncError::NotQueueable { .. })
        ));
        assert!(matches!(
            queue.enqueue("/auth/login", Method::Post, None).await,
            Err(SyncError::AuthOffline)
        ));
        assert!(queue.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn corrupt_log_is_a_persistence_error() {
        let store = MemoryStore::new();
        store.set(QUEUE_KEY, "not json".into()).await.unwrap();
        let queue = SyncQueue::new(store);
        assert!(matches!(
            queue.enqueue("/transactions/add", Method::Post, None).await,
            Err(SyncError::Persistence(StoreError::Corrupt { .. }))
        ));
    }
}
