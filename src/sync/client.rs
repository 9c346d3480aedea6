// 离线优先的客户端
// 先走网络；断网时读请求回退到缓存，写请求进入同步队列，登录注册直接失败

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::action::{Method, is_auth_endpoint};
use super::cache::ResponseCache;
use super::error::SyncError;
use super::gateway::{GatewayRequest, HttpGateway, RequestGateway};
use super::queue::{DrainOutcome, DrainState, SyncQueue};
use super::store::{FileStore, KeyValueStore};
use crate::config::ClientConfig;

/// 一次调用的结果
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    Fresh(Value),
    /// 断网时返回的缓存数据，界面应提示数据可能过期
    Stale {
        body: Value,
        cached_at: DateTime<Utc>,
    },
    /// 写请求已进入同步队列
    Queued { seq: u64 },
    /// 写请求排在队列后面，随后的重放已经把它送达
    Delivered { seq: u64 },
}

impl CallOutcome {
    pub fn body(&self) -> Option<&Value> {
        match self {
            CallOutcome::Fresh(body) | CallOutcome::Stale { body, .. } => Some(body),
            CallOutcome::Queued { .. } | CallOutcome::Delivered { .. } => None,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, CallOutcome::Stale { .. })
    }
}

pub struct OfflineClient<S, G> {
    gateway: G,
    queue: SyncQueue<S>,
    cache: ResponseCache<S>,
    token: Option<String>,
}

impl<S, G> OfflineClient<S, G>
where
    S: KeyValueStore + Clone,
    G: RequestGateway,
{
    pub fn new(store: S, gateway: G) -> Self {
        Self {
            gateway,
            queue: SyncQueue::new(store.clone()),
            cache: ResponseCache::new(store),
            token: None,
        }
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn queue(&self) -> &SyncQueue<S> {
        &self.queue
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub async fn call(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<Value>,
    ) -> Result<CallOutcome, SyncError> {
        // 队列里还有未同步的写请求时，新的写请求排在它们后面，不能插队
        if method.is_mutating() && !is_auth_endpoint(endpoint) && !self.queue.is_empty().await? {
            return self.call_behind_queue(endpoint, method, body).await;
        }

        let request = GatewayRequest::new(endpoint, method)
            .with_body(body.clone())
            .with_token(self.token.clone());

        match self.gateway.call(&request).await {
            Ok(value) => {
                if method == Method::Get {
                    if let Err(e) = self.cache.put(endpoint, &value).await {
                        tracing::warn!("Failed to cache response for {}: {}", endpoint, e);
                    }
                }
                Ok(CallOutcome::Fresh(value))
            }
            Err(error) if error.is_connectivity() => {
                tracing::warn!("Network failed, falling back to offline mode: {}", error);
                if method == Method::Get {
                    return match self.cache.get(endpoint).await? {
                        Some(cached) => Ok(CallOutcome::Stale {
                            body: cached.body,
                            cached_at: cached.cached_at,
                        }),
                        None => Err(SyncError::OfflineNoCache(endpoint.to_string())),
                    };
                }
                let seq = self.queue.enqueue(endpoint, method, body).await?;
                Ok(CallOutcome::Queued { seq })
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn call_behind_queue(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<Value>,
    ) -> Result<CallOutcome, SyncError> {
        // 队首被拒绝时队列不会再前进，新请求也不再排进去
        if let DrainState::Rejected { seq, error } = self.queue.state() {
            return Err(SyncError::Rejected { seq, error });
        }

        let seq = self.queue.enqueue(endpoint, method, body).await?;
        match self.reconnected().await? {
            DrainOutcome::Rejected {
                seq: rejected,
                error,
                ..
            } if rejected == seq => {
                // 被拒绝的正是这条，交还给调用方，不留在队列里
                self.queue.discard_head().await?;
                Err(SyncError::Gateway(error))
            }
            _ if self.queue.is_pending(seq).await? => Ok(CallOutcome::Queued { seq }),
            _ => Ok(CallOutcome::Delivered { seq }),
        }
    }

    /// 丢弃被服务器拒绝的队首请求，然后继续重放
    pub async fn discard_rejected(&self) -> Result<DrainOutcome, SyncError> {
        if matches!(self.queue.state(), DrainState::Rejected { .. }) {
            if let Some(action) = self.queue.discard_head().await? {
                tracing::info!("Dropped rejected {} {}", action.method, action.endpoint);
            }
        }
        self.reconnected().await
    }

    /// 检测到网络恢复时调用，重放队列
    pub async fn reconnected(&self) -> Result<DrainOutcome, SyncError> {
        self.queue.drain(&self.gateway, self.token.as_deref()).await
    }
}

impl OfflineClient<FileStore, HttpGateway> {
    /// 按配置打开本地存储目录和 HTTP 网关，上次未同步的请求会保留下来
    pub async fn from_config(config: &ClientConfig) -> Result<Self, SyncError> {
        let store = FileStore::open(&config.store_dir).await?;
        let gateway = HttpGateway::from_config(config)?;
        Ok(Self::new(store, gateway))
    }
}
