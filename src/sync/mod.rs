// 离线同步模块
// 客户端侧：请求网关、本地存储、GET 缓存和按序重放的写请求队列

pub mod action;
pub mod cache;
pub mod client;
pub mod error;
pub mod gateway;
pub mod queue;
pub mod store;

pub use action::{Method, QueuedAction, is_auth_endpoint};
pub use cache::{CachedResponse, ResponseCache};
pub use client::{CallOutcome, OfflineClient};
pub use error::{GatewayError, StoreError, SyncError};
pub use gateway::{GatewayRequest, HttpGateway, RequestGateway};
pub use queue::{DrainOutcome, DrainState, SyncQueue};
pub use store::{FileStore, KeyValueStore, MemoryStore, RedisStore};
