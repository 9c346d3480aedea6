use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use redis::AsyncCommands;

use crate::{
    config::Config,
    utils::{error_codes, error_to_api_response},
};

const RATE_LIMIT_PREFIX: &str = "household:rate:";

/// 按客户端 IP 的固定窗口限流，计数存在 Redis 里
#[derive(Clone)]
pub struct RateLimiter {
    redis: Arc<redis::Client>,
    config: Arc<Config>,
}

/// 优先使用反向代理带过来的 IP，其次是连接地址
fn client_ip(req: &Request<Body>) -> String {
    let remote_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string());

    req.headers()
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .or_else(|| {
            req.headers()
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
        })
        .or(remote_ip.as_deref())
        .unwrap_or("unknown")
        .trim()
        .to_string()
}

impl RateLimiter {
    pub fn new(redis: Arc<redis::Client>, config: Config) -> Self {
        Self {
            redis,
            config: Arc::new(config),
        }
    }

    /// 窗口内的请求计数，第一次计数时设置过期时间
    async fn hit(&self, ip: &str) -> Result<i64, redis::RedisError> {
        let key = format!("{}{}", RATE_LIMIT_PREFIX, ip);
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let count: i64 = conn.incr(&key, 1).await?;
        if count == 1 {
            let _: () = conn
                .expire(&key, self.config.rate_limit_window().as_secs() as i64)
                .await?;
        }
        Ok(count)
    }

    pub async fn check_rate_limit(self: Arc<Self>, req: Request<Body>, next: Next) -> Response {
        let ip = client_ip(&req);

        match self.hit(&ip).await {
            Ok(count) if count > self.config.rate_limit_requests as i64 => {
                tracing::debug!("Rate limit exceeded for {} ({} requests)", ip, count);
                return (
                    StatusCode::TOO_MANY_REQUESTS,
                    error_to_api_response::<()>(
                        error_codes::RATE_LIMIT,
                        format!(
                            "Too many requests, retry in {} seconds",
                            self.config.rate_limit_window().as_secs()
                        ),
                    ),
                )
                    .into_response();
            }
            Ok(_) => {}
            // Redis 不可用时放行，避免把所有请求都拒掉
            Err(e) => tracing::warn!("Rate limiter unavailable, letting request through: {}", e),
        }

        next.run(req).await
    }
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    limiter.check_rate_limit(req, next).await
}
