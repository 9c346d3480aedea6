use axum::{
    Router,
    routing::{get, post},
};
use config::Config;
use redis::Client as RedisClient;
use sqlx::PgPool;
use std::sync::Arc;

pub mod common;
pub mod config;
pub mod error;
pub mod ledger;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod schedule;
pub mod sync;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub redis: Arc<RedisClient>,
}

/// 构建带认证的业务路由，挂在 `api_base_uri` 下
///
/// 登录注册由外部服务提供，这里所有路由都需要 Bearer 令牌。
pub fn build_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        // 可用时间与排班生成
        .route("/schedule/save", post(routes::schedule::save_schedule))
        .route("/schedule/get", get(routes::schedule::get_schedule))
        .route("/schedule/generate-plan", post(routes::schedule::generate_plan))
        // 排班表
        .route("/roster/week", get(routes::roster::get_week))
        .route("/roster/today", get(routes::roster::get_today))
        .route(
            "/roster/update",
            post(routes::roster::update_day).put(routes::roster::update_day),
        )
        // 每日家务
        .route("/tasks/today", get(routes::task::get_today_tasks))
        .route("/tasks/assign", post(routes::task::assign_tasks))
        // 账单
        .route("/transactions/add", post(routes::transaction::add_transaction))
        .route("/transactions/list", get(routes::transaction::list_transactions))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let api_base_uri = state.config.api_base_uri.clone();
    Router::new()
        .nest(&api_base_uri, protected_routes)
        .layer(axum::middleware::from_fn(middleware::log_errors))
        .with_state(state)
}
