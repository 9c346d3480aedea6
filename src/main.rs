use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use axum::Router;
use household::{
    AppState, build_router,
    config::Config,
    middleware::{RateLimiter, rate_limit},
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Executor;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn connect_database(config: &Config) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'household';").await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
}

/// 业务路由外面再包一层限流，开发模式下放开跨域
fn with_outer_layers(router: Router, limiter: Arc<RateLimiter>) -> Router {
    let router = router.layer(axum::middleware::from_fn_with_state(limiter, rate_limit));

    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Debug build, allowing cross-origin requests");
        router.layer(CorsLayer::permissive())
    };

    router
}

fn listen_addr(config: &Config) -> SocketAddr {
    let ip = config.server_host.parse().unwrap_or_else(|_| {
        tracing::warn!("Invalid SERVER_HOST '{}', listening on [::]", config.server_host);
        IpAddr::V6(Ipv6Addr::UNSPECIFIED)
    });
    SocketAddr::new(ip, config.server_port)
}

#[tokio::main]
async fn main() {
    init_tracing();

    let config = Config::from_env().expect("Failed to load configuration");
    let pool = connect_database(&config)
        .await
        .expect("Failed to connect to Postgres");
    let redis = Arc::new(
        redis::Client::open(config.redis_url.clone()).expect("Failed to create Redis client"),
    );

    let limiter = Arc::new(RateLimiter::new(redis.clone(), config.clone()));
    let app = with_outer_layers(
        build_router(AppState {
            pool,
            config: config.clone(),
            redis,
        }),
        limiter,
    );

    let addr = listen_addr(&config);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind");
    tracing::info!("Household service listening on {}{}", addr, config.api_base_uri);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
