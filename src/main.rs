use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use onrail::{
    AppState,
    cache::{FileLocalCache, MemoryRemoteCache, RedisRemoteCache, RemoteCache},
    chat::spawn_eviction_task,
    clock::SystemClock,
    config::Config,
    router,
    upstream::EmmaClient,
};
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    // 远程缓存：配置了 Redis 就用 Redis，否则用进程内实现
    let remote: Arc<dyn RemoteCache> = match &config.redis_url {
        Some(url) => {
            let redis_client = redis::Client::open(url.as_str()).expect("Failed to create Redis client");
            let cache = RedisRemoteCache::connect(Arc::new(redis_client), config.redis_key_prefix.clone())
                .await
                .expect("Failed to connect to Redis");
            tracing::info!("Using Redis remote cache with prefix {}", config.redis_key_prefix);
            Arc::new(cache)
        }
        None => {
            tracing::warn!("REDIS_URL not set, using in-memory remote cache");
            Arc::new(MemoryRemoteCache::default())
        }
    };

    // 本地持久缓存
    let local = FileLocalCache::open(&config.local_cache_path).expect("Failed to open local cache");
    tracing::info!("Local cache at {}", local.path().display());

    // 上游数据源
    let upstream = EmmaClient::new(config.upstream_url.clone(), config.upstream_timeout())
        .expect("Failed to create upstream client");

    // 设置应用状态
    let state = AppState::new(
        config.clone(),
        Arc::new(local),
        remote,
        Arc::new(upstream),
        Arc::new(SystemClock),
    );

    // 定期清理过期消息
    let _eviction = config.eviction_interval().map(|every| {
        tracing::info!("Evicting old messages every {:?}", every);
        spawn_eviction_task(state.gateway.clone(), state.connectivity.clone(), every)
    });

    let router = router(state);

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        // 设置开发环境的CORS，允许所有来源
        router.layer(CorsLayer::permissive())
    };

    // 启动服务器
    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
