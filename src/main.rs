use codeassist_proxy::config::Config;
use codeassist_proxy::http::router;
use codeassist_proxy::http::state::AppState;
use codeassist_proxy::{credentials, pipeline};
use mimalloc::MiMalloc;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cfg = Config::load();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_level(true).with_target(false))
        .init();

    if cfg.uses_default_password() {
        warn!(
            "GEMINI_AUTH_PASSWORD not set — using the default password; do not expose this proxy beyond localhost"
        );
    }

    let http = pipeline::build_http_client();
    let pool = Arc::new(credentials::load_pool(&cfg, http.clone()).await);
    let cfg = Arc::new(cfg);
    let state = AppState::new(pool, http, cfg.clone());
    let app = router::build(state);

    let addr = SocketAddr::from((cfg.host, cfg.port));
    let listener = TcpListener::bind(addr).await?;
    info!("codeassist-proxy listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server has shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
