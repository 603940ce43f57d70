//! Route assembly: authenticated routes get `RequireAuth`, health/root are
//! exempt, and the outer `access_log` + permissive CORS layers wrap
//! everything, per `spec.md` §4.5. Grounded in the teacher's
//! `server::router::pollux_router`.

use super::access_log::access_log;
use super::auth::RequireAuth;
use super::routes::{chat, health, models, native};
use super::state::AppState;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{middleware, Router};
use tower_http::cors::CorsLayer;

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

pub fn build(state: AppState) -> Router {
    let authenticated = Router::new()
        .route("/v1/chat/completions", post(chat::chat_completions))
        .route("/v1/models", get(models::list_openai_models))
        .route("/v1beta/models", get(models::list_native_models))
        .route("/v1beta/models/{model_action}", post(native::generate_content))
        .layer(middleware::from_extractor_with_state::<RequireAuth, _>(
            state.clone(),
        ));

    let open = Router::new()
        .route("/health", get(health::health))
        .route("/", get(health::root));

    Router::new()
        .merge(authenticated)
        .merge(open)
        .fallback(not_found)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(access_log))
}
