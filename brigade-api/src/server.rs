use anyhow::Result;
use axum::{
    extract::Extension,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing;

use brigade_core::config::ServerConfig;
use brigade_core::store::{NotificationStore, SubscriptionRegistry};
use brigade_core::BroadcastBus;
use brigade_notify::NotificationDispatcher;

use crate::handlers;
use crate::websocket;

/// Everything the handlers touch, injected as one cloneable extension.
#[derive(Clone)]
pub struct ApiState {
    pub notifications: Arc<dyn NotificationStore>,
    pub subscriptions: Arc<dyn SubscriptionRegistry>,
    pub bus: Arc<BroadcastBus>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub vapid_public_key: Option<String>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/ws", get(websocket::websocket_handler))
        .route(
            "/api/v1/restaurants/:restaurant_id/notifications",
            get(handlers::notification_feed),
        )
        .route(
            "/api/v1/restaurants/:restaurant_id/notifications/unread-counts",
            get(handlers::unread_counts),
        )
        .route(
            "/api/v1/restaurants/:restaurant_id/notifications/:notification_id/read",
            post(handlers::mark_notification_read),
        )
        .route(
            "/api/v1/restaurants/:restaurant_id/notifications/read-all",
            post(handlers::mark_all_read),
        )
        .route("/api/v1/subscribe", post(handlers::subscribe))
        .route("/api/v1/unsubscribe", post(handlers::unsubscribe))
        .route("/api/v1/push/public-key", get(handlers::push_public_key))
        .route("/api/v1/events", post(handlers::ingest_event))
        .route("/api/v1/events/upsert", post(handlers::ingest_upsert))
        .layer(
            ServiceBuilder::new()
                .layer(Extension(state))
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer()),
        )
}

pub async fn run(config: &ServerConfig, state: ApiState) -> Result<()> {
    let app = router(state);

    let addr = SocketAddr::new(config.host.parse()?, config.port);
    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Allow-list from `CORS_ORIGINS` (comma-separated); permissive when unset.
fn cors_layer() -> CorsLayer {
    match env::var("CORS_ORIGINS") {
        Ok(origins) => {
            let allowed: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(allowed)
                .allow_methods(Any)
                .allow_headers(Any)
        }
        Err(_) => {
            tracing::warn!(
                "CORS_ORIGINS not set, using permissive CORS. Set CORS_ORIGINS for production!"
            );
            CorsLayer::permissive()
        }
    }
}
