use anyhow::Result;
use std::sync::Arc;
use tracing;
use tracing_subscriber;

use brigade_api::ApiState;
use brigade_core::db::run_migrations;
use brigade_core::store::{
    NotificationStore, PgNotificationStore, PgSubscriptionRegistry, SubscriptionRegistry,
};
use brigade_core::{AppContext, Config};
use brigade_delivery::{PushFanout, WebPushTransport};
use brigade_notify::NotificationDispatcher;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting Brigade notification relay");

    let config = Config::from_env();
    run_migrations(&config.database.url).await?;

    let ctx = AppContext::new(config).await?;
    tracing::info!("Application context initialized");

    let notifications: Arc<dyn NotificationStore> =
        Arc::new(PgNotificationStore::new(Arc::clone(&ctx.db_pool)));
    let subscriptions: Arc<dyn SubscriptionRegistry> =
        Arc::new(PgSubscriptionRegistry::new(Arc::clone(&ctx.db_pool)));
    let transport = Arc::new(WebPushTransport::new(&ctx.config.push)?);
    let fanout = Arc::new(PushFanout::new(Arc::clone(&subscriptions), transport));
    let dispatcher = Arc::new(NotificationDispatcher::new(
        Arc::clone(&notifications),
        Arc::clone(&ctx.bus),
        fanout,
    ));

    let state = ApiState {
        notifications,
        subscriptions,
        bus: Arc::clone(&ctx.bus),
        dispatcher,
        vapid_public_key: ctx.config.push.vapid_public_key.clone(),
    };

    tokio::select! {
        result = brigade_api::run(&ctx.config.server, state) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, exiting");
        }
    }

    Ok(())
}
