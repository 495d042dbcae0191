use std::sync::Arc;

use crate::broadcast::BroadcastBus;
use crate::config::Config;
use crate::db::{create_pool, DbPool};

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub db_pool: Arc<DbPool>,
    pub bus: Arc<BroadcastBus>,
}

impl AppContext {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let db_pool = create_pool(&config.database).await?;

        Ok(AppContext {
            config: Arc::new(config),
            db_pool,
            bus: Arc::new(BroadcastBus::new()),
        })
    }
}
