pub mod broadcast;
pub mod config;
pub mod context;
pub mod db;
pub mod schema;
pub mod store;
pub mod types;

pub use broadcast::{BroadcastBus, BusChannel};
pub use config::Config;
pub use context::AppContext;
pub use db::DbPool;
pub use store::{NotificationStore, SubscriptionRegistry};
pub use types::{BusMessage, DomainEvent, Module, Notification};
