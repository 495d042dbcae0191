use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::types::{Module, NewNotification, NewPushSubscription, Notification, PushSubscription};

pub mod memory;
pub mod postgres;

pub use memory::{MemoryNotificationStore, MemorySubscriptionRegistry};
pub use postgres::{PgNotificationStore, PgSubscriptionRegistry};

pub const DEFAULT_FEED_LIMIT: i64 = 20;
pub const MAX_FEED_LIMIT: i64 = 100;

/// Filters for one page of a restaurant's notification feed.
#[derive(Debug, Clone, Default)]
pub struct FeedQuery {
    pub module: Option<Module>,
    pub unread_only: bool,
    pub limit: Option<i64>,
    /// Strict upper bound on `created_at`; rows at exactly this instant are
    /// excluded, so rows sharing a timestamp with a page boundary can be
    /// skipped. Accepted as a tradeoff for an opaque single-column cursor.
    pub cursor: Option<DateTime<Utc>>,
}

impl FeedQuery {
    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_FEED_LIMIT).clamp(1, MAX_FEED_LIMIT)
    }
}

#[derive(Debug, Clone)]
pub struct FeedPage {
    pub notifications: Vec<Notification>,
    /// Set when the page came back full; echo it as `cursor` to continue.
    pub next_cursor: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct UnreadCounts {
    pub total: i64,
    pub by_module: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkReadOutcome {
    Marked,
    AlreadyRead,
    NotFound,
}

/// Durable notification log, scoped by restaurant.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert(&self, new: NewNotification) -> anyhow::Result<Notification>;

    async fn feed(&self, restaurant_id: &str, query: &FeedQuery) -> anyhow::Result<FeedPage>;

    async fn unread_counts(&self, restaurant_id: &str) -> anyhow::Result<UnreadCounts>;

    async fn mark_read(
        &self,
        restaurant_id: &str,
        notification_id: i64,
    ) -> anyhow::Result<MarkReadOutcome>;

    /// Marks every unread notification read, optionally only one module's.
    /// Returns how many rows changed.
    async fn mark_all_read(
        &self,
        restaurant_id: &str,
        module: Option<Module>,
    ) -> anyhow::Result<usize>;
}

/// Web Push endpoints keyed by endpoint URL, one subscription per browser.
#[async_trait]
pub trait SubscriptionRegistry: Send + Sync {
    /// Inserts or, when the endpoint is already known, re-homes the existing
    /// row to the new restaurant/module/keys.
    async fn upsert(&self, new: NewPushSubscription) -> anyhow::Result<PushSubscription>;

    async fn remove(&self, endpoint: &str) -> anyhow::Result<bool>;

    async fn list_for(
        &self,
        restaurant_id: &str,
        module: Module,
    ) -> anyhow::Result<Vec<PushSubscription>>;

    /// Batch delete of endpoints the push service reported gone.
    async fn remove_endpoints(&self, endpoints: &[String]) -> anyhow::Result<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_and_clamps() {
        assert_eq!(FeedQuery::default().effective_limit(), DEFAULT_FEED_LIMIT);
        let oversized = FeedQuery {
            limit: Some(500),
            ..Default::default()
        };
        assert_eq!(oversized.effective_limit(), MAX_FEED_LIMIT);
        let zero = FeedQuery {
            limit: Some(0),
            ..Default::default()
        };
        assert_eq!(zero.effective_limit(), 1);
    }
}
