//! In-memory store implementations.
//!
//! Used by the test suites and handy for local development without Postgres.
//! They implement the same contracts as the `postgres` module.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{
    FeedPage, FeedQuery, MarkReadOutcome, NotificationStore, SubscriptionRegistry, UnreadCounts,
};
use crate::types::{Module, NewNotification, NewPushSubscription, Notification, PushSubscription};

#[derive(Default)]
pub struct MemoryNotificationStore {
    inner: Mutex<NotificationTable>,
}

#[derive(Default)]
struct NotificationTable {
    rows: Vec<Notification>,
    next_id: i64,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts with an explicit timestamp, for pagination tests that need a
    /// known order.
    pub fn insert_at(&self, new: NewNotification, created_at: DateTime<Utc>) -> Notification {
        let mut table = self.lock();
        table.next_id += 1;
        let row = Notification {
            id: table.next_id,
            restaurant_id: new.restaurant_id,
            module: new.module,
            kind: new.kind,
            title: new.title,
            message: new.message,
            link: new.link,
            data: new.data,
            meta: new.meta,
            read: false,
            read_at: None,
            created_at,
        };
        table.rows.push(row.clone());
        row
    }

    fn lock(&self) -> MutexGuard<'_, NotificationTable> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn insert(&self, new: NewNotification) -> Result<Notification> {
        Ok(self.insert_at(new, Utc::now()))
    }

    async fn feed(&self, restaurant_id: &str, query: &FeedQuery) -> Result<FeedPage> {
        let limit = query.effective_limit() as usize;
        let table = self.lock();
        let mut rows: Vec<Notification> = table
            .rows
            .iter()
            .filter(|n| n.restaurant_id == restaurant_id)
            .filter(|n| query.module.map_or(true, |m| n.module == m))
            .filter(|n| !query.unread_only || !n.read)
            .filter(|n| query.cursor.map_or(true, |c| n.created_at < c))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit);

        let next_cursor = if rows.len() == limit {
            rows.last().map(|n| n.created_at)
        } else {
            None
        };
        Ok(FeedPage {
            notifications: rows,
            next_cursor,
        })
    }

    async fn unread_counts(&self, restaurant_id: &str) -> Result<UnreadCounts> {
        let table = self.lock();
        let mut by_module = BTreeMap::new();
        let mut total = 0;
        for row in table
            .rows
            .iter()
            .filter(|n| n.restaurant_id == restaurant_id && !n.read)
        {
            total += 1;
            *by_module.entry(row.module.as_str().to_string()).or_insert(0) += 1;
        }
        Ok(UnreadCounts { total, by_module })
    }

    async fn mark_read(
        &self,
        restaurant_id: &str,
        notification_id: i64,
    ) -> Result<MarkReadOutcome> {
        let mut table = self.lock();
        let Some(row) = table
            .rows
            .iter_mut()
            .find(|n| n.id == notification_id && n.restaurant_id == restaurant_id)
        else {
            return Ok(MarkReadOutcome::NotFound);
        };
        if row.read {
            return Ok(MarkReadOutcome::AlreadyRead);
        }
        row.read = true;
        row.read_at = Some(Utc::now());
        Ok(MarkReadOutcome::Marked)
    }

    async fn mark_all_read(&self, restaurant_id: &str, module: Option<Module>) -> Result<usize> {
        let mut table = self.lock();
        let now = Utc::now();
        let mut updated = 0;
        for row in table.rows.iter_mut().filter(|n| {
            n.restaurant_id == restaurant_id && !n.read && module.map_or(true, |m| n.module == m)
        }) {
            row.read = true;
            row.read_at = Some(now);
            updated += 1;
        }
        Ok(updated)
    }
}

#[derive(Default)]
pub struct MemorySubscriptionRegistry {
    inner: Mutex<SubscriptionTable>,
}

#[derive(Default)]
struct SubscriptionTable {
    rows: Vec<PushSubscription>,
    next_id: i64,
}

impl MemorySubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SubscriptionTable> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SubscriptionRegistry for MemorySubscriptionRegistry {
    async fn upsert(&self, new: NewPushSubscription) -> Result<PushSubscription> {
        let mut table = self.lock();
        let now = Utc::now();
        if let Some(existing) = table.rows.iter_mut().find(|s| s.endpoint == new.endpoint) {
            existing.p256dh = new.p256dh;
            existing.auth = new.auth;
            existing.restaurant_id = new.restaurant_id;
            existing.module = new.module;
            existing.user_id = new.user_id;
            existing.last_seen_at = now;
            return Ok(existing.clone());
        }
        table.next_id += 1;
        let row = PushSubscription {
            id: table.next_id,
            endpoint: new.endpoint,
            p256dh: new.p256dh,
            auth: new.auth,
            restaurant_id: new.restaurant_id,
            module: new.module,
            user_id: new.user_id,
            created_at: now,
            last_seen_at: now,
        };
        table.rows.push(row.clone());
        Ok(row)
    }

    async fn remove(&self, endpoint: &str) -> Result<bool> {
        let mut table = self.lock();
        let before = table.rows.len();
        table.rows.retain(|s| s.endpoint != endpoint);
        Ok(table.rows.len() < before)
    }

    async fn list_for(&self, restaurant_id: &str, module: Module) -> Result<Vec<PushSubscription>> {
        let table = self.lock();
        Ok(table
            .rows
            .iter()
            .filter(|s| s.restaurant_id == restaurant_id && s.module == module)
            .cloned()
            .collect())
    }

    async fn remove_endpoints(&self, endpoints: &[String]) -> Result<usize> {
        let mut table = self.lock();
        let before = table.rows.len();
        table.rows.retain(|s| !endpoints.contains(&s.endpoint));
        Ok(before - table.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn notif(restaurant_id: &str, module: Module, kind: &str) -> NewNotification {
        NewNotification {
            restaurant_id: restaurant_id.to_string(),
            module,
            kind: kind.to_string(),
            title: "t".to_string(),
            message: "m".to_string(),
            link: "/".to_string(),
            data: json!({}),
            meta: json!({}),
        }
    }

    fn sub(endpoint: &str, restaurant_id: &str, module: Module) -> NewPushSubscription {
        NewPushSubscription {
            endpoint: endpoint.to_string(),
            p256dh: "p".to_string(),
            auth: "a".to_string(),
            restaurant_id: restaurant_id.to_string(),
            module,
            user_id: None,
        }
    }

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn feed_returns_newest_first() {
        let store = MemoryNotificationStore::new();
        for i in 0..3 {
            store.insert_at(
                notif("resto-1", Module::Reservations, "reservation_created"),
                base_time() + Duration::seconds(i),
            );
        }

        let page = store.feed("resto-1", &FeedQuery::default()).await.unwrap();
        assert_eq!(page.notifications.len(), 3);
        assert!(page.notifications[0].created_at > page.notifications[2].created_at);
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn feed_cursor_walks_pages_without_overlap() {
        let store = MemoryNotificationStore::new();
        for i in 0..5 {
            store.insert_at(
                notif("resto-1", Module::Reservations, "reservation_created"),
                base_time() + Duration::seconds(i),
            );
        }

        let query = FeedQuery {
            limit: Some(2),
            ..Default::default()
        };
        let first = store.feed("resto-1", &query).await.unwrap();
        assert_eq!(first.notifications.len(), 2);
        let cursor = first.next_cursor.unwrap();

        let second = store
            .feed(
                "resto-1",
                &FeedQuery {
                    limit: Some(2),
                    cursor: Some(cursor),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let third = store
            .feed(
                "resto-1",
                &FeedQuery {
                    limit: Some(2),
                    cursor: second.next_cursor,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let mut seen: Vec<i64> = first
            .notifications
            .iter()
            .chain(&second.notifications)
            .chain(&third.notifications)
            .map(|n| n.id)
            .collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 5);
        assert!(third.next_cursor.is_none());
    }

    #[tokio::test]
    async fn feed_filters_by_module_and_read_state() {
        let store = MemoryNotificationStore::new();
        let reservation = store.insert_at(
            notif("resto-1", Module::Reservations, "reservation_created"),
            base_time(),
        );
        store.insert_at(
            notif("resto-1", Module::GiftCards, "gift_card_purchased"),
            base_time() + Duration::seconds(1),
        );
        store.mark_read("resto-1", reservation.id).await.unwrap();

        let unread = store
            .feed(
                "resto-1",
                &FeedQuery {
                    unread_only: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(unread.notifications.len(), 1);
        assert_eq!(unread.notifications[0].module, Module::GiftCards);

        let reservations = store
            .feed(
                "resto-1",
                &FeedQuery {
                    module: Some(Module::Reservations),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(reservations.notifications.len(), 1);
        assert_eq!(reservations.notifications[0].id, reservation.id);
    }

    #[tokio::test]
    async fn feed_is_scoped_by_restaurant() {
        let store = MemoryNotificationStore::new();
        store.insert_at(
            notif("resto-1", Module::Documents, "document_uploaded"),
            base_time(),
        );
        store.insert_at(
            notif("resto-2", Module::Documents, "document_uploaded"),
            base_time(),
        );

        let page = store.feed("resto-1", &FeedQuery::default()).await.unwrap();
        assert_eq!(page.notifications.len(), 1);
        assert_eq!(page.notifications[0].restaurant_id, "resto-1");
    }

    #[tokio::test]
    async fn unread_counts_group_by_module() {
        let store = MemoryNotificationStore::new();
        store.insert_at(
            notif("resto-1", Module::Reservations, "reservation_created"),
            base_time(),
        );
        store.insert_at(
            notif("resto-1", Module::Reservations, "reservation_cancelled"),
            base_time() + Duration::seconds(1),
        );
        let read_one = store.insert_at(
            notif("resto-1", Module::Haccp, "haccp_noncompliant"),
            base_time() + Duration::seconds(2),
        );
        store.insert_at(
            notif("resto-2", Module::Reservations, "reservation_created"),
            base_time(),
        );
        store.mark_read("resto-1", read_one.id).await.unwrap();

        let counts = store.unread_counts("resto-1").await.unwrap();
        assert_eq!(counts.total, 2);
        assert_eq!(counts.by_module.get("reservations"), Some(&2));
        assert_eq!(counts.by_module.get("haccp"), None);
    }

    #[tokio::test]
    async fn mark_read_reports_each_outcome() {
        let store = MemoryNotificationStore::new();
        let row = store.insert_at(
            notif("resto-1", Module::LeaveRequests, "leave_request_created"),
            base_time(),
        );

        assert_eq!(
            store.mark_read("resto-1", row.id).await.unwrap(),
            MarkReadOutcome::Marked
        );
        let stamped = store.feed("resto-1", &FeedQuery::default()).await.unwrap().notifications[0]
            .read_at;
        assert!(stamped.is_some());

        assert_eq!(
            store.mark_read("resto-1", row.id).await.unwrap(),
            MarkReadOutcome::AlreadyRead
        );
        // The second call must not move the read stamp.
        assert_eq!(
            store.feed("resto-1", &FeedQuery::default()).await.unwrap().notifications[0].read_at,
            stamped
        );
        assert_eq!(
            store.mark_read("resto-1", 9999).await.unwrap(),
            MarkReadOutcome::NotFound
        );
        // Another restaurant cannot see, let alone mark, this row.
        assert_eq!(
            store.mark_read("resto-2", row.id).await.unwrap(),
            MarkReadOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn mark_all_read_honors_the_module_filter() {
        let store = MemoryNotificationStore::new();
        store.insert_at(
            notif("resto-1", Module::Reservations, "reservation_created"),
            base_time(),
        );
        store.insert_at(
            notif("resto-1", Module::GiftCards, "gift_card_purchased"),
            base_time() + Duration::seconds(1),
        );

        let updated = store
            .mark_all_read("resto-1", Some(Module::Reservations))
            .await
            .unwrap();
        assert_eq!(updated, 1);
        assert_eq!(store.unread_counts("resto-1").await.unwrap().total, 1);

        let rest = store.mark_all_read("resto-1", None).await.unwrap();
        assert_eq!(rest, 1);
        assert_eq!(store.mark_all_read("resto-1", None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn upsert_rehomes_a_known_endpoint() {
        let registry = MemorySubscriptionRegistry::new();
        let first = registry
            .upsert(sub("https://push/ep-1", "resto-1", Module::Reservations))
            .await
            .unwrap();
        let second = registry
            .upsert(sub("https://push/ep-1", "resto-2", Module::GiftCards))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.restaurant_id, "resto-2");
        assert!(registry
            .list_for("resto-1", Module::Reservations)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            registry
                .list_for("resto-2", Module::GiftCards)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn remove_and_batch_remove_report_what_changed() {
        let registry = MemorySubscriptionRegistry::new();
        registry
            .upsert(sub("https://push/ep-1", "resto-1", Module::Reservations))
            .await
            .unwrap();
        registry
            .upsert(sub("https://push/ep-2", "resto-1", Module::Reservations))
            .await
            .unwrap();
        registry
            .upsert(sub("https://push/ep-3", "resto-1", Module::Reservations))
            .await
            .unwrap();

        assert!(registry.remove("https://push/ep-1").await.unwrap());
        assert!(!registry.remove("https://push/ep-1").await.unwrap());

        let pruned = registry
            .remove_endpoints(&[
                "https://push/ep-2".to_string(),
                "https://push/ep-3".to_string(),
                "https://push/ep-unknown".to_string(),
            ])
            .await
            .unwrap();
        assert_eq!(pruned, 2);
        assert!(registry
            .list_for("resto-1", Module::Reservations)
            .await
            .unwrap()
            .is_empty());
    }
}
