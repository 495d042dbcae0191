use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::RunQueryDsl;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{
    FeedPage, FeedQuery, MarkReadOutcome, NotificationStore, SubscriptionRegistry, UnreadCounts,
};
use crate::db::DbPool;
use crate::schema::{notifications, push_subscriptions};
use crate::types::{Module, NewNotification, NewPushSubscription, Notification, PushSubscription};

pub struct PgNotificationStore {
    pool: Arc<DbPool>,
}

impl PgNotificationStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        PgNotificationStore { pool }
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn insert(&self, new: NewNotification) -> Result<Notification> {
        let mut conn = self.pool.get().await?;
        let row = diesel::insert_into(notifications::table)
            .values(&new)
            .returning(Notification::as_returning())
            .get_result(&mut conn)
            .await?;
        Ok(row)
    }

    async fn feed(&self, restaurant_id: &str, query: &FeedQuery) -> Result<FeedPage> {
        let mut conn = self.pool.get().await?;
        let limit = query.effective_limit();

        let mut select = notifications::table
            .filter(notifications::restaurant_id.eq(restaurant_id))
            .order(notifications::created_at.desc())
            .limit(limit)
            .select(Notification::as_select())
            .into_boxed();
        if let Some(module) = query.module {
            select = select.filter(notifications::module.eq(module));
        }
        if query.unread_only {
            select = select.filter(notifications::read.eq(false));
        }
        if let Some(cursor) = query.cursor {
            select = select.filter(notifications::created_at.lt(cursor));
        }

        let rows: Vec<Notification> = select.load(&mut conn).await?;
        let next_cursor = if rows.len() as i64 == limit {
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
        let mut conn = self.pool.get().await?;
        let rows: Vec<(Module, i64)> = notifications::table
            .filter(notifications::restaurant_id.eq(restaurant_id))
            .filter(notifications::read.eq(false))
            .group_by(notifications::module)
            .select((notifications::module, count_star()))
            .load(&mut conn)
            .await?;

        let mut by_module = BTreeMap::new();
        let mut total = 0;
        for (module, count) in rows {
            total += count;
            by_module.insert(module.as_str().to_string(), count);
        }
        Ok(UnreadCounts { total, by_module })
    }

    async fn mark_read(
        &self,
        restaurant_id: &str,
        notification_id: i64,
    ) -> Result<MarkReadOutcome> {
        let mut conn = self.pool.get().await?;
        let existing: Option<Notification> = notifications::table
            .filter(notifications::id.eq(notification_id))
            .filter(notifications::restaurant_id.eq(restaurant_id))
            .select(Notification::as_select())
            .first(&mut conn)
            .await
            .optional()?;

        let Some(notification) = existing else {
            return Ok(MarkReadOutcome::NotFound);
        };
        if notification.read {
            return Ok(MarkReadOutcome::AlreadyRead);
        }

        // read = false in the predicate keeps the flip single-shot even when
        // two marks race: the loser matches zero rows and read_at stands.
        diesel::update(
            notifications::table
                .filter(notifications::id.eq(notification_id))
                .filter(notifications::read.eq(false)),
        )
        .set((
            notifications::read.eq(true),
            notifications::read_at.eq(Some(Utc::now())),
        ))
        .execute(&mut conn)
        .await?;
        Ok(MarkReadOutcome::Marked)
    }

    async fn mark_all_read(&self, restaurant_id: &str, module: Option<Module>) -> Result<usize> {
        let mut conn = self.pool.get().await?;
        let stamp = (
            notifications::read.eq(true),
            notifications::read_at.eq(Some(Utc::now())),
        );
        let updated = match module {
            Some(module) => {
                diesel::update(
                    notifications::table
                        .filter(notifications::restaurant_id.eq(restaurant_id))
                        .filter(notifications::read.eq(false))
                        .filter(notifications::module.eq(module)),
                )
                .set(stamp)
                .execute(&mut conn)
                .await?
            }
            None => {
                diesel::update(
                    notifications::table
                        .filter(notifications::restaurant_id.eq(restaurant_id))
                        .filter(notifications::read.eq(false)),
                )
                .set(stamp)
                .execute(&mut conn)
                .await?
            }
        };
        Ok(updated)
    }
}

pub struct PgSubscriptionRegistry {
    pool: Arc<DbPool>,
}

impl PgSubscriptionRegistry {
    pub fn new(pool: Arc<DbPool>) -> Self {
        PgSubscriptionRegistry { pool }
    }
}

#[async_trait]
impl SubscriptionRegistry for PgSubscriptionRegistry {
    async fn upsert(&self, new: NewPushSubscription) -> Result<PushSubscription> {
        let mut conn = self.pool.get().await?;
        let row = diesel::insert_into(push_subscriptions::table)
            .values(&new)
            .on_conflict(push_subscriptions::endpoint)
            .do_update()
            .set((
                push_subscriptions::p256dh.eq(excluded(push_subscriptions::p256dh)),
                push_subscriptions::auth.eq(excluded(push_subscriptions::auth)),
                push_subscriptions::restaurant_id.eq(excluded(push_subscriptions::restaurant_id)),
                push_subscriptions::module.eq(excluded(push_subscriptions::module)),
                push_subscriptions::user_id.eq(excluded(push_subscriptions::user_id)),
                push_subscriptions::last_seen_at.eq(Utc::now()),
            ))
            .returning(PushSubscription::as_returning())
            .get_result(&mut conn)
            .await?;
        Ok(row)
    }

    async fn remove(&self, endpoint: &str) -> Result<bool> {
        let mut conn = self.pool.get().await?;
        let deleted = diesel::delete(
            push_subscriptions::table.filter(push_subscriptions::endpoint.eq(endpoint)),
        )
        .execute(&mut conn)
        .await?;
        Ok(deleted > 0)
    }

    async fn list_for(&self, restaurant_id: &str, module: Module) -> Result<Vec<PushSubscription>> {
        let mut conn = self.pool.get().await?;
        let rows = push_subscriptions::table
            .filter(push_subscriptions::restaurant_id.eq(restaurant_id))
            .filter(push_subscriptions::module.eq(module))
            .select(PushSubscription::as_select())
            .load(&mut conn)
            .await?;
        Ok(rows)
    }

    async fn remove_endpoints(&self, endpoints: &[String]) -> Result<usize> {
        if endpoints.is_empty() {
            return Ok(0);
        }
        let mut conn = self.pool.get().await?;
        let deleted = diesel::delete(
            push_subscriptions::table.filter(push_subscriptions::endpoint.eq_any(endpoints)),
        )
        .execute(&mut conn)
        .await?;
        Ok(deleted)
    }
}
