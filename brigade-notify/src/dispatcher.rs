use anyhow::{Context, Result};
use std::sync::Arc;
use tracing;

use brigade_core::broadcast::BroadcastBus;
use brigade_core::store::NotificationStore;
use brigade_core::types::{BusMessage, DomainEvent, NewNotification, Notification};
use brigade_delivery::{PushFanout, PushPayload};

use crate::content::build_content;
use crate::meta::build_meta;

pub struct NotificationDispatcher {
    store: Arc<dyn NotificationStore>,
    bus: Arc<BroadcastBus>,
    fanout: Arc<PushFanout>,
}

impl NotificationDispatcher {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        bus: Arc<BroadcastBus>,
        fanout: Arc<PushFanout>,
    ) -> Self {
        Self { store, bus, fanout }
    }

    /// Turns a domain event into a stored notification, then tells everyone.
    ///
    /// The durable write is the only fallible step. The WebSocket broadcast
    /// runs synchronously against the in-process bus; the push fan-out runs
    /// detached, so the caller never waits on the push services and never
    /// sees their errors.
    pub async fn dispatch(&self, event: DomainEvent) -> Result<Notification> {
        tracing::debug!(
            restaurant_id = %event.restaurant_id,
            kind = %event.kind,
            "Processing domain event"
        );

        let content = build_content(&event.kind, &event.data);
        let meta = build_meta(&event.kind, &event.data);

        let notification = self
            .store
            .insert(NewNotification {
                restaurant_id: event.restaurant_id,
                module: event.module,
                kind: event.kind,
                title: content.title,
                message: content.message,
                link: content.link,
                data: event.data,
                meta: meta.clone(),
            })
            .await
            .context("failed to persist notification")?;

        let delivered = self.bus.publish(
            &notification.restaurant_id,
            &BusMessage::NotificationCreated(notification.clone()),
        );
        tracing::debug!(
            notification_id = notification.id,
            delivered,
            "Broadcast notification to open dashboards"
        );

        let fanout = Arc::clone(&self.fanout);
        let payload = PushPayload {
            title: notification.title.clone(),
            message: notification.message.clone(),
            link: notification.link.clone(),
            data: meta,
        };
        let restaurant_id = notification.restaurant_id.clone();
        let module = notification.module;
        tokio::spawn(async move {
            if let Err(e) = fanout.send(&restaurant_id, module, &payload).await {
                tracing::warn!("Push fan-out failed: {:#}", e);
            }
        });

        Ok(notification)
    }
}
