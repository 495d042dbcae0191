use anyhow::Result;
use futures_util::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing;

use brigade_core::store::SubscriptionRegistry;
use brigade_core::types::Module;

use crate::webpush::{DeliveryStatus, PushTransport};

/// JSON document encrypted into each Web Push message. The service worker
/// shows `title`/`message` and opens `link` on click.
#[derive(Debug, Clone, Serialize)]
pub struct PushPayload {
    pub title: String,
    pub message: String,
    pub link: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub attempted: usize,
    pub delivered: usize,
    pub pruned: usize,
}

pub struct PushFanout {
    registry: Arc<dyn SubscriptionRegistry>,
    transport: Arc<dyn PushTransport>,
}

impl PushFanout {
    pub fn new(registry: Arc<dyn SubscriptionRegistry>, transport: Arc<dyn PushTransport>) -> Self {
        PushFanout {
            registry,
            transport,
        }
    }

    /// Pushes `payload` to every subscription of the restaurant's module.
    ///
    /// Sends run in parallel and endpoints reported gone are deleted in one
    /// batch afterwards. A failed send never fails the fan-out; only the
    /// registry round-trips can.
    pub async fn send(
        &self,
        restaurant_id: &str,
        module: Module,
        payload: &PushPayload,
    ) -> Result<FanoutReport> {
        let subscriptions = self.registry.list_for(restaurant_id, module).await?;
        if subscriptions.is_empty() {
            return Ok(FanoutReport::default());
        }

        let body = serde_json::to_vec(payload)?;
        let results = join_all(subscriptions.iter().map(|subscription| {
            let transport = Arc::clone(&self.transport);
            let body = body.as_slice();
            async move { (subscription, transport.push(subscription, body).await) }
        }))
        .await;

        let mut delivered = 0;
        let mut gone = Vec::new();
        for (subscription, status) in results {
            match status {
                DeliveryStatus::Delivered => delivered += 1,
                DeliveryStatus::Gone => gone.push(subscription.endpoint.clone()),
                DeliveryStatus::Failed | DeliveryStatus::Skipped => {}
            }
        }

        let pruned = if gone.is_empty() {
            0
        } else {
            tracing::info!(
                restaurant_id,
                count = gone.len(),
                "Pruning push endpoints reported gone"
            );
            self.registry.remove_endpoints(&gone).await?
        };

        let report = FanoutReport {
            attempted: subscriptions.len(),
            delivered,
            pruned,
        };
        tracing::debug!(
            restaurant_id,
            module = %module,
            attempted = report.attempted,
            delivered = report.delivered,
            pruned = report.pruned,
            "Push fan-out complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use brigade_core::store::MemorySubscriptionRegistry;
    use brigade_core::types::{NewPushSubscription, PushSubscription};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct ScriptedTransport {
        outcomes: HashMap<String, DeliveryStatus>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(outcomes: &[(&str, DeliveryStatus)]) -> Self {
            ScriptedTransport {
                outcomes: outcomes
                    .iter()
                    .map(|(endpoint, status)| (endpoint.to_string(), *status))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PushTransport for ScriptedTransport {
        async fn push(&self, subscription: &PushSubscription, _payload: &[u8]) -> DeliveryStatus {
            self.calls.lock().unwrap().push(subscription.endpoint.clone());
            *self
                .outcomes
                .get(&subscription.endpoint)
                .unwrap_or(&DeliveryStatus::Delivered)
        }
    }

    fn subscription(endpoint: &str, restaurant_id: &str, module: Module) -> NewPushSubscription {
        NewPushSubscription {
            endpoint: endpoint.to_string(),
            p256dh: "p256dh-key".to_string(),
            auth: "auth-secret".to_string(),
            restaurant_id: restaurant_id.to_string(),
            module,
            user_id: None,
        }
    }

    fn payload() -> PushPayload {
        PushPayload {
            title: "Nouvelle réservation".to_string(),
            message: "Table pour 4".to_string(),
            link: "/reservations".to_string(),
            data: json!({"reservation_id": "r-1"}),
        }
    }

    #[tokio::test]
    async fn sends_only_to_the_matching_scope() {
        let registry = Arc::new(MemorySubscriptionRegistry::new());
        registry
            .upsert(subscription("https://push/a", "resto-1", Module::Reservations))
            .await
            .unwrap();
        registry
            .upsert(subscription("https://push/b", "resto-1", Module::Reservations))
            .await
            .unwrap();
        registry
            .upsert(subscription("https://push/other-module", "resto-1", Module::Haccp))
            .await
            .unwrap();
        registry
            .upsert(subscription("https://push/other-resto", "resto-2", Module::Reservations))
            .await
            .unwrap();

        let transport = Arc::new(ScriptedTransport::new(&[]));
        let fanout = PushFanout::new(registry, Arc::clone(&transport) as Arc<dyn PushTransport>);

        let report = fanout
            .send("resto-1", Module::Reservations, &payload())
            .await
            .unwrap();
        assert_eq!(
            report,
            FanoutReport {
                attempted: 2,
                delivered: 2,
                pruned: 0
            }
        );

        let mut calls = transport.calls.lock().unwrap().clone();
        calls.sort();
        assert_eq!(calls, vec!["https://push/a", "https://push/b"]);
    }

    #[tokio::test]
    async fn gone_endpoints_are_pruned_in_one_batch() {
        let registry = Arc::new(MemorySubscriptionRegistry::new());
        for endpoint in ["https://push/live", "https://push/dead-1", "https://push/dead-2"] {
            registry
                .upsert(subscription(endpoint, "resto-1", Module::GiftCards))
                .await
                .unwrap();
        }

        let transport = Arc::new(ScriptedTransport::new(&[
            ("https://push/dead-1", DeliveryStatus::Gone),
            ("https://push/dead-2", DeliveryStatus::Gone),
        ]));
        let fanout = PushFanout::new(
            Arc::clone(&registry) as Arc<dyn SubscriptionRegistry>,
            transport,
        );

        let report = fanout
            .send("resto-1", Module::GiftCards, &payload())
            .await
            .unwrap();
        assert_eq!(
            report,
            FanoutReport {
                attempted: 3,
                delivered: 1,
                pruned: 2
            }
        );

        let remaining = registry
            .list_for("resto-1", Module::GiftCards)
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].endpoint, "https://push/live");
    }

    #[tokio::test]
    async fn transient_failures_keep_the_subscription() {
        let registry = Arc::new(MemorySubscriptionRegistry::new());
        registry
            .upsert(subscription("https://push/flaky", "resto-1", Module::Documents))
            .await
            .unwrap();

        let transport = Arc::new(ScriptedTransport::new(&[(
            "https://push/flaky",
            DeliveryStatus::Failed,
        )]));
        let fanout = PushFanout::new(
            Arc::clone(&registry) as Arc<dyn SubscriptionRegistry>,
            transport,
        );

        let report = fanout
            .send("resto-1", Module::Documents, &payload())
            .await
            .unwrap();
        assert_eq!(
            report,
            FanoutReport {
                attempted: 1,
                delivered: 0,
                pruned: 0
            }
        );
        assert_eq!(
            registry
                .list_for("resto-1", Module::Documents)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn no_subscriptions_means_no_sends() {
        let registry = Arc::new(MemorySubscriptionRegistry::new());
        let transport = Arc::new(ScriptedTransport::new(&[]));
        let fanout = PushFanout::new(registry, Arc::clone(&transport) as Arc<dyn PushTransport>);

        let report = fanout
            .send("resto-1", Module::WineList, &payload())
            .await
            .unwrap();
        assert_eq!(report, FanoutReport::default());
        assert!(transport.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn payload_serializes_the_notification_fields() {
        let value = serde_json::to_value(payload()).unwrap();
        assert_eq!(value["title"], "Nouvelle réservation");
        assert_eq!(value["message"], "Table pour 4");
        assert_eq!(value["link"], "/reservations");
        assert_eq!(value["data"]["reservation_id"], "r-1");
    }
}
