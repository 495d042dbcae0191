use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::types::BusMessage;

type ChannelMap = HashMap<String, HashMap<Uuid, mpsc::UnboundedSender<BusMessage>>>;

/// In-process fan-out of [`BusMessage`]s to connected dashboards.
///
/// One unbounded channel per WebSocket connection, grouped by restaurant.
/// Delivery is at-most-once: messages published while nobody listens are
/// dropped, and a dashboard repairs any gap with its next fetch. Each channel
/// preserves publish order.
pub struct BroadcastBus {
    channels: Mutex<ChannelMap>,
}

/// Receiving half handed to a WebSocket connection on registration.
pub struct BusChannel {
    pub connection_id: Uuid,
    pub receiver: mpsc::UnboundedReceiver<BusMessage>,
}

impl BroadcastBus {
    pub fn new() -> Self {
        BroadcastBus {
            channels: Mutex::new(HashMap::new()),
        }
    }

    pub fn register(&self, restaurant_id: &str) -> BusChannel {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection_id = Uuid::new_v4();
        self.lock()
            .entry(restaurant_id.to_string())
            .or_default()
            .insert(connection_id, tx);
        debug!(%connection_id, restaurant_id, "registered broadcast channel");
        BusChannel {
            connection_id,
            receiver: rx,
        }
    }

    pub fn unregister(&self, restaurant_id: &str, connection_id: Uuid) {
        let mut channels = self.lock();
        if let Some(tenant) = channels.get_mut(restaurant_id) {
            tenant.remove(&connection_id);
            if tenant.is_empty() {
                channels.remove(restaurant_id);
            }
        }
        debug!(%connection_id, restaurant_id, "unregistered broadcast channel");
    }

    /// Sends `message` to every live channel of the restaurant and returns
    /// how many received it. Channels whose receiver is gone are pruned.
    pub fn publish(&self, restaurant_id: &str, message: &BusMessage) -> usize {
        let mut channels = self.lock();
        let Some(tenant) = channels.get_mut(restaurant_id) else {
            return 0;
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (connection_id, tx) in tenant.iter() {
            if tx.send(message.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(*connection_id);
            }
        }
        for connection_id in dead {
            debug!(%connection_id, restaurant_id, "pruning dead broadcast channel");
            tenant.remove(&connection_id);
        }
        if tenant.is_empty() {
            channels.remove(restaurant_id);
        }
        delivered
    }

    pub fn connection_count(&self, restaurant_id: &str) -> usize {
        self.lock().get(restaurant_id).map_or(0, HashMap::len)
    }

    fn lock(&self) -> MutexGuard<'_, ChannelMap> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new()
    }
}
