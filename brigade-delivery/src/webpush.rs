use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::fs;
use tracing;
use web_push::{
    ContentEncoding, IsahcWebPushClient, PartialVapidSignatureBuilder, SubscriptionInfo,
    VapidSignatureBuilder, WebPushClient, WebPushError, WebPushMessageBuilder,
};

use brigade_core::config::PushConfig;
use brigade_core::types::PushSubscription;

/// Pushes expire at the push service after a day; a stale back-office alert
/// is worthless beyond that.
const PUSH_TTL_SECS: u32 = 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    /// Endpoint permanently invalid (HTTP 404/410); prune the subscription.
    Gone,
    /// Transient failure; the subscription stays.
    Failed,
    /// Transport disabled, nothing attempted.
    Skipped,
}

/// One Web Push delivery attempt. Implementations classify their own errors
/// and never propagate them; the fan-out only acts on the status.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn push(&self, subscription: &PushSubscription, payload: &[u8]) -> DeliveryStatus;
}

pub struct WebPushTransport {
    client: Option<IsahcWebPushClient>,
    signature: Option<PartialVapidSignatureBuilder>,
    subject: Option<String>,
}

impl WebPushTransport {
    pub fn new(config: &PushConfig) -> Result<Self> {
        // Read the key file or use base64 content if provided
        let pem: Option<Vec<u8>> = if let Some(content) = &config.vapid_private_key_content {
            use base64::Engine;
            let decoded = base64::engine::general_purpose::STANDARD
                .decode(content)
                .map_err(|e| anyhow!("Failed to decode base64 VAPID key: {}", e))?;
            Some(decoded)
        } else if let Some(path) = &config.vapid_private_key_path {
            let bytes = fs::read(path)
                .map_err(|e| anyhow!("Failed to read VAPID key file {}: {}", path, e))?;
            Some(bytes)
        } else {
            None
        };

        let (client, signature) = match pem {
            Some(bytes) => {
                tracing::info!("Initializing Web Push client");
                let signature = VapidSignatureBuilder::from_pem_no_sub(bytes.as_slice())
                    .map_err(|e| anyhow!("Failed to parse VAPID private key: {}", e))?;
                let client = IsahcWebPushClient::new()
                    .map_err(|e| anyhow!("Failed to create Web Push client: {}", e))?;
                tracing::info!("Web Push client initialized successfully");
                (Some(client), Some(signature))
            }
            None => {
                tracing::warn!("Web Push delivery disabled (missing VAPID private key)");
                (None, None)
            }
        };

        Ok(Self {
            client,
            signature,
            subject: config.vapid_subject.clone(),
        })
    }
}

#[async_trait]
impl PushTransport for WebPushTransport {
    async fn push(&self, subscription: &PushSubscription, payload: &[u8]) -> DeliveryStatus {
        let (Some(client), Some(signature)) = (&self.client, &self.signature) else {
            tracing::debug!("Web Push not configured, skipping");
            return DeliveryStatus::Skipped;
        };

        let info = SubscriptionInfo::new(
            subscription.endpoint.clone(),
            subscription.p256dh.clone(),
            subscription.auth.clone(),
        );

        let mut vapid = signature.clone().add_sub_info(&info);
        if let Some(subject) = &self.subject {
            vapid.add_claim("sub", subject.clone());
        }
        let vapid = match vapid.build() {
            Ok(vapid) => vapid,
            Err(e) => {
                tracing::warn!(
                    endpoint = %subscription.endpoint,
                    "Failed to build VAPID signature: {}",
                    e
                );
                return DeliveryStatus::Failed;
            }
        };

        let mut builder = WebPushMessageBuilder::new(&info);
        builder.set_payload(ContentEncoding::Aes128Gcm, payload);
        builder.set_vapid_signature(vapid);
        builder.set_ttl(PUSH_TTL_SECS);
        let message = match builder.build() {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(
                    endpoint = %subscription.endpoint,
                    "Failed to build Web Push message: {}",
                    e
                );
                return DeliveryStatus::Failed;
            }
        };

        match client.send(message).await {
            Ok(()) => {
                tracing::debug!(endpoint = %subscription.endpoint, "Web Push delivered");
                DeliveryStatus::Delivered
            }
            Err(WebPushError::EndpointNotFound) | Err(WebPushError::EndpointNotValid) => {
                tracing::debug!(endpoint = %subscription.endpoint, "Push endpoint reported gone");
                DeliveryStatus::Gone
            }
            Err(e) => {
                tracing::warn!(
                    endpoint = %subscription.endpoint,
                    "Web Push delivery failed: {}",
                    e
                );
                DeliveryStatus::Failed
            }
        }
    }
}
