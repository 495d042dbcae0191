use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::Json,
};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing;

use brigade_core::store::{FeedQuery, MarkReadOutcome};
use brigade_core::types::{BusMessage, DomainEvent, Module, NewPushSubscription};

use crate::server::ApiState;

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "brigade-api"
    }))
}

#[derive(Deserialize)]
pub struct FeedParams {
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub unread_only: Option<bool>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub cursor: Option<DateTime<Utc>>,
}

pub async fn notification_feed(
    Extension(state): Extension<ApiState>,
    Path(restaurant_id): Path<String>,
    Query(params): Query<FeedParams>,
) -> Result<Json<Value>, StatusCode> {
    let query = FeedQuery {
        module: optional_module(params.module.as_deref())?,
        unread_only: params.unread_only.unwrap_or(false),
        limit: params.limit,
        cursor: params.cursor,
    };

    let page = state
        .notifications
        .feed(&restaurant_id, &query)
        .await
        .map_err(internal_error)?;

    Ok(Json(json!({
        "notifications": page.notifications,
        "next_cursor": page.next_cursor,
    })))
}

pub async fn unread_counts(
    Extension(state): Extension<ApiState>,
    Path(restaurant_id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let counts = state
        .notifications
        .unread_counts(&restaurant_id)
        .await
        .map_err(internal_error)?;
    Ok(Json(json!(counts)))
}

pub async fn mark_notification_read(
    Extension(state): Extension<ApiState>,
    Path((restaurant_id, notification_id)): Path<(String, i64)>,
) -> Result<Json<Value>, StatusCode> {
    let outcome = state
        .notifications
        .mark_read(&restaurant_id, notification_id)
        .await
        .map_err(internal_error)?;

    match outcome {
        MarkReadOutcome::Marked => Ok(Json(json!({"status": "ok"}))),
        MarkReadOutcome::AlreadyRead => Ok(Json(json!({"status": "already_read"}))),
        MarkReadOutcome::NotFound => Err(StatusCode::NOT_FOUND),
    }
}

#[derive(Deserialize)]
pub struct ReadAllParams {
    #[serde(default)]
    pub module: Option<String>,
}

pub async fn mark_all_read(
    Extension(state): Extension<ApiState>,
    Path(restaurant_id): Path<String>,
    Query(params): Query<ReadAllParams>,
) -> Result<Json<Value>, StatusCode> {
    let module = optional_module(params.module.as_deref())?;
    let updated = state
        .notifications
        .mark_all_read(&restaurant_id, module)
        .await
        .map_err(internal_error)?;
    Ok(Json(json!({"status": "ok", "updated": updated})))
}

#[derive(Deserialize)]
pub struct SubscribeRequest {
    pub restaurant_id: String,
    pub module: String,
    pub subscription: SubscriptionPayload,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Deserialize)]
pub struct SubscriptionPayload {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}

#[derive(Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

pub async fn subscribe(
    Extension(state): Extension<ApiState>,
    Json(req): Json<SubscribeRequest>,
) -> Result<Json<Value>, StatusCode> {
    let module = require_module(&req.module)?;
    if req.subscription.endpoint.is_empty()
        || !valid_push_key(&req.subscription.keys.p256dh)
        || !valid_push_key(&req.subscription.keys.auth)
    {
        tracing::debug!(
            endpoint = %req.subscription.endpoint,
            "Rejected subscription with malformed endpoint or keys"
        );
        return Err(StatusCode::BAD_REQUEST);
    }

    state
        .subscriptions
        .upsert(NewPushSubscription {
            endpoint: req.subscription.endpoint,
            p256dh: req.subscription.keys.p256dh,
            auth: req.subscription.keys.auth,
            restaurant_id: req.restaurant_id,
            module,
            user_id: req.user_id,
        })
        .await
        .map_err(internal_error)?;

    Ok(Json(json!({"status": "ok"})))
}

#[derive(Deserialize)]
pub struct UnsubscribeRequest {
    pub endpoint: String,
}

pub async fn unsubscribe(
    Extension(state): Extension<ApiState>,
    Json(req): Json<UnsubscribeRequest>,
) -> Result<Json<Value>, StatusCode> {
    let removed = state
        .subscriptions
        .remove(&req.endpoint)
        .await
        .map_err(internal_error)?;
    Ok(Json(json!({"status": "ok", "removed": removed})))
}

/// The key the browser passes to `pushManager.subscribe`.
pub async fn push_public_key(
    Extension(state): Extension<ApiState>,
) -> Result<Json<Value>, StatusCode> {
    match &state.vapid_public_key {
        Some(key) => Ok(Json(json!({"public_key": key}))),
        None => Err(StatusCode::NOT_FOUND),
    }
}

#[derive(Deserialize)]
pub struct EventRequest {
    pub restaurant_id: String,
    pub module: String,
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

/// Producers' entry point: the full persist/broadcast/push pipeline.
pub async fn ingest_event(
    Extension(state): Extension<ApiState>,
    Json(req): Json<EventRequest>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let module = require_module(&req.module)?;
    let notification = state
        .dispatcher
        .dispatch(DomainEvent {
            restaurant_id: req.restaurant_id,
            module,
            kind: req.kind,
            data: req.data,
        })
        .await
        .map_err(internal_error)?;

    Ok((StatusCode::CREATED, Json(json!(notification))))
}

#[derive(Deserialize)]
pub struct UpsertRequest {
    pub restaurant_id: String,
    pub entity: String,
    pub doc: Value,
}

/// The lighter channel: broadcast an entity snapshot to open dashboards
/// without persisting anything.
pub async fn ingest_upsert(
    Extension(state): Extension<ApiState>,
    Json(req): Json<UpsertRequest>,
) -> Json<Value> {
    let delivered = state.bus.publish(
        &req.restaurant_id,
        &BusMessage::EntityUpsert {
            entity: req.entity,
            doc: req.doc,
        },
    );
    Json(json!({"status": "ok", "delivered": delivered}))
}

fn require_module(raw: &str) -> Result<Module, StatusCode> {
    raw.parse::<Module>().map_err(|e| {
        tracing::debug!("Rejected request: {}", e);
        StatusCode::BAD_REQUEST
    })
}

fn optional_module(raw: Option<&str>) -> Result<Option<Module>, StatusCode> {
    raw.map(require_module).transpose()
}

/// Browsers hand key material out URL-safe base64 encoded, usually unpadded.
fn valid_push_key(raw: &str) -> bool {
    if raw.is_empty() {
        return false;
    }
    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(raw.trim_end_matches('='))
        .is_ok()
}

fn internal_error(err: anyhow::Error) -> StatusCode {
    tracing::error!("{:#}", err);
    StatusCode::INTERNAL_SERVER_ERROR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_keys_accept_url_safe_base64() {
        assert!(valid_push_key("QUJDREVGR0hJ"));
        assert!(valid_push_key("c2VjcmV0LWtleQ=="));
        assert!(valid_push_key("aGVsbG8td29ybGQ_LQ"));
    }

    #[test]
    fn push_keys_reject_garbage() {
        assert!(!valid_push_key(""));
        assert!(!valid_push_key("not base64!!"));
        // A lone character can never be a whole base64 quantum.
        assert!(!valid_push_key("a"));
    }

    #[test]
    fn module_parsing_maps_to_bad_request() {
        assert_eq!(require_module("reservations"), Ok(Module::Reservations));
        assert_eq!(require_module("payroll"), Err(StatusCode::BAD_REQUEST));
        assert_eq!(optional_module(None), Ok(None));
        assert_eq!(
            optional_module(Some("gift_cards")),
            Ok(Some(Module::GiftCards))
        );
    }
}
