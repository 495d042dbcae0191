use chrono::{DateTime, Utc};
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::io::Write;
use std::str::FromStr;

/// Back-office modules a notification or push subscription belongs to.
///
/// The set is closed: an event naming a module outside this list is rejected
/// at intake. Event kinds, by contrast, stay open strings so new kinds can
/// flow through without a schema change.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum Module {
    Reservations,
    GiftCards,
    LeaveRequests,
    Documents,
    Haccp,
    WineList,
}

impl Module {
    pub const ALL: [Module; 6] = [
        Module::Reservations,
        Module::GiftCards,
        Module::LeaveRequests,
        Module::Documents,
        Module::Haccp,
        Module::WineList,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Module::Reservations => "reservations",
            Module::GiftCards => "gift_cards",
            Module::LeaveRequests => "leave_requests",
            Module::Documents => "documents",
            Module::Haccp => "haccp",
            Module::WineList => "wine_list",
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Module {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reservations" => Ok(Module::Reservations),
            "gift_cards" => Ok(Module::GiftCards),
            "leave_requests" => Ok(Module::LeaveRequests),
            "documents" => Ok(Module::Documents),
            "haccp" => Ok(Module::Haccp),
            "wine_list" => Ok(Module::WineList),
            other => Err(EventError::UnknownModule(other.to_string())),
        }
    }
}

impl ToSql<Text, Pg> for Module {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for Module {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let s = std::str::from_utf8(bytes.as_bytes())?;
        s.parse::<Module>().map_err(|e| e.to_string().into())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("unknown module: {0}")]
    UnknownModule(String),
}

/// A persisted notification row, also the WebSocket/REST wire shape.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = crate::schema::notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Notification {
    pub id: i64,
    pub restaurant_id: String,
    pub module: Module,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub link: String,
    pub data: serde_json::Value,
    pub meta: serde_json::Value,
    pub read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::notifications)]
pub struct NewNotification {
    pub restaurant_id: String,
    pub module: Module,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub link: String,
    pub data: serde_json::Value,
    pub meta: serde_json::Value,
}

/// A browser push subscription, one row per endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = crate::schema::push_subscriptions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PushSubscription {
    pub id: i64,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub restaurant_id: String,
    pub module: Module,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::push_subscriptions)]
pub struct NewPushSubscription {
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub restaurant_id: String,
    pub module: Module,
    pub user_id: Option<String>,
}

/// A domain event accepted at intake, before it becomes a notification.
#[derive(Debug, Clone)]
pub struct DomainEvent {
    pub restaurant_id: String,
    pub module: Module,
    pub kind: String,
    pub data: serde_json::Value,
}

/// Messages carried by the in-process broadcast bus to open dashboards.
#[derive(Debug, Clone)]
pub enum BusMessage {
    NotificationCreated(Notification),
    /// A raw entity snapshot pushed at list views, e.g. an updated reservation.
    EntityUpsert {
        entity: String,
        doc: serde_json::Value,
    },
}

impl BusMessage {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            BusMessage::NotificationCreated(notification) => json!({
                "type": "notification_created",
                "notification": notification,
            }),
            BusMessage::EntityUpsert { entity, doc } => json!({
                "type": format!("{}:upsert", entity),
                "doc": doc,
            }),
        }
    }
}
