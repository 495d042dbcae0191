use serde_json::{json, Value};

/// Projects the routing fields a push payload carries for `kind`.
///
/// Same totality as the content builder: unknown kinds get an empty object,
/// declared fields that are absent from `data` are simply left out.
pub fn build_meta(kind: &str, data: &Value) -> Value {
    match kind {
        "reservation_created" | "reservation_updated" => {
            pick(data, &["customer", "covers", "date", "time"])
        }
        "reservation_cancelled" => pick(data, &["customer", "date"]),
        "gift_card_purchased" => pick(data, &["buyer", "amount", "reference"]),
        "gift_card_redeemed" => pick(data, &["reference", "amount"]),
        "leave_request_created" => pick(data, &["employee", "start_date", "end_date", "day_part"]),
        "leave_request_approved" | "leave_request_rejected" => {
            pick(data, &["employee", "start_date", "end_date"])
        }
        "document_uploaded" => pick(data, &["name", "category"]),
        "document_expiring" => pick(data, &["name", "expires_at"]),
        "temperature_alert" => pick(data, &["equipment", "value", "threshold"]),
        "noncompliance_reported" => pick(data, &["area", "severity"]),
        "wine_stock_low" => pick(data, &["wine", "remaining"]),
        _ => json!({}),
    }
}

fn pick(data: &Value, fields: &[&str]) -> Value {
    let mut meta = serde_json::Map::new();
    for field in fields {
        if let Some(value) = data.get(field) {
            meta.insert((*field).to_string(), value.clone());
        }
    }
    Value::Object(meta)
}
