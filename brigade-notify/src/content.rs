use chrono::{DateTime, NaiveDate};
use serde_json::Value;
use tracing;

/// Every notification kind the catalog formats explicitly. Kinds outside
/// this list still dispatch, through the fallback branch.
pub const KNOWN_KINDS: [&str; 13] = [
    "reservation_created",
    "reservation_updated",
    "reservation_cancelled",
    "gift_card_purchased",
    "gift_card_redeemed",
    "leave_request_created",
    "leave_request_approved",
    "leave_request_rejected",
    "document_uploaded",
    "document_expiring",
    "temperature_alert",
    "noncompliance_reported",
    "wine_stock_low",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationContent {
    pub title: String,
    pub message: String,
    pub link: String,
}

/// Formats the French title/message/link for an event.
///
/// Total over any `kind` string: missing fields degrade to placeholder text
/// and unknown kinds hit the generic branch. Formatting never fails.
pub fn build_content(kind: &str, data: &Value) -> NotificationContent {
    let (title, message, link) = match kind {
        // Reservations
        "reservation_created" => {
            let customer = text(data, "customer", "Un client");
            let covers = data.get("covers").and_then(Value::as_u64).unwrap_or(1);
            let date = date_field(data, "date");
            let mut message = format!(
                "{} a réservé pour {} personne(s) le {}",
                customer, covers, date
            );
            if let Some(time) = data.get("time").and_then(Value::as_str) {
                message.push_str(&format!(" à {}", time));
            }
            ("Nouvelle réservation".to_string(), message, "/reservations")
        }
        "reservation_updated" => {
            let customer = text(data, "customer", "Un client");
            let date = date_field(data, "date");
            (
                "Réservation modifiée".to_string(),
                format!("La réservation de {} du {} a été modifiée", customer, date),
                "/reservations",
            )
        }
        "reservation_cancelled" => {
            let customer = text(data, "customer", "Un client");
            let date = date_field(data, "date");
            (
                "Réservation annulée".to_string(),
                format!("La réservation de {} du {} a été annulée", customer, date),
                "/reservations",
            )
        }
        // Gift cards
        "gift_card_purchased" => {
            let buyer = text(data, "buyer", "Un client");
            let amount = data.get("amount").and_then(Value::as_f64).unwrap_or(0.0);
            (
                "Nouveau bon cadeau".to_string(),
                format!("{} a acheté un bon cadeau de {} €", buyer, amount),
                "/gift-cards",
            )
        }
        "gift_card_redeemed" => {
            let message = match data.get("reference").and_then(Value::as_str) {
                Some(reference) => format!("Le bon cadeau {} a été utilisé", reference),
                None => "Un bon cadeau a été utilisé".to_string(),
            };
            ("Bon cadeau utilisé".to_string(), message, "/gift-cards")
        }
        // Leave requests
        "leave_request_created" => {
            let employee = text(data, "employee", "Un employé");
            let start = data.get("start_date").and_then(Value::as_str);
            let end = data.get("end_date").and_then(Value::as_str);
            let message = match (start, end) {
                (Some(from), Some(to)) if from != to => format!(
                    "{} a demandé un congé du {} au {}",
                    employee,
                    french_date(from),
                    french_date(to)
                ),
                _ => {
                    let date = start
                        .or(end)
                        .map(french_date)
                        .unwrap_or_else(|| "?".to_string());
                    let mut message = format!("{} a demandé un congé le {}", employee, date);
                    match data.get("day_part").and_then(Value::as_str) {
                        Some("morning") => message.push_str(" (matin)"),
                        Some("afternoon") => message.push_str(" (après-midi)"),
                        _ => {}
                    }
                    message
                }
            };
            ("Demande de congés".to_string(), message, "/leave-requests")
        }
        "leave_request_approved" => {
            let employee = text(data, "employee", "Un employé");
            (
                "Congés approuvés".to_string(),
                format!("La demande de congés de {} a été approuvée", employee),
                "/leave-requests",
            )
        }
        "leave_request_rejected" => {
            let employee = text(data, "employee", "Un employé");
            (
                "Congés refusés".to_string(),
                format!("La demande de congés de {} a été refusée", employee),
                "/leave-requests",
            )
        }
        // Documents
        "document_uploaded" => {
            let name = text(data, "name", "sans titre");
            (
                "Nouveau document".to_string(),
                format!("Le document « {} » a été ajouté", name),
                "/documents",
            )
        }
        "document_expiring" => {
            let name = text(data, "name", "sans titre");
            let date = date_field(data, "expires_at");
            (
                "Document bientôt expiré".to_string(),
                format!("Le document « {} » expire le {}", name, date),
                "/documents",
            )
        }
        // HACCP
        "temperature_alert" => {
            let equipment = text(data, "equipment", "un équipement");
            let value = data.get("value").and_then(Value::as_f64).unwrap_or(0.0);
            (
                "Alerte température".to_string(),
                format!("Relevé hors plage pour {} : {} °C", equipment, value),
                "/haccp",
            )
        }
        "noncompliance_reported" => {
            let message = match data.get("area").and_then(Value::as_str) {
                Some(area) => format!("Une non-conformité a été signalée : {}", area),
                None => "Une non-conformité a été signalée".to_string(),
            };
            ("Non-conformité signalée".to_string(), message, "/haccp")
        }
        // Wine list
        "wine_stock_low" => {
            let wine = text(data, "wine", "ce vin");
            let remaining = data.get("remaining").and_then(Value::as_u64).unwrap_or(0);
            (
                "Stock de vin faible".to_string(),
                format!("Il ne reste que {} bouteille(s) de {}", remaining, wine),
                "/wine-list",
            )
        }
        _ => {
            tracing::debug!("Unknown notification kind: {}", kind);
            (
                "Notification".to_string(),
                "Vous avez reçu une nouvelle notification".to_string(),
                "/notifications",
            )
        }
    };

    NotificationContent {
        title,
        message,
        link: link.to_string(),
    }
}

fn text<'a>(data: &'a Value, field: &str, placeholder: &'a str) -> &'a str {
    data.get(field).and_then(Value::as_str).unwrap_or(placeholder)
}

fn date_field(data: &Value, field: &str) -> String {
    data.get(field)
        .and_then(Value::as_str)
        .map(french_date)
        .unwrap_or_else(|| "?".to_string())
}

/// Renders `dd/mm/YYYY` from a date or RFC 3339 timestamp string.
/// Anything unparsable passes through verbatim.
fn french_date(raw: &str) -> String {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.format("%d/%m/%Y").to_string();
    }
    if let Ok(stamp) = DateTime::parse_from_rfc3339(raw) {
        return stamp.format("%d/%m/%Y").to_string();
    }
    raw.to_string()
}
