//! Records pulled from the point-of-sale API.
//!
//! Only the fields the pipeline reads are typed. Everything else an upstream
//! record carries is kept in `extra` so snapshots round-trip unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Sheet column order. The header row is written exactly like this.
pub const COLUMNS: [&str; 9] = [
    "id",
    "given_name",
    "family_name",
    "email_address",
    "phone_number",
    "created_at",
    "updated_at",
    "note",
    "last_booked_date",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Derived by the merge; empty when the customer has no recorded activity.
    #[serde(default)]
    pub last_booked_date: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Customer {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// String form of one sheet column. Unknown columns and missing values render empty.
    pub fn column_value(&self, column: &str) -> String {
        let field = match column {
            "id" => return self.id.clone(),
            "last_booked_date" => return self.last_booked_date.clone(),
            "given_name" => &self.given_name,
            "family_name" => &self.family_name,
            "email_address" => &self.email_address,
            "phone_number" => &self.phone_number,
            "created_at" => &self.created_at,
            "updated_at" => &self.updated_at,
            "note" => &self.note,
            other => return self.extra.get(other).map(value_to_cell).unwrap_or_default(),
        };
        field.clone().unwrap_or_default()
    }

    /// One sheet row in `columns` order.
    pub fn to_row(&self, columns: &[&str]) -> Vec<String> {
        columns.iter().map(|c| self.column_value(c)).collect()
    }
}

fn value_to_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PaymentStatus {
    Approved,
    Pending,
    Completed,
    Canceled,
    Failed,
    Other(String),
}

impl From<String> for PaymentStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "APPROVED" => PaymentStatus::Approved,
            "PENDING" => PaymentStatus::Pending,
            "COMPLETED" => PaymentStatus::Completed,
            "CANCELED" => PaymentStatus::Canceled,
            "FAILED" => PaymentStatus::Failed,
            _ => PaymentStatus::Other(s),
        }
    }
}

impl From<PaymentStatus> for String {
    fn from(status: PaymentStatus) -> Self {
        match status {
            PaymentStatus::Approved => "APPROVED".into(),
            PaymentStatus::Pending => "PENDING".into(),
            PaymentStatus::Completed => "COMPLETED".into(),
            PaymentStatus::Canceled => "CANCELED".into(),
            PaymentStatus::Failed => "FAILED".into(),
            PaymentStatus::Other(s) => s,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PaymentStatus>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Payment {
    pub fn is_completed(&self) -> bool {
        matches!(self.status, Some(PaymentStatus::Completed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn customer_keeps_unknown_fields_through_snapshot() {
        let raw = json!({
            "id": "C1",
            "given_name": "Ada",
            "preferences": { "email_unsubscribed": false },
            "version": 3
        });
        let customer: Customer = serde_json::from_value(raw).unwrap();
        assert_eq!(customer.given_name.as_deref(), Some("Ada"));
        assert_eq!(customer.last_booked_date, "");

        let back = serde_json::to_value(&customer).unwrap();
        assert_eq!(back["preferences"]["email_unsubscribed"], json!(false));
        assert_eq!(back["version"], json!(3));
    }

    #[test]
    fn missing_fields_render_as_empty_cells() {
        let mut customer = Customer::new("C2");
        customer.email_address = Some("c2@example.com".into());
        let row = customer.to_row(&COLUMNS);
        assert_eq!(
            row,
            vec!["C2", "", "", "c2@example.com", "", "", "", "", ""]
        );
    }

    #[test]
    fn unknown_payment_status_is_preserved() {
        let payment: Payment =
            serde_json::from_value(json!({ "customer_id": "C1", "status": "REFUNDED" })).unwrap();
        assert_eq!(payment.status, Some(PaymentStatus::Other("REFUNDED".into())));
        assert!(!payment.is_completed());
        assert_eq!(serde_json::to_value(&payment).unwrap()["status"], json!("REFUNDED"));
    }
}
