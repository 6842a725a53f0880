//! Collaborator seams for the remote database service.
//!
//! Every call returns `RemoteResult`; any error is a hard failure, never a
//! partial success.

pub mod memory;
pub mod rest;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::calendar::parse_day;
use crate::model::{deserialize_optional_price, AuditEntry, Price, Reservation, ReservationId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Connection, timeout or other transport failure.
    Transport(String),
    /// Non-2xx response.
    Status { status: u16, body: String },
    /// Response body did not match the expected shape.
    Decode(String),
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteError::Transport(e) => write!(f, "transport error: {e}"),
            RemoteError::Status { status, body } if body.is_empty() => write!(f, "remote returned {status}"),
            RemoteError::Status { status, body } => write!(f, "remote returned {status}: {body}"),
            RemoteError::Decode(e) => write!(f, "unexpected response: {e}"),
        }
    }
}

impl std::error::Error for RemoteError {}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RemoteError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            RemoteError::Status { status: status.as_u16(), body: String::new() }
        } else {
            RemoteError::Transport(e.to_string())
        }
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// The durable `reservas` table.
#[async_trait]
pub trait ReservationTable: Send + Sync {
    /// Every row, undecoded. Column decoding happens per row so one bad row
    /// can be skipped without failing the whole load.
    async fn select_all(&self) -> RemoteResult<Vec<serde_json::Value>>;

    /// Insert-or-replace keyed by `id`.
    async fn upsert(&self, rows: &[ReservationRow]) -> RemoteResult<()>;

    async fn delete(&self, id: &ReservationId) -> RemoteResult<()>;
}

/// Read-only change history for a reservation, oldest first.
#[async_trait]
pub trait AuditSource: Send + Sync {
    async fn history(&self, id: &ReservationId) -> RemoteResult<Vec<AuditEntry>>;
}

/// Wire shape of one `reservas` row (camelCase columns, text dates).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationRow {
    pub id: String,
    #[serde(default)]
    pub guest_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub room_type: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_price")]
    pub price: Option<Price>,
    #[serde(default)]
    pub responsible: Option<String>,
    #[serde(default)]
    pub on_clipboard: Option<bool>,
}

impl From<&Reservation> for ReservationRow {
    fn from(r: &Reservation) -> Self {
        Self {
            id: r.id.to_string(),
            guest_name: Some(r.guest_name.clone()),
            phone: r.phone.clone(),
            room_type: Some(r.room_type.clone()),
            start_date: Some(r.start_date.format("%Y-%m-%d").to_string()),
            end_date: Some(r.end_date.format("%Y-%m-%d").to_string()),
            notes: r.notes.clone(),
            price: r.price,
            responsible: r.responsible.clone(),
            on_clipboard: Some(r.on_clipboard),
        }
    }
}

/// A remote row that cannot become a `Reservation`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub id: String,
    pub reason: String,
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "row {}: {}", self.id, self.reason)
    }
}

impl std::error::Error for RowError {}

impl ReservationRow {
    /// Decode one raw remote row. The id is reported as `?` when it is
    /// missing or not text.
    pub fn from_raw(raw: serde_json::Value) -> Result<Self, RowError> {
        let id = raw.get("id").and_then(|v| v.as_str()).unwrap_or("?").to_string();
        serde_json::from_value(raw).map_err(|e| RowError { id, reason: e.to_string() })
    }
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = RowError;

    fn try_from(row: ReservationRow) -> Result<Self, Self::Error> {
        let fail = |reason: &str| RowError { id: row.id.clone(), reason: reason.to_string() };
        if row.id.is_empty() {
            return Err(fail("empty id"));
        }
        let start_date = row
            .start_date
            .as_deref()
            .and_then(parse_day)
            .ok_or_else(|| fail("unparseable startDate"))?;
        let end_date = row
            .end_date
            .as_deref()
            .and_then(parse_day)
            .ok_or_else(|| fail("unparseable endDate"))?;
        Ok(Reservation {
            id: ReservationId::from(row.id),
            guest_name: row.guest_name.unwrap_or_default(),
            phone: row.phone,
            room_type: row.room_type.unwrap_or_default(),
            start_date,
            end_date,
            notes: row.notes,
            price: row.price,
            responsible: row.responsible,
            on_clipboard: row.on_clipboard.unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_decodes_loose_remote_values() {
        let json = r#"{
            "id": "abc123",
            "guestName": "Maria Souza",
            "phone": null,
            "roomType": "duplo",
            "startDate": "2025-01-10",
            "endDate": "2025-01-12",
            "notes": "",
            "price": "",
            "responsible": "ana",
            "onClipboard": null
        }"#;
        let row: ReservationRow = serde_json::from_str(json).unwrap();
        assert_eq!(row.price, None);
        let r = Reservation::try_from(row).unwrap();
        assert_eq!(r.id.as_str(), "abc123");
        assert!(!r.on_clipboard);
        assert_eq!(r.stay().nights(), 2);
    }

    #[test]
    fn row_price_as_number_or_text() {
        let row: ReservationRow =
            serde_json::from_str(r#"{"id":"a","startDate":"2025-01-10","endDate":"2025-01-11","price":320.5}"#)
                .unwrap();
        assert_eq!(row.price.map(|p| p.cents()), Some(32_050));
        let row: ReservationRow =
            serde_json::from_str(r#"{"id":"a","startDate":"2025-01-10","endDate":"2025-01-11","price":"320"}"#)
                .unwrap();
        assert_eq!(row.price.map(|p| p.cents()), Some(32_000));
    }

    #[test]
    fn raw_rows_with_bad_columns_are_rejected_alone() {
        let err = ReservationRow::from_raw(serde_json::json!({
            "id": "p1", "startDate": "2025-01-10", "endDate": "2025-01-11", "price": "R$ 150"
        }))
        .unwrap_err();
        assert_eq!(err.id, "p1");
        assert!(err.reason.contains("R$ 150"), "{}", err.reason);

        let err = ReservationRow::from_raw(serde_json::json!({
            "id": 42, "startDate": "2025-01-10", "endDate": "2025-01-11"
        }))
        .unwrap_err();
        assert_eq!(err.id, "?");

        let err = ReservationRow::from_raw(serde_json::json!({ "startDate": "2025-01-10" })).unwrap_err();
        assert_eq!(err.id, "?");

        let row = ReservationRow::from_raw(serde_json::json!({
            "id": "ok", "startDate": "2025-01-10", "endDate": "2025-01-11", "price": 99
        }))
        .unwrap();
        assert_eq!(row.price.map(|p| p.cents()), Some(9_900));
    }

    #[test]
    fn row_with_bad_date_is_rejected() {
        let row: ReservationRow =
            serde_json::from_str(r#"{"id":"x1","startDate":"10/01/2025","endDate":"2025-01-11"}"#).unwrap();
        let err = Reservation::try_from(row).unwrap_err();
        assert_eq!(err.id, "x1");
        assert_eq!(err.reason, "unparseable startDate");
    }

    #[test]
    fn row_encodes_camel_case_columns() {
        let row: ReservationRow =
            serde_json::from_str(r#"{"id":"a","guestName":"Rui","roomType":"casal","startDate":"2025-03-01","endDate":"2025-03-04","price":"99,90","onClipboard":true}"#)
                .unwrap();
        let r = Reservation::try_from(row).unwrap();
        let value = serde_json::to_value(ReservationRow::from(&r)).unwrap();
        assert_eq!(value["guestName"], "Rui");
        assert_eq!(value["roomType"], "casal");
        assert_eq!(value["startDate"], "2025-03-01");
        assert_eq!(value["price"], "99.90");
        assert_eq!(value["onClipboard"], true);
    }
}
