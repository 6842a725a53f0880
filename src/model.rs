use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ulid::Ulid;

use crate::calendar;

/// Opaque client-generated reservation id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReservationId(String);

impl ReservationId {
    pub fn generate() -> Self {
        Self(Ulid::new().to_string().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReservationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ReservationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Half-open range of calendar days `[start, end)`.
///
/// The checkout day is not part of the stay. An inverted span is empty and
/// overlaps nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaySpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DaySpan {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The single night starting on `day`.
    pub fn night_of(day: NaiveDate) -> Self {
        Self::new(day, calendar::next_day(day))
    }

    pub fn overlaps(&self, other: &DaySpan) -> bool {
        calendar::overlaps(self.start, self.end, other.start, other.end)
    }

    pub fn nights(&self) -> i64 {
        (self.end - self.start).num_days().max(0)
    }
}

// ── Price ────────────────────────────────────────────────────────

/// Non-negative amount in integer cents (single currency).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price {
    cents: i64,
}

/// Amounts above this are rejected as input noise.
const MAX_PRICE_CENTS: i64 = 100_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    Malformed(String),
    Negative,
    TooLarge,
}

impl fmt::Display for PriceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceError::Malformed(s) => write!(f, "malformed price: {s:?}"),
            PriceError::Negative => write!(f, "price must not be negative"),
            PriceError::TooLarge => write!(f, "price too large"),
        }
    }
}

impl std::error::Error for PriceError {}

impl Price {
    pub fn from_cents(cents: i64) -> Result<Self, PriceError> {
        if cents < 0 {
            return Err(PriceError::Negative);
        }
        if cents > MAX_PRICE_CENTS {
            return Err(PriceError::TooLarge);
        }
        Ok(Self { cents })
    }

    /// Convert a floating amount from the remote, rounding to the cent.
    pub fn from_f64(amount: f64) -> Result<Self, PriceError> {
        if !amount.is_finite() {
            return Err(PriceError::Malformed(amount.to_string()));
        }
        if amount < 0.0 {
            return Err(PriceError::Negative);
        }
        let cents = (amount * 100.0).round();
        if cents > MAX_PRICE_CENTS as f64 {
            return Err(PriceError::TooLarge);
        }
        Self::from_cents(cents as i64)
    }

    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Staff-facing rendering, e.g. `R$ 150,00`.
    pub fn brl(&self) -> String {
        format!("R$ {},{:02}", self.cents / 100, self.cents % 100)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.cents / 100, self.cents % 100)
    }
}

impl FromStr for Price {
    type Err = PriceError;

    /// Accepts `150`, `150.5`, `150,50`; at most two decimal places.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(rest) = trimmed.strip_prefix('-')
            && !rest.is_empty()
        {
            return Err(PriceError::Negative);
        }
        let normalized = trimmed.replace(',', ".");
        let (int, frac) = normalized.split_once('.').unwrap_or((normalized.as_str(), ""));
        let digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
        if (int.is_empty() && frac.is_empty()) || !digits(int) || !digits(frac) || frac.len() > 2 {
            return Err(PriceError::Malformed(s.to_string()));
        }
        if int.len() > 12 {
            return Err(PriceError::TooLarge);
        }
        let whole: i64 = if int.is_empty() {
            0
        } else {
            int.parse().map_err(|_| PriceError::Malformed(s.to_string()))?
        };
        let fraction: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| PriceError::Malformed(s.to_string()))? * 10,
            _ => frac.parse().map_err(|_| PriceError::Malformed(s.to_string()))?,
        };
        Self::from_cents(whole * 100 + fraction)
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PriceRepr {
    Number(f64),
    Text(String),
}

impl PriceRepr {
    fn into_price(self) -> Result<Option<Price>, PriceError> {
        match self {
            PriceRepr::Number(n) => Price::from_f64(n).map(Some),
            PriceRepr::Text(t) if t.trim().is_empty() => Ok(None),
            PriceRepr::Text(t) => t.parse().map(Some),
        }
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        PriceRepr::deserialize(deserializer)?
            .into_price()
            .map_err(serde::de::Error::custom)?
            .ok_or_else(|| serde::de::Error::custom("empty price"))
    }
}

/// Remote price column: null, empty text, a number or decimal text.
pub(crate) fn deserialize_optional_price<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Price>, D::Error> {
    match Option::<PriceRepr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(repr) => repr.into_price().map_err(serde::de::Error::custom),
    }
}

// ── Reservation ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub id: ReservationId,
    pub guest_name: String,
    pub phone: Option<String>,
    /// Room type id. Not checked against the catalog.
    pub room_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub notes: Option<String>,
    pub price: Option<Price>,
    pub responsible: Option<String>,
    /// Staff shortlist marker; no business meaning.
    pub on_clipboard: bool,
}

impl Reservation {
    pub fn stay(&self) -> DaySpan {
        DaySpan::new(self.start_date, self.end_date)
    }

    /// Guest arrives on `today`.
    pub fn is_arrival(&self, today: NaiveDate) -> bool {
        self.start_date == today
    }
}

/// Booking form input. Dates are raw `YYYY-MM-DD` text.
#[derive(Debug, Clone, Default)]
pub struct NewReservation {
    pub guest_name: String,
    pub phone: Option<String>,
    pub room_type: String,
    pub start_date: String,
    pub end_date: String,
    pub notes: Option<String>,
    pub price: Option<Price>,
    pub responsible: Option<String>,
}

/// Edit form input. `None` leaves a field untouched; an empty string clears an
/// optional text field.
#[derive(Debug, Clone, Default)]
pub struct ReservationPatch {
    pub guest_name: Option<String>,
    pub phone: Option<String>,
    pub room_type: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub notes: Option<String>,
    /// `Some(None)` clears the price.
    pub price: Option<Option<Price>>,
    pub responsible: Option<String>,
    pub on_clipboard: Option<bool>,
}

impl ReservationPatch {
    pub fn is_empty(&self) -> bool {
        self.guest_name.is_none()
            && self.phone.is_none()
            && self.room_type.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.notes.is_none()
            && self.price.is_none()
            && self.responsible.is_none()
            && self.on_clipboard.is_none()
    }
}

/// Trim, mapping blank text to `None`.
pub fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

// ── Audit trail ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Created,
    Updated,
    Deleted,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Created => "created",
            AuditAction::Updated => "updated",
            AuditAction::Deleted => "deleted",
        }
    }
}

/// One remote change record. Displayed, never computed locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub action: AuditAction,
    #[serde(rename = "changed_at")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub changed_fields: Option<Vec<String>>,
}

// ── Store change notifications ───────────────────────────────────

/// Local mutation kinds, used for rollback reporting and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Update,
    ToggleClipboard,
    Cancel,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Create => "create",
            MutationKind::Update => "update",
            MutationKind::ToggleClipboard => "toggle_clipboard",
            MutationKind::Cancel => "cancel",
        }
    }
}

/// Broadcast to views so they re-render from current store state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Loaded {
        count: usize,
    },
    Created {
        id: ReservationId,
        room_type: String,
    },
    Updated {
        id: ReservationId,
        room_type: String,
    },
    Cancelled {
        id: ReservationId,
        room_type: String,
    },
    ClipboardToggled {
        id: ReservationId,
        room_type: String,
        on_clipboard: bool,
    },
    RolledBack {
        id: ReservationId,
        room_type: String,
        mutation: MutationKind,
    },
    /// Removed locally but still present remotely.
    Diverged {
        id: ReservationId,
        room_type: String,
    },
}

impl StoreEvent {
    pub fn room_type(&self) -> Option<&str> {
        match self {
            StoreEvent::Loaded { .. } => None,
            StoreEvent::Created { room_type, .. }
            | StoreEvent::Updated { room_type, .. }
            | StoreEvent::Cancelled { room_type, .. }
            | StoreEvent::ClipboardToggled { room_type, .. }
            | StoreEvent::RolledBack { room_type, .. }
            | StoreEvent::Diverged { room_type, .. } => Some(room_type),
        }
    }
}
