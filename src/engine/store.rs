use chrono::NaiveDate;

use crate::calendar::parse_day;
use crate::limits::*;
use crate::model::*;

use super::error::{EngineError, ValidationError, ValidationRule};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RoomTypeFilter {
    #[default]
    All,
    Only(String),
}

impl RoomTypeFilter {
    fn matches(&self, room_type: &str) -> bool {
        match self {
            RoomTypeFilter::All => true,
            RoomTypeFilter::Only(id) => id == room_type,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Listing predicate: room type, case-insensitive guest-name substring, and
/// the order both buckets are sorted by `startDate`.
#[derive(Debug, Clone, Default)]
pub struct ReservationFilter {
    pub room_type: RoomTypeFilter,
    pub search: Option<String>,
    pub order: SortOrder,
}

impl ReservationFilter {
    fn matches(&self, r: &Reservation, needle: Option<&str>) -> bool {
        self.room_type.matches(&r.room_type)
            && needle.is_none_or(|n| r.guest_name.to_lowercase().contains(n))
    }
}

/// Filtered view over the store. Nothing is computed until a bucket is
/// requested, and every request re-evaluates against `today`.
pub struct ReservationView<'a> {
    records: &'a [Reservation],
    filter: &'a ReservationFilter,
    today: NaiveDate,
}

impl<'a> ReservationView<'a> {
    /// Stays starting today or later.
    pub fn current(&self) -> Vec<&'a Reservation> {
        self.bucket(|r| r.start_date >= self.today)
    }

    /// Stays that started before today.
    pub fn history(&self) -> Vec<&'a Reservation> {
        self.bucket(|r| r.start_date < self.today)
    }

    fn bucket(&self, keep: impl Fn(&Reservation) -> bool) -> Vec<&'a Reservation> {
        let needle = self
            .filter
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        let mut out: Vec<&'a Reservation> = self
            .records
            .iter()
            .filter(|&r| keep(r) && self.filter.matches(r, needle.as_deref()))
            .collect();
        match self.filter.order {
            SortOrder::Ascending => out.sort_by_key(|r| r.start_date),
            SortOrder::Descending => out.sort_by(|a, b| b.start_date.cmp(&a.start_date)),
        }
        out
    }
}

/// The canonical in-memory working set. Only its own methods mutate it.
#[derive(Debug, Default)]
pub struct ReservationStore {
    records: Vec<Reservation>,
}

impl ReservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<Reservation>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Reservation] {
        &self.records
    }

    pub fn get(&self, id: &ReservationId) -> Option<&Reservation> {
        self.records.iter().find(|r| &r.id == id)
    }

    pub fn contains(&self, id: &ReservationId) -> bool {
        self.get(id).is_some()
    }

    fn position(&self, id: &ReservationId) -> Result<usize, EngineError> {
        self.records
            .iter()
            .position(|r| &r.id == id)
            .ok_or_else(|| EngineError::NotFound(id.clone()))
    }

    /// Validate a form submission, assign a fresh id and append it.
    pub fn add(&mut self, candidate: NewReservation) -> Result<&Reservation, EngineError> {
        if self.records.len() >= MAX_RESERVATIONS {
            return Err(EngineError::LimitExceeded("too many reservations"));
        }
        let start_date = required_day("startDate", &candidate.start_date)?;
        let end_date = required_day("endDate", &candidate.end_date)?;

        let mut id = ReservationId::generate();
        while self.contains(&id) {
            id = ReservationId::generate();
        }
        let record = Reservation {
            id,
            guest_name: candidate.guest_name.trim().to_string(),
            phone: non_blank(candidate.phone),
            room_type: candidate.room_type.trim().to_string(),
            start_date,
            end_date,
            notes: non_blank(candidate.notes),
            price: candidate.price,
            responsible: non_blank(candidate.responsible),
            on_clipboard: false,
        };
        validate(&record)?;
        self.records.push(record);
        let idx = self.records.len() - 1;
        Ok(&self.records[idx])
    }

    /// Apply `patch` in place. The merged record is re-validated; on failure
    /// nothing changes. Returns the record as it was before.
    pub fn update(&mut self, id: &ReservationId, patch: ReservationPatch) -> Result<Reservation, EngineError> {
        let idx = self.position(id)?;
        let mut next = self.records[idx].clone();
        if let Some(name) = patch.guest_name {
            next.guest_name = name.trim().to_string();
        }
        if let Some(phone) = patch.phone {
            next.phone = non_blank(Some(phone));
        }
        if let Some(room_type) = patch.room_type {
            next.room_type = room_type.trim().to_string();
        }
        if let Some(start) = patch.start_date {
            next.start_date = required_day("startDate", &start)?;
        }
        if let Some(end) = patch.end_date {
            next.end_date = required_day("endDate", &end)?;
        }
        if let Some(notes) = patch.notes {
            next.notes = non_blank(Some(notes));
        }
        if let Some(price) = patch.price {
            next.price = price;
        }
        if let Some(responsible) = patch.responsible {
            next.responsible = non_blank(Some(responsible));
        }
        if let Some(flag) = patch.on_clipboard {
            next.on_clipboard = flag;
        }
        validate(&next)?;
        Ok(std::mem::replace(&mut self.records[idx], next))
    }

    /// Delete by id. An absent id is `NotFound`, never a silent no-op.
    pub fn remove(&mut self, id: &ReservationId) -> Result<Reservation, EngineError> {
        let idx = self.position(id)?;
        Ok(self.records.remove(idx))
    }

    /// Flip the shortlist flag, returning the new value.
    pub fn toggle_clipboard(&mut self, id: &ReservationId) -> Result<bool, EngineError> {
        let idx = self.position(id)?;
        let r = &mut self.records[idx];
        r.on_clipboard = !r.on_clipboard;
        Ok(r.on_clipboard)
    }

    pub fn filter_and_search<'a>(&'a self, filter: &'a ReservationFilter, today: NaiveDate) -> ReservationView<'a> {
        ReservationView { records: &self.records, filter, today }
    }

    pub fn replace_all(&mut self, records: Vec<Reservation>) {
        self.records = records;
    }

    // ── Rollback ─────────────────────────────────────────────

    /// Undo an `add`.
    pub(super) fn discard(&mut self, id: &ReservationId) {
        self.records.retain(|r| &r.id != id);
    }

    /// Undo a clipboard toggle. A missing record has nothing to undo.
    pub(super) fn flip_clipboard(&mut self, id: &ReservationId) {
        if let Some(r) = self.records.iter_mut().find(|r| &r.id == id) {
            r.on_clipboard = !r.on_clipboard;
        }
    }

    /// Put back a previous version of a record, in place if it still exists.
    pub(super) fn restore(&mut self, previous: Reservation) {
        match self.records.iter_mut().find(|r| r.id == previous.id) {
            Some(slot) => *slot = previous,
            None => self.records.push(previous),
        }
    }
}

fn required_day(field: &'static str, raw: &str) -> Result<NaiveDate, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::new(field, ValidationRule::Required));
    }
    parse_day(raw).ok_or(ValidationError::new(field, ValidationRule::Malformed))
}

fn max_len(field: &'static str, value: Option<&str>, max: usize) -> Result<(), ValidationError> {
    match value {
        Some(v) if v.chars().count() > max => Err(ValidationError::new(field, ValidationRule::TooLong(max))),
        _ => Ok(()),
    }
}

fn validate(r: &Reservation) -> Result<(), ValidationError> {
    if r.guest_name.is_empty() {
        return Err(ValidationError::new("guestName", ValidationRule::Required));
    }
    max_len("guestName", Some(&r.guest_name), MAX_GUEST_NAME_LEN)?;
    max_len("phone", r.phone.as_deref(), MAX_PHONE_LEN)?;
    max_len("roomType", Some(&r.room_type), MAX_ROOM_TYPE_LEN)?;
    max_len("notes", r.notes.as_deref(), MAX_NOTES_LEN)?;
    max_len("responsible", r.responsible.as_deref(), MAX_RESPONSIBLE_LEN)?;
    if r.start_date >= r.end_date {
        return Err(ValidationError::new("endDate", ValidationRule::StartNotBeforeEnd));
    }
    if r.stay().nights() > MAX_STAY_NIGHTS {
        return Err(ValidationError::new("endDate", ValidationRule::StayTooLong(MAX_STAY_NIGHTS)));
    }
    Ok(())
}
