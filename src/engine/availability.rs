use chrono::NaiveDate;

use crate::catalog::{Catalog, RoomType};
use crate::model::*;

// ── Occupancy ────────────────────────────────────────────────────

/// Reservations of `room_type` whose stay covers the night of `day`.
///
/// Every view that reports occupancy goes through here. The count may exceed
/// the room type's inventory; that is overbooking and is reported as-is.
pub fn occupied_count(room_type: &str, day: NaiveDate, reservations: &[Reservation]) -> usize {
    let night = DaySpan::night_of(day);
    reservations
        .iter()
        .filter(|r| r.room_type == room_type && r.stay().overlaps(&night))
        .count()
}

/// `round(100 * part / total)`, halves rounded up. A zero total yields 0.
pub fn percentage(part: i64, total: i64) -> i64 {
    if total <= 0 {
        return 0;
    }
    (200 * part + total).div_euclid(2 * total)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvailabilityBand {
    None,
    Low,
    Medium,
    High,
}

impl AvailabilityBand {
    /// Band for an available-share percentage. Zero and negative (overbooked)
    /// are both `None`.
    pub fn from_percentage(pct: i64) -> Self {
        match pct {
            ..=0 => AvailabilityBand::None,
            1..30 => AvailabilityBand::Low,
            30..60 => AvailabilityBand::Medium,
            _ => AvailabilityBand::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AvailabilityBand::None => "none",
            AvailabilityBand::Low => "low",
            AvailabilityBand::Medium => "medium",
            AvailabilityBand::High => "high",
        }
    }
}

// ── Snapshot ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomAvailability {
    pub room_type: RoomType,
    pub occupied: usize,
    /// `total - occupied`; negative when overbooked.
    pub available: i64,
    pub percentage: i64,
    pub band: AvailabilityBand,
}

/// Summed availability over a group of room types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tally {
    pub available: i64,
    pub total: i64,
}

impl Tally {
    fn add(&mut self, available: i64, total: i64) {
        self.available += available;
        self.total += total;
    }

    pub fn occupied(&self) -> i64 {
        self.total - self.available
    }

    pub fn percentage(&self) -> i64 {
        percentage(self.available, self.total)
    }

    pub fn occupancy_percentage(&self) -> i64 {
        percentage(self.occupied(), self.total)
    }

    pub fn band(&self) -> AvailabilityBand {
        AvailabilityBand::from_percentage(self.percentage())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryAvailability {
    pub category: &'static str,
    pub rooms: Vec<RoomAvailability>,
    pub tally: Tally,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilitySnapshot {
    pub day: NaiveDate,
    pub categories: Vec<CategoryAvailability>,
    pub overall: Tally,
}

impl AvailabilitySnapshot {
    pub fn room(&self, id: &str) -> Option<&RoomAvailability> {
        self.categories
            .iter()
            .flat_map(|c| c.rooms.iter())
            .find(|r| r.room_type.id == id)
    }
}

/// Availability of every catalogued room type on `day`, grouped by category
/// in catalog order, with per-category and overall totals.
pub fn availability_snapshot(catalog: &Catalog, day: NaiveDate, reservations: &[Reservation]) -> AvailabilitySnapshot {
    let mut overall = Tally::default();
    let categories = catalog
        .list_categories()
        .into_iter()
        .map(|category| {
            let mut tally = Tally::default();
            let rooms = catalog
                .rooms_in_category(category)
                .map(|room| {
                    let occupied = occupied_count(room.id, day, reservations);
                    let total = i64::from(room.total);
                    let available = total - occupied as i64;
                    tally.add(available, total);
                    let pct = percentage(available, total);
                    RoomAvailability {
                        room_type: room.clone(),
                        occupied,
                        available,
                        percentage: pct,
                        band: AvailabilityBand::from_percentage(pct),
                    }
                })
                .collect();
            overall.add(tally.available, tally.total);
            CategoryAvailability { category, rooms, tally }
        })
        .collect();
    AvailabilitySnapshot { day, categories, overall }
}
