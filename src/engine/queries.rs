use chrono::NaiveDate;

use crate::catalog::Catalog;
use crate::model::*;
use crate::sync::{timed, SyncError, SyncOp};

use super::availability::{availability_snapshot, occupied_count, AvailabilitySnapshot};
use super::store::ReservationFilter;
use super::{Engine, EngineError};

/// One render of the reservation list, partitioned on `today`.
#[derive(Debug, Clone)]
pub struct Listing {
    pub today: NaiveDate,
    pub current: Vec<Reservation>,
    pub history: Vec<Reservation>,
}

impl Engine {
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Copy of the current working set.
    pub async fn snapshot(&self) -> Vec<Reservation> {
        self.store.read().await.records().to_vec()
    }

    pub async fn reservation_count(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn get_reservation(&self, id: &ReservationId) -> Result<Reservation, EngineError> {
        self.store
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(id.clone()))
    }

    pub async fn occupied_count(&self, room_type: &str, day: NaiveDate) -> usize {
        occupied_count(room_type, day, self.store.read().await.records())
    }

    pub async fn availability(&self, day: NaiveDate) -> AvailabilitySnapshot {
        let store = self.store.read().await;
        availability_snapshot(&self.catalog, day, store.records())
    }

    /// Filtered listing, evaluated against the clock's current day.
    pub async fn list_reservations(&self, filter: &ReservationFilter) -> Listing {
        let today = self.clock.today();
        let store = self.store.read().await;
        let view = store.filter_and_search(filter, today);
        Listing {
            today,
            current: view.current().into_iter().cloned().collect(),
            history: view.history().into_iter().cloned().collect(),
        }
    }

    /// Remote change history, oldest first.
    pub async fn audit_trail(&self, id: &ReservationId) -> Result<Vec<AuditEntry>, EngineError> {
        let entries = timed(SyncOp::Audit, self.audit.history(id))
            .await
            .map_err(|cause| SyncError { op: SyncOp::Audit, attempts: 1, cause })?;
        Ok(entries)
    }
}
