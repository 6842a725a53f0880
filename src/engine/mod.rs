mod availability;
mod error;
mod mutations;
mod queries;
mod store;
#[cfg(test)]
mod tests;

pub use availability::{
    availability_snapshot, occupied_count, percentage, AvailabilityBand, AvailabilitySnapshot,
    CategoryAvailability, RoomAvailability, Tally,
};
pub use error::{EngineError, ValidationError, ValidationRule};
pub use queries::Listing;
pub use store::{ReservationFilter, ReservationStore, ReservationView, RoomTypeFilter, SortOrder};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::catalog::Catalog;
use crate::clock::Clock;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::remote::{AuditSource, ReservationTable};
use crate::sync::{SyncError, SyncGateway};

/// Outcome of a cancellation. The local record is gone either way.
#[derive(Debug)]
pub enum CancelOutcome {
    Synced(Reservation),
    /// The remote delete failed twice; the record may still exist remotely.
    OutOfSync(Reservation, SyncError),
}

impl CancelOutcome {
    pub fn reservation(&self) -> &Reservation {
        match self {
            CancelOutcome::Synced(r) | CancelOutcome::OutOfSync(r, _) => r,
        }
    }
}

/// Front-desk engine: the reservation store plus its collaborators.
///
/// All mutations hold the store's write lock across the remote call, so a
/// second mutation waits for the first to be durable (or rolled back) before
/// it can touch the store.
pub struct Engine {
    pub(super) store: RwLock<ReservationStore>,
    pub(super) gateway: SyncGateway,
    pub(super) audit: Arc<dyn AuditSource>,
    pub(super) catalog: Catalog,
    pub(super) clock: Arc<dyn Clock>,
    pub notify: Arc<NotifyHub>,
}

impl Engine {
    pub fn new(
        table: Arc<dyn ReservationTable>,
        audit: Arc<dyn AuditSource>,
        clock: Arc<dyn Clock>,
        notify: Arc<NotifyHub>,
    ) -> Self {
        Self {
            store: RwLock::new(ReservationStore::new()),
            gateway: SyncGateway::new(table),
            audit,
            catalog: Catalog::default(),
            clock,
            notify,
        }
    }

    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Pause before the single delete retry.
    pub fn with_delete_retry_delay(mut self, delay: Duration) -> Self {
        self.gateway = self.gateway.with_retry_delay(delay);
        self
    }

    /// Persist `record`; on failure run `undo` against the still-locked store
    /// and announce the rollback.
    pub(super) async fn persist_or_rollback(
        &self,
        store: &mut ReservationStore,
        record: &Reservation,
        mutation: MutationKind,
        undo: impl FnOnce(&mut ReservationStore),
    ) -> Result<(), EngineError> {
        match self.gateway.persist_all(std::slice::from_ref(record)).await {
            Ok(()) => {
                metrics::counter!(crate::observability::MUTATIONS_TOTAL, "op" => mutation.as_str(), "status" => "ok")
                    .increment(1);
                Ok(())
            }
            Err(e) => {
                undo(store);
                tracing::warn!("{} of {} rolled back: {e}", mutation.as_str(), record.id);
                metrics::counter!(crate::observability::MUTATIONS_TOTAL, "op" => mutation.as_str(), "status" => "rolled_back")
                    .increment(1);
                metrics::counter!(crate::observability::ROLLBACKS_TOTAL, "op" => mutation.as_str()).increment(1);
                self.notify.send(&StoreEvent::RolledBack {
                    id: record.id.clone(),
                    room_type: record.room_type.clone(),
                    mutation,
                });
                Err(EngineError::Sync(e))
            }
        }
    }

    pub(super) fn record_cache_size(store: &ReservationStore) {
        metrics::gauge!(crate::observability::RESERVATIONS_CACHED).set(store.len() as f64);
    }
}
