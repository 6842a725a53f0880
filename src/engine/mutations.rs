use tracing::{error, info};

use crate::limits::MAX_RESERVATIONS;
use crate::model::*;
use crate::observability;

use super::{CancelOutcome, Engine, EngineError};

impl Engine {
    /// Replace the local cache wholesale with the remote collection.
    pub async fn reload(&self) -> Result<usize, EngineError> {
        let records = self.gateway.reload_all().await?;
        if records.len() > MAX_RESERVATIONS {
            return Err(EngineError::LimitExceeded("too many reservations"));
        }
        let mut store = self.store.write().await;
        store.replace_all(records);
        let count = store.len();
        Self::record_cache_size(&store);
        info!("loaded {count} reservations");
        self.notify.send(&StoreEvent::Loaded { count });
        Ok(count)
    }

    pub async fn create_reservation(&self, candidate: NewReservation) -> Result<Reservation, EngineError> {
        let mut store = self.store.write().await;
        let record = match store.add(candidate) {
            Ok(r) => r.clone(),
            Err(e) => {
                metrics::counter!(observability::MUTATIONS_TOTAL, "op" => "create", "status" => "rejected").increment(1);
                return Err(e);
            }
        };
        self.persist_or_rollback(&mut store, &record, MutationKind::Create, |s| s.discard(&record.id))
            .await?;
        Self::record_cache_size(&store);
        info!("created reservation {} ({})", record.id, record.room_type);
        self.notify.send(&StoreEvent::Created { id: record.id.clone(), room_type: record.room_type.clone() });
        Ok(record)
    }

    /// Apply an edit. An empty patch is a no-op and makes no remote call.
    pub async fn update_reservation(
        &self,
        id: &ReservationId,
        patch: ReservationPatch,
    ) -> Result<Reservation, EngineError> {
        let mut store = self.store.write().await;
        if patch.is_empty() {
            return store.get(id).cloned().ok_or_else(|| EngineError::NotFound(id.clone()));
        }
        let previous = match store.update(id, patch) {
            Ok(prev) => prev,
            Err(e) => {
                metrics::counter!(observability::MUTATIONS_TOTAL, "op" => "update", "status" => "rejected").increment(1);
                return Err(e);
            }
        };
        let record = store.get(id).cloned().ok_or_else(|| EngineError::NotFound(id.clone()))?;
        self.persist_or_rollback(&mut store, &record, MutationKind::Update, |s| s.restore(previous))
            .await?;
        info!("updated reservation {id}");
        self.notify.send(&StoreEvent::Updated { id: id.clone(), room_type: record.room_type.clone() });
        Ok(record)
    }

    /// Flip the shortlist flag. A failed persist flips it back.
    pub async fn toggle_clipboard(&self, id: &ReservationId) -> Result<bool, EngineError> {
        let mut store = self.store.write().await;
        let on_clipboard = store.toggle_clipboard(id)?;
        let record = store.get(id).cloned().ok_or_else(|| EngineError::NotFound(id.clone()))?;
        self.persist_or_rollback(&mut store, &record, MutationKind::ToggleClipboard, |s| s.flip_clipboard(id))
            .await?;
        self.notify.send(&StoreEvent::ClipboardToggled {
            id: id.clone(),
            room_type: record.room_type,
            on_clipboard,
        });
        Ok(on_clipboard)
    }

    /// Remove locally, then remotely with one retry. A remote failure is not
    /// rolled back; it is reported as `CancelOutcome::OutOfSync`.
    pub async fn cancel_reservation(&self, id: &ReservationId) -> Result<CancelOutcome, EngineError> {
        let mut store = self.store.write().await;
        let removed = store.remove(id)?;
        Self::record_cache_size(&store);
        let room_type = removed.room_type.clone();
        self.notify.send(&StoreEvent::Cancelled { id: id.clone(), room_type: room_type.clone() });

        match self.gateway.delete_remote(id).await {
            Ok(()) => {
                metrics::counter!(observability::MUTATIONS_TOTAL, "op" => "cancel", "status" => "ok").increment(1);
                info!("cancelled reservation {id}");
                Ok(CancelOutcome::Synced(removed))
            }
            Err(e) => {
                metrics::counter!(observability::MUTATIONS_TOTAL, "op" => "cancel", "status" => "out_of_sync").increment(1);
                metrics::counter!(observability::OUT_OF_SYNC_TOTAL).increment(1);
                error!("reservation {id} removed locally but not remotely: {e}");
                self.notify.send(&StoreEvent::Diverged { id: id.clone(), room_type });
                Ok(CancelOutcome::OutOfSync(removed, e))
            }
        }
    }
}
