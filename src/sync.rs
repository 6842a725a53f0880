use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use crate::limits::DELETE_RETRY_DELAY;
use crate::model::{Reservation, ReservationId};
use crate::observability;
use crate::remote::{RemoteError, RemoteResult, ReservationRow, ReservationTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOp {
    Persist,
    Delete,
    Reload,
    Audit,
}

impl SyncOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOp::Persist => "persist",
            SyncOp::Delete => "delete",
            SyncOp::Reload => "reload",
            SyncOp::Audit => "audit",
        }
    }
}

/// A remote call that failed, after `attempts` tries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncError {
    pub op: SyncOp,
    pub attempts: u32,
    pub cause: RemoteError,
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.attempts > 1 {
            write!(f, "{} failed after {} attempts: {}", self.op.as_str(), self.attempts, self.cause)
        } else {
            write!(f, "{} failed: {}", self.op.as_str(), self.cause)
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

/// Await a remote call, recording its latency and failures.
pub(crate) async fn timed<T>(op: SyncOp, call: impl Future<Output = RemoteResult<T>>) -> RemoteResult<T> {
    let start = Instant::now();
    let result = call.await;
    metrics::histogram!(observability::REMOTE_CALL_DURATION_SECONDS, "op" => op.as_str())
        .record(start.elapsed().as_secs_f64());
    if result.is_err() {
        metrics::counter!(observability::SYNC_FAILURES_TOTAL, "op" => op.as_str()).increment(1);
    }
    result
}

/// Translates store mutations into calls on the durable table.
///
/// Upserts and reloads are attempted once. A delete is retried once, because
/// a failed delete cannot be rolled back locally.
pub struct SyncGateway {
    table: Arc<dyn ReservationTable>,
    retry_delay: Duration,
}

impl SyncGateway {
    pub fn new(table: Arc<dyn ReservationTable>) -> Self {
        Self { table, retry_delay: DELETE_RETRY_DELAY }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Bulk insert-or-replace keyed by id.
    pub async fn persist_all(&self, records: &[Reservation]) -> Result<(), SyncError> {
        if records.is_empty() {
            return Ok(());
        }
        let rows: Vec<ReservationRow> = records.iter().map(ReservationRow::from).collect();
        timed(SyncOp::Persist, self.table.upsert(&rows))
            .await
            .map_err(|cause| {
                error!("persist of {} record(s) failed: {cause}", rows.len());
                SyncError { op: SyncOp::Persist, attempts: 1, cause }
            })?;
        debug!("persisted {} record(s)", rows.len());
        Ok(())
    }

    pub async fn delete_remote(&self, id: &ReservationId) -> Result<(), SyncError> {
        let first = match timed(SyncOp::Delete, self.table.delete(id)).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        warn!("delete of {id} failed ({first}), retrying once");
        if !self.retry_delay.is_zero() {
            tokio::time::sleep(self.retry_delay).await;
        }
        timed(SyncOp::Delete, self.table.delete(id))
            .await
            .map_err(|cause| {
                error!("delete of {id} failed again: {cause}");
                SyncError { op: SyncOp::Delete, attempts: 2, cause }
            })
    }

    /// Fetch the whole remote collection. Rows that cannot be decoded, or that
    /// repeat an id already seen, are skipped with a warning.
    pub async fn reload_all(&self) -> Result<Vec<Reservation>, SyncError> {
        let rows = timed(SyncOp::Reload, self.table.select_all())
            .await
            .map_err(|cause| SyncError { op: SyncOp::Reload, attempts: 1, cause })?;

        let mut seen = HashSet::with_capacity(rows.len());
        let mut records = Vec::with_capacity(rows.len());
        for raw in rows {
            match ReservationRow::from_raw(raw).and_then(Reservation::try_from) {
                Ok(r) if !seen.insert(r.id.clone()) => warn!("skipping duplicate row {}", r.id),
                Ok(r) => records.push(r),
                Err(e) => warn!("skipping malformed {e}"),
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::parse_day;
    use crate::remote::memory::MemoryTable;

    fn reservation(id: &str) -> Reservation {
        Reservation {
            id: ReservationId::from(id),
            guest_name: "Carla".into(),
            phone: None,
            room_type: "casal".into(),
            start_date: parse_day("2025-02-01").unwrap(),
            end_date: parse_day("2025-02-03").unwrap(),
            notes: None,
            price: None,
            responsible: None,
            on_clipboard: false,
        }
    }

    fn gateway(table: &Arc<MemoryTable>) -> SyncGateway {
        SyncGateway::new(table.clone()).with_retry_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn persist_failure_carries_cause() {
        let table = Arc::new(MemoryTable::new());
        table.fail_next_upserts(1);
        let err = gateway(&table).persist_all(&[reservation("a")]).await.unwrap_err();
        assert_eq!(err.op, SyncOp::Persist);
        assert_eq!(err.attempts, 1);
        assert!(matches!(err.cause, RemoteError::Transport(_)));
        assert_eq!(table.upsert_calls(), 1); // no retry
    }

    #[tokio::test]
    async fn delete_retries_once() {
        let table = Arc::new(MemoryTable::new());
        let gw = gateway(&table);
        gw.persist_all(&[reservation("a")]).await.unwrap();

        table.fail_next_deletes(1);
        gw.delete_remote(&ReservationId::from("a")).await.unwrap();
        assert_eq!(table.delete_calls(), 2);
        assert!(table.row("a").await.is_none());
    }

    #[tokio::test]
    async fn delete_reports_after_second_failure() {
        let table = Arc::new(MemoryTable::new());
        let gw = gateway(&table);
        gw.persist_all(&[reservation("a")]).await.unwrap();

        table.fail_next_deletes(2);
        let err = gw.delete_remote(&ReservationId::from("a")).await.unwrap_err();
        assert_eq!(err.op, SyncOp::Delete);
        assert_eq!(err.attempts, 2);
        assert_eq!(table.delete_calls(), 2);
        assert!(table.row("a").await.is_some());
    }

    #[tokio::test]
    async fn reload_skips_bad_and_duplicate_rows() {
        let mut bad = ReservationRow::from(&reservation("bad"));
        bad.end_date = Some("2025-02-31".into());
        let table = Arc::new(MemoryTable::with_rows(vec![
            ReservationRow::from(&reservation("a")),
            ReservationRow::from(&reservation("b")),
            bad,
        ]));
        let records = gateway(&table).reload_all().await.unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn reload_failure_is_sync_error() {
        let table = Arc::new(MemoryTable::new());
        table.fail_next_selects(1);
        let err = gateway(&table).reload_all().await.unwrap_err();
        assert_eq!(err.op, SyncOp::Reload);
    }
}
