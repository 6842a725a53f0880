use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::model::{AuditAction, AuditEntry, ReservationId};

use super::{AuditSource, RemoteError, RemoteResult, ReservationRow, ReservationTable};

/// In-process stand-in for the remote table, with an audit trigger,
/// injectable failures and optional latency.
#[derive(Default)]
pub struct MemoryTable {
    rows: Mutex<BTreeMap<String, ReservationRow>>,
    audit: Mutex<HashMap<String, Vec<AuditEntry>>>,
    actor: Option<String>,
    latency: Duration,
    fail_selects: AtomicU32,
    fail_upserts: AtomicU32,
    fail_deletes: AtomicU32,
    select_calls: AtomicU64,
    upsert_calls: AtomicU64,
    delete_calls: AtomicU64,
}

fn take_failure(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

fn injected(op: &str) -> RemoteError {
    RemoteError::Transport(format!("injected {op} failure"))
}

/// Column names whose values differ between two versions of a row.
fn changed_fields(before: &ReservationRow, after: &ReservationRow) -> Vec<String> {
    let (Ok(serde_json::Value::Object(a)), Ok(serde_json::Value::Object(b))) =
        (serde_json::to_value(before), serde_json::to_value(after))
    else {
        return Vec::new();
    };
    b.iter()
        .filter(|(k, v)| a.get(*k) != Some(*v))
        .map(|(k, _)| k.clone())
        .collect()
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<ReservationRow>) -> Self {
        let table = Self::default();
        let map = rows.into_iter().map(|r| (r.id.clone(), r)).collect();
        Self { rows: Mutex::new(map), ..table }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Actor recorded on audit entries.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn fail_next_selects(&self, n: u32) {
        self.fail_selects.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_upserts(&self, n: u32) {
        self.fail_upserts.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_deletes(&self, n: u32) {
        self.fail_deletes.store(n, Ordering::SeqCst);
    }

    pub async fn rows(&self) -> Vec<ReservationRow> {
        self.rows.lock().await.values().cloned().collect()
    }

    pub async fn row(&self, id: &str) -> Option<ReservationRow> {
        self.rows.lock().await.get(id).cloned()
    }

    pub fn select_calls(&self) -> u64 {
        self.select_calls.load(Ordering::Relaxed)
    }

    pub fn upsert_calls(&self) -> u64 {
        self.upsert_calls.load(Ordering::Relaxed)
    }

    pub fn delete_calls(&self) -> u64 {
        self.delete_calls.load(Ordering::Relaxed)
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    async fn record(&self, id: &str, action: AuditAction, changed: Option<Vec<String>>) {
        let entry = AuditEntry {
            action,
            timestamp: Utc::now(),
            actor: self.actor.clone(),
            changed_fields: changed,
        };
        self.audit.lock().await.entry(id.to_string()).or_default().push(entry);
    }
}

#[async_trait]
impl ReservationTable for MemoryTable {
    async fn select_all(&self) -> RemoteResult<Vec<serde_json::Value>> {
        self.select_calls.fetch_add(1, Ordering::Relaxed);
        self.delay().await;
        if take_failure(&self.fail_selects) {
            return Err(injected("select"));
        }
        self.rows()
            .await
            .iter()
            .map(|row| serde_json::to_value(row).map_err(|e| RemoteError::Decode(e.to_string())))
            .collect()
    }

    async fn upsert(&self, rows: &[ReservationRow]) -> RemoteResult<()> {
        self.upsert_calls.fetch_add(1, Ordering::Relaxed);
        self.delay().await;
        if take_failure(&self.fail_upserts) {
            return Err(injected("upsert"));
        }
        for row in rows {
            let previous = self.rows.lock().await.insert(row.id.clone(), row.clone());
            match previous {
                None => self.record(&row.id, AuditAction::Created, None).await,
                Some(before) => {
                    let changed = changed_fields(&before, row);
                    if !changed.is_empty() {
                        self.record(&row.id, AuditAction::Updated, Some(changed)).await;
                    }
                }
            }
        }
        Ok(())
    }

    async fn delete(&self, id: &ReservationId) -> RemoteResult<()> {
        self.delete_calls.fetch_add(1, Ordering::Relaxed);
        self.delay().await;
        if take_failure(&self.fail_deletes) {
            return Err(injected("delete"));
        }
        if self.rows.lock().await.remove(id.as_str()).is_some() {
            self.record(id.as_str(), AuditAction::Deleted, None).await;
        }
        Ok(())
    }
}

#[async_trait]
impl AuditSource for MemoryTable {
    async fn history(&self, id: &ReservationId) -> RemoteResult<Vec<AuditEntry>> {
        Ok(self.audit.lock().await.get(id.as_str()).cloned().unwrap_or_default())
    }
}
