use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use tokio::sync::watch;

use vigil_core::records::{ActivityRecord, ProcessTrackRecord};

/// Transactional record store consumed by the batch flush worker and the
/// analytics engine. Any error from a save is treated as transient by the
/// flush worker and retried.
pub trait RecordStore: Send + Sync {
    fn save_activity(&self, record: &ActivityRecord) -> Result<i64>;
    fn save_process_track(&self, record: &ProcessTrackRecord) -> Result<i64>;
    fn activities_in_range(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ActivityRecord>>;
    fn process_tracks_in_range(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ProcessTrackRecord>>;
    /// Distinct user ids with at least one persisted activity.
    fn activity_user_ids(&self) -> Result<Vec<i64>>;
    fn count_activities(&self, user_id: i64) -> Result<u64>;
    fn delete_activities_for_users(&self, user_ids: &[i64]) -> Result<usize>;
    fn delete_activities_in_range(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<usize>;
}

static QUEUE_DEPTH: AtomicU64 = AtomicU64::new(0);
static RECORDS_PERSISTED: AtomicU64 = AtomicU64::new(0);
static RECORDS_RETRIED: AtomicU64 = AtomicU64::new(0);
static RECORDS_DEAD_LETTERED: AtomicU64 = AtomicU64::new(0);
static LAST_FLUSH_AT_EPOCH: AtomicI64 = AtomicI64::new(0);

static METRICS_CH: OnceCell<(watch::Sender<FlushMetrics>, watch::Receiver<FlushMetrics>)> =
    OnceCell::new();

fn init_metrics_channel() -> &'static (watch::Sender<FlushMetrics>, watch::Receiver<FlushMetrics>) {
    METRICS_CH.get_or_init(|| {
        let initial = flush_metrics_snapshot();
        watch::channel(initial)
    })
}

pub fn set_queue_depth(depth: u64) {
    QUEUE_DEPTH.store(depth, Ordering::Relaxed);
    publish_metrics();
}

pub fn record_flush_cycle(persisted: u64, retried: u64, dead_lettered: u64, at: DateTime<Utc>) {
    let _ = RECORDS_PERSISTED.fetch_add(persisted, Ordering::Relaxed);
    let _ = RECORDS_RETRIED.fetch_add(retried, Ordering::Relaxed);
    let _ = RECORDS_DEAD_LETTERED.fetch_add(dead_lettered, Ordering::Relaxed);
    LAST_FLUSH_AT_EPOCH.store(at.timestamp(), Ordering::Relaxed);
    publish_metrics();
}

#[derive(Clone, Debug)]
pub struct FlushMetrics {
    pub queue_depth: u64,
    pub records_persisted: u64,
    pub records_retried: u64,
    pub records_dead_lettered: u64,
    pub last_flush_at: Option<DateTime<Utc>>,
}

fn flush_metrics_snapshot() -> FlushMetrics {
    let secs = LAST_FLUSH_AT_EPOCH.load(Ordering::Relaxed);
    let last = if secs > 0 {
        Utc.timestamp_opt(secs, 0).single()
    } else {
        None
    };
    FlushMetrics {
        queue_depth: QUEUE_DEPTH.load(Ordering::Relaxed),
        records_persisted: RECORDS_PERSISTED.load(Ordering::Relaxed),
        records_retried: RECORDS_RETRIED.load(Ordering::Relaxed),
        records_dead_lettered: RECORDS_DEAD_LETTERED.load(Ordering::Relaxed),
        last_flush_at: last,
    }
}

fn publish_metrics() {
    let (tx, _rx) = init_metrics_channel();
    let _ = tx.send(flush_metrics_snapshot());
}

pub fn flush_metrics_watch() -> watch::Receiver<FlushMetrics> {
    let (_tx, rx) = init_metrics_channel();
    rx.clone()
}

pub mod memory;
pub mod sqlite3;
