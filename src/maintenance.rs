use crate::accounts::AccountResolver;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use log::{info, warn};
use vigil_storage::RecordStore;

/// How far back `clear_user_activities` reaches.
const CLEAR_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrphanReport {
    /// User ids that have persisted activities but no account.
    pub orphaned_user_ids: Vec<i64>,
    pub orphaned_record_count: u64,
}

impl OrphanReport {
    pub fn has_orphans(&self) -> bool {
        !self.orphaned_user_ids.is_empty()
    }
}

/// Find persisted activities whose user id no longer resolves to an
/// account. These can only appear when accounts are deleted after their
/// records were flushed; enrichment rejects unknown users up front.
pub fn check_orphaned(
    store: &dyn RecordStore,
    resolver: &dyn AccountResolver,
) -> Result<OrphanReport> {
    let mut report = OrphanReport::default();
    for user_id in store.activity_user_ids()? {
        if !resolver.exists_user(user_id) {
            report.orphaned_record_count += store.count_activities(user_id)?;
            report.orphaned_user_ids.push(user_id);
        }
    }
    if report.has_orphans() {
        warn!(
            "found {} orphaned activities for user ids {:?}",
            report.orphaned_record_count, report.orphaned_user_ids
        );
    }
    Ok(report)
}

/// Delete orphaned activities and return how many were removed. Idempotent:
/// a second run right after finds nothing left and deletes zero.
pub fn cleanup_orphaned(
    store: &dyn RecordStore,
    resolver: &dyn AccountResolver,
) -> Result<usize> {
    let report = check_orphaned(store, resolver)?;
    if !report.has_orphans() {
        return Ok(0);
    }
    let deleted = store.delete_activities_for_users(&report.orphaned_user_ids)?;
    info!(
        "deleted {} orphaned activities for user ids {:?}",
        deleted, report.orphaned_user_ids
    );
    Ok(deleted)
}

/// Administrative purge of one user's recent history (last 30 days).
pub fn clear_user_activities(
    store: &dyn RecordStore,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<usize> {
    let start = now - Duration::days(CLEAR_WINDOW_DAYS);
    let deleted = store.delete_activities_in_range(user_id, start, now)?;
    info!("cleared {} recent activities for user {}", deleted, user_id);
    Ok(deleted)
}
