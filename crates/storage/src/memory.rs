use crate::RecordStore;
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Mutex;

use vigil_core::records::{ActivityRecord, ProcessTrackRecord};

/// In-memory record store. Backs unit and integration tests and small
/// embedded deployments that do not need durability.
#[derive(Default)]
pub struct MemoryRecordStore {
    activities: Mutex<Vec<ActivityRecord>>,
    process_tracks: Mutex<Vec<ProcessTrackRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activity_count(&self) -> usize {
        self.activities.lock().expect("activities poisoned").len()
    }

    pub fn process_track_count(&self) -> usize {
        self.process_tracks
            .lock()
            .expect("process tracks poisoned")
            .len()
    }

    pub fn all_activities(&self) -> Vec<ActivityRecord> {
        self.activities.lock().expect("activities poisoned").clone()
    }
}

impl RecordStore for MemoryRecordStore {
    fn save_activity(&self, record: &ActivityRecord) -> Result<i64> {
        let mut activities = self.activities.lock().expect("activities poisoned");
        activities.push(record.clone());
        Ok(activities.len() as i64)
    }

    fn save_process_track(&self, record: &ProcessTrackRecord) -> Result<i64> {
        let mut tracks = self.process_tracks.lock().expect("process tracks poisoned");
        tracks.push(record.clone());
        Ok(tracks.len() as i64)
    }

    fn activities_in_range(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ActivityRecord>> {
        Ok(self
            .activities
            .lock()
            .expect("activities poisoned")
            .iter()
            .filter(|a| a.user_id == user_id && a.start_time >= start && a.start_time <= end)
            .cloned()
            .collect())
    }

    fn process_tracks_in_range(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ProcessTrackRecord>> {
        Ok(self
            .process_tracks
            .lock()
            .expect("process tracks poisoned")
            .iter()
            .filter(|t| t.user_id == user_id && t.start_time >= start && t.start_time <= end)
            .cloned()
            .collect())
    }

    fn activity_user_ids(&self) -> Result<Vec<i64>> {
        let ids: BTreeSet<i64> = self
            .activities
            .lock()
            .expect("activities poisoned")
            .iter()
            .map(|a| a.user_id)
            .collect();
        Ok(ids.into_iter().collect())
    }

    fn count_activities(&self, user_id: i64) -> Result<u64> {
        Ok(self
            .activities
            .lock()
            .expect("activities poisoned")
            .iter()
            .filter(|a| a.user_id == user_id)
            .count() as u64)
    }

    fn delete_activities_for_users(&self, user_ids: &[i64]) -> Result<usize> {
        let mut activities = self.activities.lock().expect("activities poisoned");
        let before = activities.len();
        activities.retain(|a| !user_ids.contains(&a.user_id));
        Ok(before - activities.len())
    }

    fn delete_activities_in_range(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<usize> {
        let mut activities = self.activities.lock().expect("activities poisoned");
        let before = activities.len();
        activities
            .retain(|a| !(a.user_id == user_id && a.start_time >= start && a.start_time <= end));
        Ok(before - activities.len())
    }
}
