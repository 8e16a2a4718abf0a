use crate::records::{ActivityRecord, ActivityStatus, ProcessTrackRecord, WORKSPACE_LOCAL};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Activity type stamped on entries produced by the automatic process
/// monitor when the client did not say otherwise.
pub const DEFAULT_ACTIVITY_TYPE: &str = "PROCESS_MONITORING";

/// One raw entry from a client batch. Every field is optional on the wire;
/// presence is checked explicitly rather than trusted, and malformed entries
/// are skipped individually without failing their batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawActivityLog {
    pub user_id: Option<i64>,
    pub activity_type: Option<String>,
    pub description: Option<String>,
    pub process_name: Option<String>,
    pub window_title: Option<String>,
    pub process_id: Option<String>,
    pub application_path: Option<String>,
    pub workspace_type: Option<String>,
    pub application_category: Option<String>,
    pub status: Option<ActivityStatus>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub idle_seconds: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
}

impl RawActivityLog {
    /// Fill the defaults the automatic process monitor omits. Only applies
    /// when a process name is present; entries without one stay as-is and
    /// fail the required-field check instead.
    pub fn apply_monitoring_defaults(&mut self) {
        let process_name = match &self.process_name {
            Some(name) => name.clone(),
            None => return,
        };
        if self.activity_type.is_none() {
            self.activity_type = Some(DEFAULT_ACTIVITY_TYPE.to_string());
        }
        if self.description.is_none() {
            self.description = Some(format!("Automatic process monitoring: {}", process_name));
        }
        if self.workspace_type.is_none() {
            self.workspace_type = Some(WORKSPACE_LOCAL.to_string());
        }
    }

    /// Name of the first required field that is absent, if any. The wire
    /// names are reported so callers can echo them back to the agent.
    pub fn missing_required_field(&self) -> Option<&'static str> {
        if self.user_id.is_none() {
            return Some("userId");
        }
        if self.process_name.is_none() {
            return Some("processName");
        }
        if self.activity_type.is_none() {
            return Some("activityType");
        }
        if self.description.is_none() {
            return Some("description");
        }
        None
    }

    /// Build an `ActivityRecord` with all defaults filled, the explicit
    /// replacement for persistence-layer pre-save hooks:
    /// - created-at defaults to `now`
    /// - start defaults to created-at
    /// - end defaults to start + 1 minute; an end before start is treated
    ///   as absent so `end >= start` always holds
    /// - duration defaults to the span between start and end, floored at 0
    /// - status defaults to `Active`
    ///
    /// Pure over its inputs; returns the missing wire field name when a
    /// required field is absent.
    pub fn finalize_defaults(&self, now: DateTime<Utc>) -> Result<ActivityRecord, &'static str> {
        if let Some(field) = self.missing_required_field() {
            return Err(field);
        }
        let user_id = self.user_id.ok_or("userId")?;
        let process_name = self.process_name.clone().ok_or("processName")?;
        let activity_type = self.activity_type.clone().ok_or("activityType")?;
        let description = self.description.clone().ok_or("description")?;

        let created_at = self.created_at.unwrap_or(now);
        let start_time = self.start_time.unwrap_or(created_at);
        let end_time = self
            .end_time
            .filter(|end| *end >= start_time)
            .unwrap_or_else(|| start_time + Duration::minutes(1));
        let duration_seconds = self
            .duration_seconds
            .filter(|secs| *secs >= 0)
            .unwrap_or_else(|| (end_time - start_time).num_seconds())
            .max(0);

        Ok(ActivityRecord {
            user_id,
            activity_type,
            description,
            application_name: Some(process_name.clone()),
            window_title: self.window_title.clone(),
            process_id: self.process_id.clone(),
            process_name: Some(process_name),
            application_category: self.application_category.clone(),
            workspace_type: self.workspace_type.clone(),
            start_time,
            end_time,
            duration_seconds,
            status: self.status.unwrap_or_default(),
            idle_seconds: self.idle_seconds.unwrap_or(0).max(0),
            tamper_attempt: false,
            tamper_detail: None,
            integrity_hash: None,
            ip_address: None,
            machine_id: None,
            created_at,
            revision: 0,
        })
    }

    /// Build the sibling process-track record for the direct tracking path.
    /// Returns `None` when the entry lacks the user id or process name.
    pub fn to_process_track(
        &self,
        category: &str,
        is_productive: bool,
        now: DateTime<Utc>,
    ) -> Option<ProcessTrackRecord> {
        let user_id = self.user_id?;
        let process_name = self.process_name.clone()?;

        let start_time = self.start_time.unwrap_or(now);
        let end_time = self
            .end_time
            .filter(|end| *end >= start_time)
            .unwrap_or_else(|| start_time + Duration::minutes(1));
        let duration_seconds = self
            .duration_seconds
            .filter(|secs| *secs >= 0)
            .unwrap_or_else(|| (end_time - start_time).num_seconds())
            .max(0);

        Some(ProcessTrackRecord {
            user_id,
            process_name,
            window_title: self.window_title.clone(),
            process_id: self.process_id.clone(),
            category: category.to_string(),
            start_time,
            end_time,
            duration_seconds,
            is_productive,
            application_path: self.application_path.clone(),
        })
    }
}
