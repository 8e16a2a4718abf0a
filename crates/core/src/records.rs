use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityStatus {
    #[default]
    Active,
    Idle,
    Offline,
}

impl ActivityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityStatus::Active => "ACTIVE",
            ActivityStatus::Idle => "IDLE",
            ActivityStatus::Offline => "OFFLINE",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "ACTIVE" => Some(ActivityStatus::Active),
            "IDLE" => Some(ActivityStatus::Idle),
            "OFFLINE" => Some(ActivityStatus::Offline),
            _ => None,
        }
    }
}

/// Workspace kind carried by client agents. Free-form tag; these two are the
/// values the collectors send today.
pub const WORKSPACE_LOCAL: &str = "LOCAL";
pub const WORKSPACE_PRODUCTIVE: &str = "PRODUCTIVE";

/// One observed activity interval, fully enriched and ready for persistence.
///
/// Invariants upheld at construction time (see `RawActivityLog::finalize_defaults`
/// and the enricher):
/// - `end_time >= start_time`
/// - `duration_seconds >= 0`
/// - `tamper_attempt` implies a non-empty `tamper_detail`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub user_id: i64,
    pub activity_type: String,
    pub description: String,
    pub application_name: Option<String>,
    pub window_title: Option<String>,
    pub process_id: Option<String>,
    pub process_name: Option<String>,
    pub application_category: Option<String>,
    pub workspace_type: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: i64,
    pub status: ActivityStatus,
    pub idle_seconds: i64,
    pub tamper_attempt: bool,
    pub tamper_detail: Option<String>,
    pub integrity_hash: Option<String>,
    pub ip_address: Option<String>,
    pub machine_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub revision: u64,
}

impl ActivityRecord {
    /// Mark the record as a suspected tamper attempt. Keeps the flag/detail
    /// invariant in one place.
    pub fn flag_tamper(&mut self, detail: impl Into<String>) {
        self.tamper_attempt = true;
        self.tamper_detail = Some(detail.into());
    }
}

/// One foreground-process interval from the direct tracking path. Simpler
/// sibling of `ActivityRecord`: same categorization, no tamper fields, never
/// queued. Correlates to activity records by user and time window only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessTrackRecord {
    pub user_id: i64,
    pub process_name: String,
    pub window_title: Option<String>,
    pub process_id: Option<String>,
    pub category: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: i64,
    pub is_productive: bool,
    pub application_path: Option<String>,
}
