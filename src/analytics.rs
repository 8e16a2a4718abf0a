use anyhow::Result;
use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use vigil_core::records::{
    ActivityRecord, ActivityStatus, ProcessTrackRecord, WORKSPACE_LOCAL, WORKSPACE_PRODUCTIVE,
};
use vigil_storage::RecordStore;

/// How many entries the top-applications list is capped at.
const TOP_APPLICATIONS_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TamperReport {
    pub timestamp: DateTime<Utc>,
    pub detail: Option<String>,
    pub machine_id: Option<String>,
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProductivityAnalytics {
    /// Per calendar day: productive seconds / total seconds, 0.0 for empty days.
    pub daily_productivity_score: BTreeMap<NaiveDate, f64>,
    pub application_usage_seconds: HashMap<String, i64>,
    pub average_productive_hours_per_day: f64,
    pub total_productive_minutes: i64,
    pub total_idle_minutes: i64,
    /// Keyed "HH:00-HH:00"; mean ACTIVE fraction per hour as a 0-100 percentage.
    pub productivity_by_hour: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkspaceAnalytics {
    pub workspace_total_seconds: BTreeMap<String, i64>,
    /// Mean ACTIVE fraction per workspace kind, 0.0-1.0.
    pub workspace_efficiency: BTreeMap<String, f64>,
    /// Productive workspace seconds over local workspace seconds; 0.0 when
    /// there is no local time to compare against.
    pub productive_vs_local_ratio: f64,
    pub application_usage_by_workspace: BTreeMap<String, HashMap<String, i64>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DailyBreakdown {
    pub total_seconds: i64,
    pub productive_seconds: i64,
    pub applications: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivitySummary {
    pub user_id: i64,
    pub total_records: usize,
    pub total_seconds: i64,
    pub productive_seconds: i64,
    pub idle_seconds: i64,
    pub offline_seconds: i64,
    pub application_usage_seconds: HashMap<String, i64>,
    pub category_usage_seconds: HashMap<String, i64>,
    pub most_used_application: Option<String>,
    pub unique_applications: BTreeSet<String>,
    pub daily_timeline: BTreeMap<NaiveDate, DailyBreakdown>,
    pub tamper_reports: Vec<TamperReport>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessTrackAnalytics {
    pub category_usage_seconds: HashMap<String, i64>,
    /// Capped at ten, longest usage first, name as tie-break.
    pub top_applications: Vec<(String, i64)>,
    pub productive_seconds: i64,
    pub non_productive_seconds: i64,
}

pub fn total_seconds(records: &[ActivityRecord]) -> i64 {
    records.iter().map(|r| r.duration_seconds).sum()
}

pub fn seconds_with_status(records: &[ActivityRecord], status: ActivityStatus) -> i64 {
    records
        .iter()
        .filter(|r| r.status == status)
        .map(|r| r.duration_seconds)
        .sum()
}

pub fn application_usage(records: &[ActivityRecord]) -> HashMap<String, i64> {
    let mut usage: HashMap<String, i64> = HashMap::new();
    for record in records {
        if let Some(app) = &record.application_name {
            *usage.entry(app.clone()).or_default() += record.duration_seconds;
        }
    }
    usage
}

pub fn category_usage(records: &[ActivityRecord]) -> HashMap<String, i64> {
    let mut usage: HashMap<String, i64> = HashMap::new();
    for record in records {
        if let Some(category) = &record.application_category {
            *usage.entry(category.clone()).or_default() += record.duration_seconds;
        }
    }
    usage
}

/// Arg-max of the usage map. Equal totals tie-break to the
/// lexicographically smallest name so the answer is deterministic.
pub fn most_used_application(usage: &HashMap<String, i64>) -> Option<String> {
    usage
        .iter()
        .max_by(|(name_a, secs_a), (name_b, secs_b)| {
            secs_a.cmp(secs_b).then(name_b.cmp(name_a))
        })
        .map(|(name, _)| name.clone())
}

pub fn daily_productivity_scores(records: &[ActivityRecord]) -> BTreeMap<NaiveDate, f64> {
    let mut by_day: BTreeMap<NaiveDate, Vec<&ActivityRecord>> = BTreeMap::new();
    for record in records {
        by_day
            .entry(record.created_at.date_naive())
            .or_default()
            .push(record);
    }

    by_day
        .into_iter()
        .map(|(day, daily)| {
            let total: i64 = daily.iter().map(|r| r.duration_seconds).sum();
            let productive: i64 = daily
                .iter()
                .filter(|r| r.status == ActivityStatus::Active)
                .map(|r| r.duration_seconds)
                .sum();
            let score = if total > 0 {
                productive as f64 / total as f64
            } else {
                0.0
            };
            (day, score)
        })
        .collect()
}

fn hour_range_label(hour: u32) -> String {
    format!("{:02}:00-{:02}:00", hour, (hour + 1) % 24)
}

pub fn productivity_by_hour(records: &[ActivityRecord]) -> BTreeMap<String, f64> {
    let mut counts: BTreeMap<u32, (u64, u64)> = BTreeMap::new();
    for record in records {
        let entry = counts.entry(record.created_at.hour()).or_default();
        entry.0 += 1;
        if record.status == ActivityStatus::Active {
            entry.1 += 1;
        }
    }

    counts
        .into_iter()
        .map(|(hour, (total, active))| {
            let percentage = if total > 0 {
                active as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            (hour_range_label(hour), percentage)
        })
        .collect()
}

pub fn average_productive_hours_per_day(records: &[ActivityRecord]) -> f64 {
    let mut daily_productive: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for record in records {
        if record.status == ActivityStatus::Active {
            *daily_productive
                .entry(record.created_at.date_naive())
                .or_default() += record.duration_seconds;
        }
    }
    if daily_productive.is_empty() {
        return 0.0;
    }
    let total_hours: f64 = daily_productive
        .values()
        .map(|secs| *secs as f64 / 3600.0)
        .sum();
    total_hours / daily_productive.len() as f64
}

pub fn analyze_productivity(records: &[ActivityRecord]) -> ProductivityAnalytics {
    ProductivityAnalytics {
        daily_productivity_score: daily_productivity_scores(records),
        application_usage_seconds: application_usage(records),
        average_productive_hours_per_day: average_productive_hours_per_day(records),
        total_productive_minutes: seconds_with_status(records, ActivityStatus::Active) / 60,
        total_idle_minutes: seconds_with_status(records, ActivityStatus::Idle) / 60,
        productivity_by_hour: productivity_by_hour(records),
    }
}

pub fn workspace_comparison(records: &[ActivityRecord]) -> WorkspaceAnalytics {
    let mut totals: BTreeMap<String, i64> = BTreeMap::new();
    let mut counts: BTreeMap<String, (u64, u64)> = BTreeMap::new();
    let mut by_workspace_app: BTreeMap<String, HashMap<String, i64>> = BTreeMap::new();

    for record in records {
        let workspace = match &record.workspace_type {
            Some(workspace) => workspace.clone(),
            None => continue,
        };
        *totals.entry(workspace.clone()).or_default() += record.duration_seconds;

        let entry = counts.entry(workspace.clone()).or_default();
        entry.0 += 1;
        if record.status == ActivityStatus::Active {
            entry.1 += 1;
        }

        if let Some(app) = &record.application_name {
            *by_workspace_app
                .entry(workspace)
                .or_default()
                .entry(app.clone())
                .or_default() += record.duration_seconds;
        }
    }

    let efficiency = counts
        .into_iter()
        .map(|(workspace, (total, active))| {
            let fraction = if total > 0 {
                active as f64 / total as f64
            } else {
                0.0
            };
            (workspace, fraction)
        })
        .collect();

    let productive = totals.get(WORKSPACE_PRODUCTIVE).copied().unwrap_or(0);
    let local = totals.get(WORKSPACE_LOCAL).copied().unwrap_or(0);
    let ratio = if local > 0 {
        productive as f64 / local as f64
    } else {
        0.0
    };

    WorkspaceAnalytics {
        workspace_total_seconds: totals,
        workspace_efficiency: efficiency,
        productive_vs_local_ratio: ratio,
        application_usage_by_workspace: by_workspace_app,
    }
}

pub fn tamper_reports(records: &[ActivityRecord]) -> Vec<TamperReport> {
    records
        .iter()
        .filter(|r| r.tamper_attempt)
        .map(|r| TamperReport {
            timestamp: r.created_at,
            detail: r.tamper_detail.clone(),
            machine_id: r.machine_id.clone(),
            ip_address: r.ip_address.clone(),
        })
        .collect()
}

pub fn activity_summary(user_id: i64, records: &[ActivityRecord]) -> ActivitySummary {
    let usage = application_usage(records);
    let most_used = most_used_application(&usage);

    let mut daily_timeline: BTreeMap<NaiveDate, DailyBreakdown> = BTreeMap::new();
    let mut unique_applications = BTreeSet::new();
    for record in records {
        let day = daily_timeline
            .entry(record.created_at.date_naive())
            .or_default();
        day.total_seconds += record.duration_seconds;
        if record.status == ActivityStatus::Active {
            day.productive_seconds += record.duration_seconds;
        }
        if let Some(app) = &record.application_name {
            day.applications.insert(app.clone());
            unique_applications.insert(app.clone());
        }
    }

    ActivitySummary {
        user_id,
        total_records: records.len(),
        total_seconds: total_seconds(records),
        productive_seconds: seconds_with_status(records, ActivityStatus::Active),
        idle_seconds: seconds_with_status(records, ActivityStatus::Idle),
        offline_seconds: seconds_with_status(records, ActivityStatus::Offline),
        application_usage_seconds: usage,
        category_usage_seconds: category_usage(records),
        most_used_application: most_used,
        unique_applications,
        daily_timeline,
        tamper_reports: tamper_reports(records),
    }
}

pub fn process_track_analytics(tracks: &[ProcessTrackRecord]) -> ProcessTrackAnalytics {
    let mut category_usage: HashMap<String, i64> = HashMap::new();
    let mut app_usage: HashMap<String, i64> = HashMap::new();
    let mut productive = 0;
    let mut non_productive = 0;

    for track in tracks {
        *category_usage.entry(track.category.clone()).or_default() += track.duration_seconds;
        *app_usage.entry(track.process_name.clone()).or_default() += track.duration_seconds;
        if track.is_productive {
            productive += track.duration_seconds;
        } else {
            non_productive += track.duration_seconds;
        }
    }

    let mut top_applications: Vec<(String, i64)> = app_usage.into_iter().collect();
    top_applications.sort_by(|(name_a, secs_a), (name_b, secs_b)| {
        secs_b.cmp(secs_a).then(name_a.cmp(name_b))
    });
    top_applications.truncate(TOP_APPLICATIONS_LIMIT);

    ProcessTrackAnalytics {
        category_usage_seconds: category_usage,
        top_applications,
        productive_seconds: productive,
        non_productive_seconds: non_productive,
    }
}

/// Read-side entry point: fetches a user's records for a time window from
/// the record store and derives the aggregates. Store errors propagate to
/// the caller; there is no local recovery for an unreachable store.
pub struct AnalyticsEngine {
    store: Arc<dyn RecordStore>,
}

impl AnalyticsEngine {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub fn productivity(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<ProductivityAnalytics> {
        let records = self.store.activities_in_range(user_id, start, end)?;
        Ok(analyze_productivity(&records))
    }

    pub fn workspaces(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<WorkspaceAnalytics> {
        let records = self.store.activities_in_range(user_id, start, end)?;
        Ok(workspace_comparison(&records))
    }

    pub fn summary(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<ActivitySummary> {
        let records = self.store.activities_in_range(user_id, start, end)?;
        Ok(activity_summary(user_id, &records))
    }

    pub fn tamper_reports(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TamperReport>> {
        let records = self.store.activities_in_range(user_id, start, end)?;
        Ok(tamper_reports(&records))
    }

    pub fn process_tracks(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<ProcessTrackAnalytics> {
        let tracks = self.store.process_tracks_in_range(user_id, start, end)?;
        Ok(process_track_analytics(&tracks))
    }
}
