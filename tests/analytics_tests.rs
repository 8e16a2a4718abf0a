use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::sync::Arc;
use vigil::analytics::{self, AnalyticsEngine};
use vigil_core::records::{
    ActivityRecord, ActivityStatus, WORKSPACE_LOCAL, WORKSPACE_PRODUCTIVE,
};
use vigil_storage::RecordStore;
use vigil_storage::memory::MemoryRecordStore;

fn record(
    app: &str,
    duration_seconds: i64,
    status: ActivityStatus,
    created_at: DateTime<Utc>,
) -> ActivityRecord {
    ActivityRecord {
        user_id: 7,
        activity_type: "PROCESS_MONITORING".to_string(),
        description: format!("Automatic process monitoring: {}", app),
        application_name: Some(app.to_string()),
        window_title: None,
        process_id: None,
        process_name: Some(app.to_string()),
        application_category: Some("BROWSER".to_string()),
        workspace_type: Some(WORKSPACE_LOCAL.to_string()),
        start_time: created_at,
        end_time: created_at,
        duration_seconds,
        status,
        idle_seconds: 0,
        tamper_attempt: false,
        tamper_detail: None,
        integrity_hash: None,
        ip_address: None,
        machine_id: None,
        created_at,
        revision: 0,
    }
}

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
}

#[test]
fn application_usage_sums_durations_per_app() {
    let records = vec![
        record("chrome.exe", 120, ActivityStatus::Active, at(1, 9)),
        record("chrome.exe", 180, ActivityStatus::Active, at(1, 10)),
        record("slack.exe", 60, ActivityStatus::Idle, at(1, 11)),
    ];

    let usage = analytics::application_usage(&records);
    assert_eq!(usage.get("chrome.exe"), Some(&300));
    assert_eq!(usage.get("slack.exe"), Some(&60));

    assert_eq!(
        analytics::seconds_with_status(&records, ActivityStatus::Active),
        300
    );
}

#[test]
fn status_buckets_decompose_the_total() {
    let records = vec![
        record("a.exe", 100, ActivityStatus::Active, at(1, 9)),
        record("b.exe", 40, ActivityStatus::Idle, at(1, 10)),
        record("c.exe", 25, ActivityStatus::Offline, at(1, 11)),
        record("a.exe", 35, ActivityStatus::Active, at(1, 12)),
    ];

    let total = analytics::total_seconds(&records);
    let active = analytics::seconds_with_status(&records, ActivityStatus::Active);
    let idle = analytics::seconds_with_status(&records, ActivityStatus::Idle);
    let offline = analytics::seconds_with_status(&records, ActivityStatus::Offline);
    assert_eq!(total, 200);
    assert_eq!(total, active + idle + offline);
}

#[test]
fn most_used_application_breaks_ties_by_name() {
    let records = vec![
        record("zebra.exe", 100, ActivityStatus::Active, at(1, 9)),
        record("alpha.exe", 100, ActivityStatus::Active, at(1, 10)),
        record("mid.exe", 50, ActivityStatus::Active, at(1, 11)),
    ];
    let usage = analytics::application_usage(&records);
    assert_eq!(
        analytics::most_used_application(&usage),
        Some("alpha.exe".to_string())
    );
}

#[test]
fn daily_scores_handle_zero_duration_days() {
    let records = vec![
        record("a.exe", 0, ActivityStatus::Active, at(1, 9)),
        record("a.exe", 0, ActivityStatus::Idle, at(1, 10)),
        record("a.exe", 60, ActivityStatus::Active, at(2, 9)),
        record("a.exe", 60, ActivityStatus::Idle, at(2, 10)),
    ];

    let scores = analytics::daily_productivity_scores(&records);
    let day1 = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    let day2 = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
    assert_eq!(scores.get(&day1), Some(&0.0));
    assert_eq!(scores.get(&day2), Some(&0.5));
}

#[test]
fn hourly_productivity_is_a_percentage_per_hour_bucket() {
    let records = vec![
        record("a.exe", 60, ActivityStatus::Active, at(1, 9)),
        record("a.exe", 60, ActivityStatus::Idle, at(1, 9)),
        record("a.exe", 60, ActivityStatus::Active, at(1, 14)),
        record("a.exe", 60, ActivityStatus::Active, at(1, 23)),
    ];

    let by_hour = analytics::productivity_by_hour(&records);
    assert_eq!(by_hour.get("09:00-10:00"), Some(&50.0));
    assert_eq!(by_hour.get("14:00-15:00"), Some(&100.0));
    // The last bucket wraps to midnight.
    assert_eq!(by_hour.get("23:00-00:00"), Some(&100.0));
    assert_eq!(by_hour.len(), 3);
}

#[test]
fn average_productive_hours_spans_only_days_with_active_time() {
    let records = vec![
        record("a.exe", 3600, ActivityStatus::Active, at(1, 9)),
        record("a.exe", 7200, ActivityStatus::Active, at(2, 9)),
        record("a.exe", 3600, ActivityStatus::Idle, at(3, 9)),
    ];
    let average = analytics::average_productive_hours_per_day(&records);
    assert!((average - 1.5).abs() < 1e-9);

    assert_eq!(analytics::average_productive_hours_per_day(&[]), 0.0);
}

#[test]
fn workspace_comparison_computes_totals_efficiency_and_ratio() {
    let mut remote = record("code.exe", 300, ActivityStatus::Active, at(1, 9));
    remote.workspace_type = Some(WORKSPACE_PRODUCTIVE.to_string());
    let mut remote_idle = record("code.exe", 100, ActivityStatus::Idle, at(1, 10));
    remote_idle.workspace_type = Some(WORKSPACE_PRODUCTIVE.to_string());
    let local = record("chrome.exe", 200, ActivityStatus::Active, at(1, 11));
    let mut untagged = record("misc.exe", 50, ActivityStatus::Active, at(1, 12));
    untagged.workspace_type = None;

    let comparison =
        analytics::workspace_comparison(&[remote, remote_idle, local, untagged]);

    assert_eq!(
        comparison.workspace_total_seconds.get(WORKSPACE_PRODUCTIVE),
        Some(&400)
    );
    assert_eq!(
        comparison.workspace_total_seconds.get(WORKSPACE_LOCAL),
        Some(&200)
    );
    // Untagged records do not appear anywhere.
    assert_eq!(comparison.workspace_total_seconds.len(), 2);

    assert!(
        (comparison.workspace_efficiency[WORKSPACE_PRODUCTIVE] - 0.5).abs() < 1e-9
    );
    assert!((comparison.productive_vs_local_ratio - 2.0).abs() < 1e-9);

    let local_apps = &comparison.application_usage_by_workspace[WORKSPACE_LOCAL];
    assert_eq!(local_apps.get("chrome.exe"), Some(&200));
}

#[test]
fn workspace_ratio_guards_division_by_zero() {
    let mut remote = record("code.exe", 300, ActivityStatus::Active, at(1, 9));
    remote.workspace_type = Some(WORKSPACE_PRODUCTIVE.to_string());

    let comparison = analytics::workspace_comparison(&[remote]);
    assert_eq!(comparison.productive_vs_local_ratio, 0.0);
}

#[test]
fn tamper_reports_project_flagged_records_only() {
    let clean = record("a.exe", 60, ActivityStatus::Active, at(1, 9));
    let mut flagged = record("b.exe", 60, ActivityStatus::Active, at(1, 10));
    flagged.tamper_attempt = true;
    flagged.tamper_detail = Some("integrity hash mismatch".to_string());
    flagged.machine_id = Some("WS-042".to_string());
    flagged.ip_address = Some("10.1.2.3".to_string());

    let reports = analytics::tamper_reports(&[clean, flagged.clone()]);
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].timestamp, flagged.created_at);
    assert_eq!(
        reports[0].detail.as_deref(),
        Some("integrity hash mismatch")
    );
    assert_eq!(reports[0].machine_id.as_deref(), Some("WS-042"));
}

#[test]
fn summary_rolls_up_records_into_a_daily_timeline() {
    let records = vec![
        record("chrome.exe", 120, ActivityStatus::Active, at(1, 9)),
        record("slack.exe", 60, ActivityStatus::Idle, at(1, 10)),
        record("chrome.exe", 180, ActivityStatus::Active, at(2, 9)),
    ];

    let summary = analytics::activity_summary(7, &records);
    assert_eq!(summary.user_id, 7);
    assert_eq!(summary.total_records, 3);
    assert_eq!(summary.total_seconds, 360);
    assert_eq!(summary.productive_seconds, 300);
    assert_eq!(summary.idle_seconds, 60);
    assert_eq!(summary.offline_seconds, 0);
    assert_eq!(
        summary.most_used_application.as_deref(),
        Some("chrome.exe")
    );
    assert_eq!(summary.unique_applications.len(), 2);

    let day1 = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    let breakdown = &summary.daily_timeline[&day1];
    assert_eq!(breakdown.total_seconds, 180);
    assert_eq!(breakdown.productive_seconds, 120);
    assert_eq!(breakdown.applications.len(), 2);
    assert!(summary.tamper_reports.is_empty());
}

#[test]
fn engine_scopes_queries_to_the_requested_window() {
    let store = Arc::new(MemoryRecordStore::new());
    store
        .save_activity(&record("in.exe", 100, ActivityStatus::Active, at(10, 9)))
        .unwrap();
    store
        .save_activity(&record("out.exe", 100, ActivityStatus::Active, at(20, 9)))
        .unwrap();

    let engine = AnalyticsEngine::new(store);
    let summary = engine.summary(7, at(9, 0), at(11, 0)).unwrap();
    assert_eq!(summary.total_records, 1);
    assert_eq!(
        summary.application_usage_seconds.get("in.exe"),
        Some(&100)
    );
    assert!(!summary.application_usage_seconds.contains_key("out.exe"));

    let empty = engine.summary(99, at(9, 0), at(11, 0)).unwrap();
    assert_eq!(empty.total_records, 0);
    assert_eq!(empty.most_used_application, None);
}
