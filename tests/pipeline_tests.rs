//! End-to-end flow: raw client entries in, flushed records and analytics out.

use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use vigil::accounts::StaticAccounts;
use vigil::analytics::AnalyticsEngine;
use vigil::flush::{FlushSettings, FlushWorker};
use vigil::ingest::{Enricher, IngestError, Ingestor, Origin};
use vigil::queue::ActivityQueue;
use vigil_common::clock::FixedClock;
use vigil_core::integrity::IntegrityStamper;
use vigil_core::raw::RawActivityLog;
use vigil_storage::RecordStore;
use vigil_storage::memory::MemoryRecordStore;
use vigil_storage::sqlite3::SqliteRecordStore;

fn raw(user_id: i64, process: &str) -> RawActivityLog {
    RawActivityLog {
        user_id: Some(user_id),
        process_name: Some(process.to_string()),
        process_id: Some(format!("pid-{}", process)),
        ..Default::default()
    }
}

fn settings() -> FlushSettings {
    FlushSettings {
        interval: Duration::from_secs(60),
        max_persist_attempts: 3,
        persist_deadline: Duration::from_secs(2),
        dead_letter_capacity: 16,
    }
}

#[test]
fn batch_flows_from_ingest_through_flush_into_analytics() {
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
    let accounts = Arc::new(StaticAccounts::new());
    accounts.add_user(1, true);

    let store = Arc::new(MemoryRecordStore::new());
    let queue = ActivityQueue::new();
    let enricher = Enricher::new(
        accounts,
        Arc::new(IntegrityStamper::new()),
        Arc::new(FixedClock(now)),
        Origin {
            ip_address: "10.0.0.5".to_string(),
            machine_id: "alice-host".to_string(),
        },
    );
    let ingestor = Ingestor::new(
        enricher,
        queue.clone(),
        Arc::clone(&store) as Arc<dyn RecordStore>,
    );

    let mut bad = raw(1, "excel.exe");
    bad.user_id = None;
    let batch = vec![raw(1, "chrome.exe"), bad, raw(1, "Code.exe")];
    let report = ingestor.ingest_batch(&batch);
    assert_eq!(report.accepted, 2);
    assert_eq!(report.errors, vec![(1, IngestError::MissingField("userId"))]);

    // Nothing is persisted until the flush worker drains the queue.
    assert_eq!(store.activity_count(), 0);
    let worker = FlushWorker::new(queue, Arc::clone(&store) as _, settings());
    let outcome = worker.run_cycle();
    assert_eq!(outcome.persisted, 2);
    assert_eq!(store.activity_count(), 2);

    let engine = AnalyticsEngine::new(Arc::clone(&store) as _);
    let window_start = now - chrono::Duration::hours(1);
    let window_end = now + chrono::Duration::hours(1);

    let summary = engine.summary(1, window_start, window_end).unwrap();
    assert_eq!(summary.total_records, 2);
    // Both records carry the one-minute monitoring default span.
    assert_eq!(summary.total_seconds, 120);
    assert!(summary.unique_applications.contains("chrome.exe"));
    assert!(summary.unique_applications.contains("Code.exe"));
    assert!(summary.tamper_reports.is_empty());

    // The direct tracking path persisted siblings at ingest time.
    let tracks = engine.process_tracks(1, window_start, window_end).unwrap();
    assert_eq!(tracks.top_applications.len(), 2);
    assert_eq!(
        tracks.category_usage_seconds.get("DEVELOPMENT").copied(),
        Some(60)
    );
    assert_eq!(
        tracks.category_usage_seconds.get("BROWSER").copied(),
        Some(60)
    );
    assert_eq!(tracks.productive_seconds, 60);
    assert_eq!(tracks.non_productive_seconds, 60);
}

#[test]
fn sqlite_backed_pipeline_survives_a_reopen() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("vigil.sqlite3");
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();

    {
        let accounts = Arc::new(StaticAccounts::new());
        accounts.add_user(1, true);
        let store: Arc<dyn RecordStore> =
            Arc::new(SqliteRecordStore::new(&db_path, 5_000).expect("open store"));
        let queue = ActivityQueue::new();
        let enricher = Enricher::new(
            accounts,
            Arc::new(IntegrityStamper::new()),
            Arc::new(FixedClock(now)),
            Origin {
                ip_address: "10.0.0.5".to_string(),
                machine_id: "alice-host".to_string(),
            },
        );
        let ingestor = Ingestor::new(enricher, queue.clone(), Arc::clone(&store));
        let report = ingestor.ingest_batch(&[raw(1, "chrome.exe"), raw(1, "excel.exe")]);
        assert_eq!(report.accepted, 2);

        let worker = FlushWorker::new(queue, store, settings());
        assert_eq!(worker.run_cycle().persisted, 2);
    }

    // Records must be readable from a fresh connection.
    let reopened: Arc<dyn RecordStore> =
        Arc::new(SqliteRecordStore::new(&db_path, 5_000).expect("reopen store"));
    let engine = AnalyticsEngine::new(reopened);
    let summary = engine
        .summary(
            1,
            now - chrono::Duration::hours(1),
            now + chrono::Duration::hours(1),
        )
        .unwrap();
    assert_eq!(summary.total_records, 2);
    assert!(summary.unique_applications.contains("excel.exe"));
    assert!(
        summary
            .application_usage_seconds
            .values()
            .all(|secs| *secs == 60)
    );
}

#[test]
fn tampered_entry_survives_the_pipeline_and_surfaces_in_reports() {
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 14, 0, 0).unwrap();
    let accounts = Arc::new(StaticAccounts::new());
    accounts.add_user(2, true);

    let store = Arc::new(MemoryRecordStore::new());
    let queue = ActivityQueue::new();
    // Reject every process the legitimacy check sees.
    let stamper = Arc::new(IntegrityStamper::with_verifier(Box::new(|_, _| false)));
    let enricher = Enricher::new(
        accounts,
        stamper,
        Arc::new(FixedClock(now)),
        Origin {
            ip_address: "10.0.0.9".to_string(),
            machine_id: "bob-host".to_string(),
        },
    );
    let ingestor = Ingestor::new(
        enricher,
        queue.clone(),
        Arc::clone(&store) as Arc<dyn RecordStore>,
    );

    let report = ingestor.ingest_batch(&[raw(2, "chrome.exe")]);
    assert_eq!(report.accepted, 1);

    let worker = FlushWorker::new(queue, Arc::clone(&store) as _, settings());
    assert_eq!(worker.run_cycle().persisted, 1);

    let engine = AnalyticsEngine::new(Arc::clone(&store) as _);
    let reports = engine
        .tamper_reports(2, now - chrono::Duration::hours(1), now + chrono::Duration::hours(1))
        .unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].detail.as_deref(), Some("Invalid process detected"));
    assert_eq!(reports[0].machine_id.as_deref(), Some("bob-host"));
    assert_eq!(reports[0].ip_address.as_deref(), Some("10.0.0.9"));
}
