use crate::RecordStore;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params, params_from_iter};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use vigil_core::records::{ActivityRecord, ActivityStatus, ProcessTrackRecord};

fn parse_status_label(label: &str) -> ActivityStatus {
    match ActivityStatus::from_label(label) {
        Some(status) => status,
        None => {
            log::warn!("Unknown activity status in DB: {}", label);
            ActivityStatus::Active
        }
    }
}

fn parse_timestamp(text: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

pub struct SqliteRecordStore {
    db_path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    pub fn new<P: AsRef<Path>>(db_path: P, busy_timeout_ms: u64) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }

        let conn = Connection::open(&db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "busy_timeout", busy_timeout_ms as i64)?;
        Self::init_db(&conn)?;

        Ok(Self {
            db_path,
            conn: Mutex::new(conn),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn init_db(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS activities (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                activity_type TEXT NOT NULL,
                description TEXT NOT NULL,
                application_name TEXT,
                window_title TEXT,
                process_id TEXT,
                process_name TEXT,
                application_category TEXT,
                workspace_type TEXT,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                duration_seconds INTEGER NOT NULL,
                status TEXT NOT NULL,
                idle_seconds INTEGER NOT NULL,
                tamper_attempt INTEGER NOT NULL,
                tamper_detail TEXT,
                integrity_hash TEXT,
                ip_address TEXT,
                machine_id TEXT,
                created_at TEXT NOT NULL,
                revision INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_activities_user_start ON activities(user_id, start_time);
            CREATE TABLE IF NOT EXISTS process_tracks (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                process_name TEXT NOT NULL,
                window_title TEXT,
                process_id TEXT,
                category TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                duration_seconds INTEGER NOT NULL,
                is_productive INTEGER NOT NULL,
                application_path TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_process_tracks_user_start ON process_tracks(user_id, start_time);",
        )?;
        Ok(())
    }

    fn activity_from_row(row: &Row<'_>) -> rusqlite::Result<ActivityRecord> {
        let status: String = row.get("status")?;
        Ok(ActivityRecord {
            user_id: row.get("user_id")?,
            activity_type: row.get("activity_type")?,
            description: row.get("description")?,
            application_name: row.get("application_name")?,
            window_title: row.get("window_title")?,
            process_id: row.get("process_id")?,
            process_name: row.get("process_name")?,
            application_category: row.get("application_category")?,
            workspace_type: row.get("workspace_type")?,
            start_time: parse_timestamp(row.get("start_time")?)?,
            end_time: parse_timestamp(row.get("end_time")?)?,
            duration_seconds: row.get("duration_seconds")?,
            status: parse_status_label(&status),
            idle_seconds: row.get("idle_seconds")?,
            tamper_attempt: row.get::<_, i64>("tamper_attempt")? != 0,
            tamper_detail: row.get("tamper_detail")?,
            integrity_hash: row.get("integrity_hash")?,
            ip_address: row.get("ip_address")?,
            machine_id: row.get("machine_id")?,
            created_at: parse_timestamp(row.get("created_at")?)?,
            revision: row.get::<_, i64>("revision")? as u64,
        })
    }
}

impl RecordStore for SqliteRecordStore {
    fn save_activity(&self, record: &ActivityRecord) -> Result<i64> {
        let conn = self.conn.lock().expect("sqlite connection poisoned");
        conn.execute(
            "INSERT INTO activities (
                user_id, activity_type, description, application_name, window_title,
                process_id, process_name, application_category, workspace_type,
                start_time, end_time, duration_seconds, status, idle_seconds,
                tamper_attempt, tamper_detail, integrity_hash, ip_address, machine_id,
                created_at, revision
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                record.user_id,
                record.activity_type,
                record.description,
                record.application_name,
                record.window_title,
                record.process_id,
                record.process_name,
                record.application_category,
                record.workspace_type,
                record.start_time.to_rfc3339(),
                record.end_time.to_rfc3339(),
                record.duration_seconds,
                record.status.as_str(),
                record.idle_seconds,
                if record.tamper_attempt { 1 } else { 0 },
                record.tamper_detail,
                record.integrity_hash,
                record.ip_address,
                record.machine_id,
                record.created_at.to_rfc3339(),
                record.revision as i64,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn save_process_track(&self, record: &ProcessTrackRecord) -> Result<i64> {
        let conn = self.conn.lock().expect("sqlite connection poisoned");
        conn.execute(
            "INSERT INTO process_tracks (
                user_id, process_name, window_title, process_id, category,
                start_time, end_time, duration_seconds, is_productive, application_path
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                record.user_id,
                record.process_name,
                record.window_title,
                record.process_id,
                record.category,
                record.start_time.to_rfc3339(),
                record.end_time.to_rfc3339(),
                record.duration_seconds,
                if record.is_productive { 1 } else { 0 },
                record.application_path,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn activities_in_range(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ActivityRecord>> {
        let conn = self.conn.lock().expect("sqlite connection poisoned");
        let mut stmt = conn.prepare(
            "SELECT * FROM activities
             WHERE user_id = ? AND start_time >= ? AND start_time <= ?
             ORDER BY start_time ASC",
        )?;
        let rows = stmt.query_map(
            params![user_id, start.to_rfc3339(), end.to_rfc3339()],
            Self::activity_from_row,
        )?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn process_tracks_in_range(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ProcessTrackRecord>> {
        let conn = self.conn.lock().expect("sqlite connection poisoned");
        let mut stmt = conn.prepare(
            "SELECT user_id, process_name, window_title, process_id, category,
                    start_time, end_time, duration_seconds, is_productive, application_path
             FROM process_tracks
             WHERE user_id = ? AND start_time >= ? AND start_time <= ?
             ORDER BY start_time ASC",
        )?;
        let rows = stmt.query_map(
            params![user_id, start.to_rfc3339(), end.to_rfc3339()],
            |row| {
                Ok(ProcessTrackRecord {
                    user_id: row.get(0)?,
                    process_name: row.get(1)?,
                    window_title: row.get(2)?,
                    process_id: row.get(3)?,
                    category: row.get(4)?,
                    start_time: parse_timestamp(row.get(5)?)?,
                    end_time: parse_timestamp(row.get(6)?)?,
                    duration_seconds: row.get(7)?,
                    is_productive: row.get::<_, i64>(8)? != 0,
                    application_path: row.get(9)?,
                })
            },
        )?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn activity_user_ids(&self) -> Result<Vec<i64>> {
        let conn = self.conn.lock().expect("sqlite connection poisoned");
        let mut stmt =
            conn.prepare("SELECT DISTINCT user_id FROM activities ORDER BY user_id ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    fn count_activities(&self, user_id: i64) -> Result<u64> {
        let conn = self.conn.lock().expect("sqlite connection poisoned");
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM activities WHERE user_id = ?",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn delete_activities_for_users(&self, user_ids: &[i64]) -> Result<usize> {
        if user_ids.is_empty() {
            return Ok(0);
        }
        let conn = self.conn.lock().expect("sqlite connection poisoned");
        let placeholders = vec!["?"; user_ids.len()].join(", ");
        let sql = format!("DELETE FROM activities WHERE user_id IN ({})", placeholders);
        let deleted = conn.execute(&sql, params_from_iter(user_ids.iter()))?;
        Ok(deleted)
    }

    fn delete_activities_in_range(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<usize> {
        let conn = self.conn.lock().expect("sqlite connection poisoned");
        let deleted = conn.execute(
            "DELETE FROM activities WHERE user_id = ? AND start_time >= ? AND start_time <= ?",
            params![user_id, start.to_rfc3339(), end.to_rfc3339()],
        )?;
        Ok(deleted)
    }
}
