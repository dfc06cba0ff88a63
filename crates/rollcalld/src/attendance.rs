//! Append-only SQLite attendance log.
//!
//! Entries are immutable once written; the only operations are append and
//! filtered query. One row is appended per accepted recognition, with no
//! dedup window for repeated detections.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;

pub const DEFAULT_STATUS: &str = "present";

/// One attendance row. `timestamp` is the SQLite insert-time default.
#[derive(Debug, Clone, Serialize)]
pub struct AttendanceEntry {
    pub id: i64,
    pub student_id: String,
    pub student_name: String,
    pub timestamp: String,
    pub status: String,
}

/// Optional filters for [`AttendanceLog::query`]. Date bounds compare
/// against `DATE(timestamp)`.
#[derive(Debug, Default, Clone)]
pub struct AttendanceFilter {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub student_id: Option<String>,
    pub status: Option<String>,
}

pub struct AttendanceLog {
    conn: Mutex<Connection>,
}

impl AttendanceLog {
    /// Open (or create) the attendance database at the given path with the
    /// schema initialized.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        init_schema(&conn)?;

        tracing::info!(path = %path.display(), "attendance database ready");
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Open an in-memory database for testing.
    #[cfg(test)]
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Append one attendance row; `timestamp` defaults to now and `status`
    /// to "present" when empty.
    pub fn append(&self, student_id: &str, student_name: &str, status: &str) -> Result<()> {
        let status = if status.is_empty() { DEFAULT_STATUS } else { status };
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "INSERT INTO attendance (student_id, student_name, status) VALUES (?1, ?2, ?3)",
            (student_id, student_name, status),
        )?;
        tracing::info!(student_id, student_name, status, "attendance recorded");
        Ok(())
    }

    /// Filtered query, newest first.
    pub fn query(&self, filter: &AttendanceFilter) -> Result<Vec<AttendanceEntry>> {
        let mut sql = String::from(
            "SELECT id, student_id, student_name, timestamp, status FROM attendance",
        );
        let mut conditions: Vec<&str> = Vec::new();
        let mut params: Vec<&str> = Vec::new();

        if let Some(start) = &filter.start_date {
            conditions.push("DATE(timestamp) >= ?");
            params.push(start);
        }
        if let Some(end) = &filter.end_date {
            conditions.push("DATE(timestamp) <= ?");
            params.push(end);
        }
        if let Some(id) = &filter.student_id {
            conditions.push("student_id = ?");
            params.push(id);
        }
        if let Some(status) = &filter.status {
            conditions.push("status = ?");
            params.push(status);
        }

        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY timestamp DESC, id DESC");

        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(params), |row| {
            Ok(AttendanceEntry {
                id: row.get(0)?,
                student_id: row.get(1)?,
                student_name: row.get(2)?,
                timestamp: row.get(3)?,
                status: row.get(4)?,
            })
        })?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id   TEXT NOT NULL,
            student_name TEXT NOT NULL,
            timestamp    DATETIME DEFAULT CURRENT_TIMESTAMP,
            status       TEXT DEFAULT 'present'
        )",
        (),
    )?;
    Ok(())
}
