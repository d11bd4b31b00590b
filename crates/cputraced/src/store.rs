//! SQLite trace store.
//!
//! One `traces` table holds identity, metadata, the ingestion-time summary,
//! and the raw payload JSON (kept so the detail view can replay the sample
//! timeline). The statistics engine never touches this module; it only ever
//! sees sample slices.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

use cputrace_common::stats::TraceSummary;
use cputrace_common::trace::{TracePayload, TraceRecord};

/// Default page size for list queries.
pub const DEFAULT_LIST_LIMIT: usize = 20;

pub struct TraceStore {
    conn: Arc<Mutex<Connection>>,
}

impl TraceStore {
    /// Open (or create) the trace database and initialize the schema.
    pub fn open(db_path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(db_path).parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path).context("Failed to open trace database")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS traces (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL UNIQUE,
                process_name TEXT NOT NULL,
                pid INTEGER NOT NULL,
                duration_sec INTEGER NOT NULL,
                start_time TEXT NOT NULL,
                cpu_avg REAL NOT NULL,
                cpu_max REAL NOT NULL,
                sample_count INTEGER NOT NULL,
                raw_json TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_traces_created ON traces(created_at DESC)",
            [],
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Insert a new trace with its ingestion-time summary.
    ///
    /// Each capture session may be uploaded once; a duplicate `session_id`
    /// is rejected before anything is written.
    pub fn insert(
        &self,
        payload: &TracePayload,
        summary: &TraceSummary,
        raw_json: &str,
    ) -> Result<TraceRecord> {
        let conn = self.conn.lock().unwrap();

        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM traces WHERE session_id = ?1",
                [&payload.session_id],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            anyhow::bail!("session_id {} already exists", payload.session_id);
        }

        let created_at = chrono::Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO traces (session_id, process_name, pid, duration_sec, start_time,
                                 cpu_avg, cpu_max, sample_count, raw_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                &payload.session_id,
                &payload.meta.process_name,
                payload.meta.pid,
                payload.duration_sec as i64,
                &payload.start_time,
                summary.cpu_avg,
                summary.cpu_max,
                summary.sample_count as i64,
                raw_json,
                &created_at,
            ],
        )?;

        Ok(TraceRecord {
            id: conn.last_insert_rowid(),
            session_id: payload.session_id.clone(),
            process_name: payload.meta.process_name.clone(),
            pid: payload.meta.pid,
            duration_sec: payload.duration_sec,
            start_time: payload.start_time.clone(),
            cpu_avg: summary.cpu_avg,
            cpu_max: summary.cpu_max,
            sample_count: summary.sample_count,
            created_at,
        })
    }

    /// List stored traces, newest first.
    pub fn list(&self, offset: usize, limit: usize) -> Result<Vec<TraceRecord>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT id, session_id, process_name, pid, duration_sec, start_time,
                    cpu_avg, cpu_max, sample_count, created_at
             FROM traces
             ORDER BY created_at DESC, id DESC
             LIMIT ?1 OFFSET ?2",
        )?;

        let rows = stmt.query_map(params![limit as i64, offset as i64], |row| {
            Ok(TraceRecord {
                id: row.get(0)?,
                session_id: row.get(1)?,
                process_name: row.get(2)?,
                pid: row.get::<_, i64>(3)? as u32,
                duration_sec: row.get::<_, i64>(4)? as u64,
                start_time: row.get(5)?,
                cpu_avg: row.get(6)?,
                cpu_max: row.get(7)?,
                sample_count: row.get::<_, i64>(8)? as usize,
                created_at: row.get(9)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }

        Ok(records)
    }

    /// Fetch one trace and its raw payload JSON.
    pub fn get(&self, id: i64) -> Result<Option<(TraceRecord, String)>> {
        let conn = self.conn.lock().unwrap();

        let row = conn
            .query_row(
                "SELECT id, session_id, process_name, pid, duration_sec, start_time,
                        cpu_avg, cpu_max, sample_count, created_at, raw_json
                 FROM traces
                 WHERE id = ?1",
                [id],
                |row| {
                    Ok((
                        TraceRecord {
                            id: row.get(0)?,
                            session_id: row.get(1)?,
                            process_name: row.get(2)?,
                            pid: row.get::<_, i64>(3)? as u32,
                            duration_sec: row.get::<_, i64>(4)? as u64,
                            start_time: row.get(5)?,
                            cpu_avg: row.get(6)?,
                            cpu_max: row.get(7)?,
                            sample_count: row.get::<_, i64>(8)? as usize,
                            created_at: row.get(9)?,
                        },
                        row.get::<_, String>(10)?,
                    ))
                },
            )
            .optional()?;

        Ok(row)
    }

    /// Number of stored traces.
    pub fn count(&self) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM traces", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
