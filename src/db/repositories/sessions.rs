use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::connection::Database;
use crate::models::{
    NewSession, PauseEntry, SessionFilter, SessionRecord, SessionStatus, SessionUpdate,
};
use crate::store::SessionStore;

const SESSION_COLUMNS: &str = "id, started_at, ended_at, status, concentration_mode, revision, \
     elapsed_minutes, distraction_count, distraction_minutes, pause_count, pause_seconds, \
     pause_log, completed_cycles, updated_at";

/// Counters are unsigned in memory and INTEGER (i64) in SQLite.
fn sql_int(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("{value} does not fit in a SQLite INTEGER"))
}

fn pause_log_json(entries: &[PauseEntry]) -> Result<String> {
    serde_json::to_string(entries).context("failed to encode pause log")
}

fn column_u64(row: &Row, name: &str) -> Result<u64> {
    let raw: i64 = row.get(name)?;
    u64::try_from(raw).map_err(|_| anyhow!("sessions.{name} holds negative value {raw}"))
}

fn column_u32(row: &Row, name: &str) -> Result<u32> {
    let raw: i64 = row.get(name)?;
    u32::try_from(raw).map_err(|_| anyhow!("sessions.{name} out of range: {raw}"))
}

fn column_time(row: &Row, name: &str) -> Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(name)?;
    raw.map(|text| {
        DateTime::parse_from_rfc3339(&text)
            .map(|dt| dt.with_timezone(&Utc))
            .with_context(|| format!("sessions.{name} is not RFC 3339: {text}"))
    })
    .transpose()
}

fn required_time(row: &Row, name: &str) -> Result<DateTime<Utc>> {
    column_time(row, name)?.ok_or_else(|| anyhow!("sessions.{name} is NULL"))
}

fn column_pause_log(row: &Row) -> Result<Vec<PauseEntry>> {
    let raw: String = row.get("pause_log")?;
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&raw).context("failed to decode pause log")
}

fn row_to_session(row: &Row) -> Result<SessionRecord> {
    let status: String = row.get("status")?;

    Ok(SessionRecord {
        id: row.get("id")?,
        started_at: required_time(row, "started_at")?,
        ended_at: column_time(row, "ended_at")?,
        status: status.parse()?,
        concentration_mode: row.get::<_, i64>("concentration_mode")? != 0,
        revision: column_u64(row, "revision")?,
        elapsed_minutes: column_u64(row, "elapsed_minutes")?,
        distraction_count: column_u32(row, "distraction_count")?,
        distraction_minutes: column_u64(row, "distraction_minutes")?,
        pause_count: column_u32(row, "pause_count")?,
        pause_seconds: column_u64(row, "pause_seconds")?,
        pause_log: column_pause_log(row)?,
        completed_cycles: column_u32(row, "completed_cycles")?,
        updated_at: required_time(row, "updated_at")?,
    })
}

impl Database {
    pub async fn insert_session(&self, session: &SessionRecord) -> Result<()> {
        let record = session.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, started_at, ended_at, status, concentration_mode, revision,
                     elapsed_minutes, distraction_count, distraction_minutes, pause_count,
                     pause_seconds, pause_log, completed_cycles, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    record.id,
                    record.started_at.to_rfc3339(),
                    record.ended_at.as_ref().map(|dt| dt.to_rfc3339()),
                    record.status.as_str(),
                    record.concentration_mode as i64,
                    sql_int(record.revision)?,
                    sql_int(record.elapsed_minutes)?,
                    record.distraction_count,
                    sql_int(record.distraction_minutes)?,
                    record.pause_count,
                    sql_int(record.pause_seconds)?,
                    pause_log_json(&record.pause_log)?,
                    record.completed_cycles,
                    record.started_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Overwrite the session's counters unless the stored revision is newer.
    /// Returns whether the row changed.
    pub async fn apply_session_update(
        &self,
        session_id: &str,
        update: &SessionUpdate,
    ) -> Result<bool> {
        let session_id = session_id.to_string();
        let update = update.clone();
        self.execute(move |conn| {
            let changed = conn.execute(
                "UPDATE sessions
                 SET revision = ?1,
                     status = ?2,
                     elapsed_minutes = ?3,
                     distraction_count = ?4,
                     distraction_minutes = ?5,
                     pause_count = ?6,
                     pause_seconds = ?7,
                     pause_log = ?8,
                     completed_cycles = ?9,
                     ended_at = COALESCE(?10, ended_at),
                     updated_at = ?11
                 WHERE id = ?12 AND revision <= ?1",
                params![
                    sql_int(update.revision)?,
                    update.status.as_str(),
                    sql_int(update.elapsed_minutes)?,
                    update.distraction_count,
                    sql_int(update.distraction_minutes)?,
                    update.pause_count,
                    sql_int(update.pause_seconds)?,
                    pause_log_json(&update.pause_log)?,
                    update.completed_cycles,
                    update.ended_at.map(|dt| dt.to_rfc3339()),
                    update.updated_at.to_rfc3339(),
                    session_id,
                ],
            )?;

            if changed == 0 {
                let exists: Option<i64> = conn
                    .query_row(
                        "SELECT 1 FROM sessions WHERE id = ?1",
                        params![session_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                if exists.is_none() {
                    return Err(anyhow!("unknown session {session_id}"));
                }
            }
            Ok(changed > 0)
        })
        .await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"
            ))?;

            let mut rows = stmt.query(params![session_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_session(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    pub async fn query_sessions(&self, filter: &SessionFilter) -> Result<Vec<SessionRecord>> {
        let filter = filter.clone();
        self.execute(move |conn| {
            let mode = filter.concentration_mode.map(|flag| flag as i64);
            let limit = filter.limit.map(|l| l as i64).unwrap_or(-1);

            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE (?1 IS NULL OR concentration_mode = ?1)
                 ORDER BY started_at DESC
                 LIMIT ?2"
            ))?;

            let mut rows = stmt.query(params![mode, limit])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_session(row)?);
            }
            Ok(sessions)
        })
        .await
    }

    /// Close sessions a crash left Running or Paused. Returns how many changed.
    pub async fn mark_open_sessions_interrupted(&self, stopped_at: DateTime<Utc>) -> Result<usize> {
        self.execute(move |conn| {
            let changed = conn.execute(
                "UPDATE sessions
                 SET status = ?1,
                     ended_at = ?2,
                     updated_at = ?2
                 WHERE status IN (?3, ?4)",
                params![
                    SessionStatus::Interrupted.as_str(),
                    stopped_at.to_rfc3339(),
                    SessionStatus::Running.as_str(),
                    SessionStatus::Paused.as_str(),
                ],
            )?;
            Ok(changed)
        })
        .await
    }
}

#[async_trait]
impl SessionStore for Database {
    async fn create_session(&self, session: &NewSession) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.insert_session(&SessionRecord::from_new(id.clone(), session))
            .await?;
        Ok(id)
    }

    async fn update_session(&self, session_id: &str, update: &SessionUpdate) -> Result<()> {
        self.apply_session_update(session_id, update).await.map(|_| ())
    }

    async fn list_sessions(&self, filter: &SessionFilter) -> Result<Vec<SessionRecord>> {
        self.query_sessions(filter).await
    }
}
