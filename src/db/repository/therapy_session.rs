use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{opt_ts, parse_opt_ts, parse_ts, parse_uuid, ts};
use crate::config::MAX_SESSION_MINUTES;
use crate::db::DatabaseError;
use crate::models::enums::{SessionStatus, SessionType};
use crate::models::*;

const SESSION_COLUMNS: &str = "id, patient_id, therapist_id, session_type, status, scheduled_at,
     duration, modality, notes, homework, next_session_date, actual_start_time,
     actual_end_time, created_at, updated_at";

pub fn insert_therapy_session(conn: &Connection, s: &TherapySession) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO therapy_sessions (id, patient_id, therapist_id, session_type, status,
         scheduled_at, duration, modality, notes, homework, next_session_date,
         actual_start_time, actual_end_time, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            s.id.to_string(),
            s.patient_id,
            s.therapist_id,
            s.session_type.as_str(),
            s.status.as_str(),
            ts(&s.scheduled_at),
            s.duration,
            s.modality,
            s.notes,
            s.homework,
            opt_ts(&s.next_session_date),
            opt_ts(&s.actual_start_time),
            opt_ts(&s.actual_end_time),
            ts(&s.created_at),
            ts(&s.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_therapy_session(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<TherapySession>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {SESSION_COLUMNS} FROM therapy_sessions WHERE id = ?1"),
            params![id.to_string()],
            session_row_from_rusqlite,
        )
        .optional()?;
    row.map(session_from_row).transpose()
}

/// Write back every mutable column. Fails with `NotFound` if the row is gone.
pub fn update_therapy_session(conn: &Connection, s: &TherapySession) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE therapy_sessions SET session_type = ?2, status = ?3, scheduled_at = ?4,
         duration = ?5, modality = ?6, notes = ?7, homework = ?8, next_session_date = ?9,
         actual_start_time = ?10, actual_end_time = ?11, updated_at = ?12
         WHERE id = ?1",
        params![
            s.id.to_string(),
            s.session_type.as_str(),
            s.status.as_str(),
            ts(&s.scheduled_at),
            s.duration,
            s.modality,
            s.notes,
            s.homework,
            opt_ts(&s.next_session_date),
            opt_ts(&s.actual_start_time),
            opt_ts(&s.actual_end_time),
            ts(&s.updated_at),
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::not_found("TherapySession", s.id));
    }
    Ok(())
}

/// Sessions matching the filter, most recent first.
pub fn list_therapy_sessions(
    conn: &Connection,
    filter: &TherapySessionFilter,
) -> Result<Vec<TherapySession>, DatabaseError> {
    let mut sql = format!("SELECT {SESSION_COLUMNS} FROM therapy_sessions WHERE 1=1");
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(ref patient_id) = filter.patient_id {
        params_vec.push(Box::new(patient_id.clone()));
        sql.push_str(&format!(" AND patient_id = ?{}", params_vec.len()));
    }
    if let Some(ref therapist_id) = filter.therapist_id {
        params_vec.push(Box::new(therapist_id.clone()));
        sql.push_str(&format!(" AND therapist_id = ?{}", params_vec.len()));
    }
    if let Some(status) = filter.status {
        params_vec.push(Box::new(status.as_str()));
        sql.push_str(&format!(" AND status = ?{}", params_vec.len()));
    }
    if let Some(ref from) = filter.date_from {
        params_vec.push(Box::new(ts(from)));
        sql.push_str(&format!(" AND scheduled_at >= ?{}", params_vec.len()));
    }
    if let Some(ref to) = filter.date_to {
        params_vec.push(Box::new(ts(to)));
        sql.push_str(&format!(" AND scheduled_at <= ?{}", params_vec.len()));
    }
    sql.push_str(" ORDER BY scheduled_at DESC");

    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(param_refs.as_slice(), session_row_from_rusqlite)?;

    let mut sessions = Vec::new();
    for row in rows {
        sessions.push(session_from_row(row?)?);
    }
    Ok(sessions)
}

/// Non-terminal sessions of a therapist whose interval overlaps `[start, end)`.
pub fn find_overlapping_sessions(
    conn: &Connection,
    therapist_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude: Option<&Uuid>,
) -> Result<Vec<TherapySession>, DatabaseError> {
    // Any overlapping session must begin within one maximum duration before `start`.
    let window_start = start - Duration::minutes(MAX_SESSION_MINUTES as i64);
    let mut stmt = conn.prepare(&format!(
        "SELECT {SESSION_COLUMNS} FROM therapy_sessions
         WHERE therapist_id = ?1
           AND status IN ('scheduled', 'in_progress')
           AND scheduled_at < ?2 AND scheduled_at >= ?3
         ORDER BY scheduled_at"
    ))?;
    let rows = stmt.query_map(
        params![therapist_id, ts(&end), ts(&window_start)],
        session_row_from_rusqlite,
    )?;

    let excluded = exclude.map(|id| id.to_string());
    let mut clashes = Vec::new();
    for row in rows {
        let row = row?;
        if excluded.as_deref() == Some(row.id.as_str()) {
            continue;
        }
        let session = session_from_row(row)?;
        if session.ends_at() > start {
            clashes.push(session);
        }
    }
    Ok(clashes)
}

// Internal row type for TherapySession mapping
struct SessionRow {
    id: String,
    patient_id: String,
    therapist_id: String,
    session_type: String,
    status: String,
    scheduled_at: String,
    duration: i32,
    modality: Option<String>,
    notes: Option<String>,
    homework: Option<String>,
    next_session_date: Option<String>,
    actual_start_time: Option<String>,
    actual_end_time: Option<String>,
    created_at: String,
    updated_at: String,
}

fn session_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<SessionRow, rusqlite::Error> {
    Ok(SessionRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        therapist_id: row.get(2)?,
        session_type: row.get(3)?,
        status: row.get(4)?,
        scheduled_at: row.get(5)?,
        duration: row.get(6)?,
        modality: row.get(7)?,
        notes: row.get(8)?,
        homework: row.get(9)?,
        next_session_date: row.get(10)?,
        actual_start_time: row.get(11)?,
        actual_end_time: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

fn session_from_row(row: SessionRow) -> Result<TherapySession, DatabaseError> {
    Ok(TherapySession {
        id: parse_uuid(&row.id)?,
        patient_id: row.patient_id,
        therapist_id: row.therapist_id,
        session_type: SessionType::from_str(&row.session_type)?,
        status: SessionStatus::from_str(&row.status)?,
        scheduled_at: parse_ts(&row.scheduled_at)?,
        duration: row.duration,
        modality: row.modality,
        notes: row.notes,
        homework: row.homework,
        next_session_date: parse_opt_ts(row.next_session_date)?,
        actual_start_time: parse_opt_ts(row.actual_start_time)?,
        actual_end_time: parse_opt_ts(row.actual_end_time)?,
        created_at: parse_ts(&row.created_at)?,
        updated_at: parse_ts(&row.updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, hour, minute, 0).unwrap()
    }

    fn session(therapist: &str, start: DateTime<Utc>, duration: i32) -> TherapySession {
        let now = Utc::now();
        TherapySession {
            id: Uuid::new_v4(),
            patient_id: "patient-1".into(),
            therapist_id: therapist.into(),
            session_type: SessionType::Individual,
            status: SessionStatus::Scheduled,
            scheduled_at: start,
            duration,
            modality: Some("telehealth".into()),
            notes: None,
            homework: None,
            next_session_date: None,
            actual_start_time: None,
            actual_end_time: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn insert_and_get_round_trip() {
        let conn = open_memory_database().unwrap();
        let s = session("dr-a", at(9, 0), 50);
        insert_therapy_session(&conn, &s).unwrap();

        let loaded = get_therapy_session(&conn, &s.id).unwrap().unwrap();
        assert_eq!(loaded.scheduled_at, s.scheduled_at);
        assert_eq!(loaded.modality.as_deref(), Some("telehealth"));
        assert!(get_therapy_session(&conn, &Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn list_filters_and_orders_desc() {
        let conn = open_memory_database().unwrap();
        insert_therapy_session(&conn, &session("dr-a", at(9, 0), 50)).unwrap();
        insert_therapy_session(&conn, &session("dr-a", at(14, 0), 50)).unwrap();
        insert_therapy_session(&conn, &session("dr-b", at(11, 0), 50)).unwrap();

        let filter = TherapySessionFilter {
            therapist_id: Some("dr-a".into()),
            ..Default::default()
        };
        let list = list_therapy_sessions(&conn, &filter).unwrap();
        assert_eq!(list.len(), 2);
        assert!(list[0].scheduled_at > list[1].scheduled_at);

        let filter = TherapySessionFilter {
            date_from: Some(at(10, 0)),
            ..Default::default()
        };
        assert_eq!(list_therapy_sessions(&conn, &filter).unwrap().len(), 2);
    }

    #[test]
    fn overlap_detection_respects_duration_and_status() {
        let conn = open_memory_database().unwrap();
        let morning = session("dr-a", at(9, 0), 60);
        insert_therapy_session(&conn, &morning).unwrap();
        let mut cancelled = session("dr-a", at(11, 0), 60);
        cancelled.status = SessionStatus::Cancelled;
        insert_therapy_session(&conn, &cancelled).unwrap();

        let clash = find_overlapping_sessions(&conn, "dr-a", at(9, 30), at(10, 30), None).unwrap();
        assert_eq!(clash.len(), 1);

        // Back-to-back is fine
        let adjacent = find_overlapping_sessions(&conn, "dr-a", at(10, 0), at(11, 0), None).unwrap();
        assert!(adjacent.is_empty());

        // Cancelled sessions free the slot
        let freed = find_overlapping_sessions(&conn, "dr-a", at(11, 0), at(12, 0), None).unwrap();
        assert!(freed.is_empty());

        // Rescheduling a session never clashes with itself
        let itself =
            find_overlapping_sessions(&conn, "dr-a", at(9, 15), at(10, 15), Some(&morning.id)).unwrap();
        assert!(itself.is_empty());
    }

    #[test]
    fn update_missing_session_is_not_found() {
        let conn = open_memory_database().unwrap();
        let s = session("dr-a", at(9, 0), 50);
        let err = update_therapy_session(&conn, &s).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }
}
