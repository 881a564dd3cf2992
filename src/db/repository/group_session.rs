use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{json_from_sql, list_from_sql, list_to_sql, opt_ts, parse_opt_ts, parse_ts, parse_uuid, ts};
use crate::db::DatabaseError;
use crate::models::enums::{GroupSessionType, SessionStatus};
use crate::models::*;

const GROUP_SESSION_COLUMNS: &str = "gs.id, gs.name, gs.description, gs.facilitator_id,
     gs.session_type, gs.status, gs.scheduled_at, gs.session_date, gs.duration, gs.modality,
     gs.max_participants, gs.topic, gs.notes, gs.homework, gs.next_session_date,
     gs.actual_start_time, gs.actual_end_time, gs.objectives, gs.materials, gs.group_id,
     gs.created_at, gs.updated_at";

pub fn insert_group_session(conn: &Connection, s: &GroupSession) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO group_sessions (id, name, description, facilitator_id, session_type, status,
         scheduled_at, session_date, duration, modality, max_participants, topic, notes, homework,
         next_session_date, actual_start_time, actual_end_time, objectives, materials, group_id,
         created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                 ?18, ?19, ?20, ?21, ?22)",
        params![
            s.id.to_string(),
            s.name,
            s.description,
            s.facilitator_id,
            s.session_type.as_str(),
            s.status.as_str(),
            ts(&s.scheduled_at),
            opt_ts(&s.session_date),
            s.duration,
            s.modality,
            s.max_participants,
            s.topic,
            s.notes,
            s.homework,
            opt_ts(&s.next_session_date),
            opt_ts(&s.actual_start_time),
            opt_ts(&s.actual_end_time),
            list_to_sql(&s.objectives)?,
            s.materials.as_ref().map(serde_json::to_string).transpose()?,
            s.group_id.map(|id| id.to_string()),
            ts(&s.created_at),
            ts(&s.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_group_session(conn: &Connection, id: &Uuid) -> Result<Option<GroupSession>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {GROUP_SESSION_COLUMNS} FROM group_sessions gs WHERE gs.id = ?1"),
            params![id.to_string()],
            group_session_row_from_rusqlite,
        )
        .optional()?;
    row.map(group_session_from_row).transpose()
}

pub fn update_group_session(conn: &Connection, s: &GroupSession) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE group_sessions SET name = ?2, description = ?3, session_type = ?4, status = ?5,
         scheduled_at = ?6, session_date = ?7, duration = ?8, modality = ?9,
         max_participants = ?10, topic = ?11, notes = ?12, homework = ?13,
         next_session_date = ?14, actual_start_time = ?15, actual_end_time = ?16,
         objectives = ?17, materials = ?18, updated_at = ?19
         WHERE id = ?1",
        params![
            s.id.to_string(),
            s.name,
            s.description,
            s.session_type.as_str(),
            s.status.as_str(),
            ts(&s.scheduled_at),
            opt_ts(&s.session_date),
            s.duration,
            s.modality,
            s.max_participants,
            s.topic,
            s.notes,
            s.homework,
            opt_ts(&s.next_session_date),
            opt_ts(&s.actual_start_time),
            opt_ts(&s.actual_end_time),
            list_to_sql(&s.objectives)?,
            s.materials.as_ref().map(serde_json::to_string).transpose()?,
            ts(&s.updated_at),
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::not_found("GroupSession", s.id));
    }
    Ok(())
}

/// Group sessions matching the filter, most recent first.
pub fn list_group_sessions(
    conn: &Connection,
    filter: &GroupSessionFilter,
) -> Result<Vec<GroupSession>, DatabaseError> {
    let mut sql = format!("SELECT {GROUP_SESSION_COLUMNS} FROM group_sessions gs WHERE 1=1");
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(ref group_id) = filter.group_id {
        params_vec.push(Box::new(group_id.to_string()));
        sql.push_str(&format!(" AND gs.group_id = ?{}", params_vec.len()));
    }
    if let Some(ref facilitator_id) = filter.facilitator_id {
        params_vec.push(Box::new(facilitator_id.clone()));
        sql.push_str(&format!(" AND gs.facilitator_id = ?{}", params_vec.len()));
    }
    if let Some(status) = filter.status {
        params_vec.push(Box::new(status.as_str()));
        sql.push_str(&format!(" AND gs.status = ?{}", params_vec.len()));
    }
    if let Some(ref from) = filter.date_from {
        params_vec.push(Box::new(ts(from)));
        sql.push_str(&format!(" AND gs.scheduled_at >= ?{}", params_vec.len()));
    }
    if let Some(ref to) = filter.date_to {
        params_vec.push(Box::new(ts(to)));
        sql.push_str(&format!(" AND gs.scheduled_at <= ?{}", params_vec.len()));
    }
    sql.push_str(" ORDER BY gs.scheduled_at DESC");

    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    query_group_sessions(conn, &sql, param_refs.as_slice())
}

/// Sessions of every group the patient actively belongs to, most recent first.
pub fn group_sessions_for_member(
    conn: &Connection,
    patient_id: &str,
) -> Result<Vec<GroupSession>, DatabaseError> {
    let sql = format!(
        "SELECT {GROUP_SESSION_COLUMNS} FROM group_sessions gs
         JOIN support_group_members m ON m.group_id = gs.group_id
         WHERE m.patient_id = ?1 AND m.status = 'active'
         ORDER BY gs.scheduled_at DESC"
    );
    query_group_sessions(conn, &sql, &[&patient_id])
}

fn query_group_sessions(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::types::ToSql],
) -> Result<Vec<GroupSession>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, group_session_row_from_rusqlite)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(group_session_from_row(row?)?);
    }
    Ok(out)
}

// ═══════════════════════════════════════════
// Attendance
// ═══════════════════════════════════════════

/// Insert or update the attendance row for (session, patient).
pub fn upsert_attendee(conn: &Connection, a: &GroupSessionAttendee) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO group_session_attendees (id, session_id, patient_id, attended, notes,
         participation, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT (session_id, patient_id) DO UPDATE SET
             attended = excluded.attended,
             notes = excluded.notes,
             participation = excluded.participation",
        params![
            a.id.to_string(),
            a.session_id.to_string(),
            a.patient_id,
            a.attended as i32,
            a.notes,
            a.participation,
            ts(&a.created_at),
        ],
    )?;
    Ok(())
}

pub fn attendees_for_session(
    conn: &Connection,
    session_id: &Uuid,
) -> Result<Vec<GroupSessionAttendee>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, session_id, patient_id, attended, notes, participation, created_at
         FROM group_session_attendees WHERE session_id = ?1 ORDER BY created_at ASC",
    )?;
    let rows = stmt.query_map(params![session_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, i32>(3)?,
            row.get::<_, Option<String>>(4)?,
            row.get::<_, Option<String>>(5)?,
            row.get::<_, String>(6)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (id, session_id, patient_id, attended, notes, participation, created_at) = row?;
        out.push(GroupSessionAttendee {
            id: parse_uuid(&id)?,
            session_id: parse_uuid(&session_id)?,
            patient_id,
            attended: attended != 0,
            notes,
            participation,
            created_at: parse_ts(&created_at)?,
        });
    }
    Ok(out)
}

// Internal row type for GroupSession mapping
struct GroupSessionRow {
    id: String,
    name: String,
    description: Option<String>,
    facilitator_id: String,
    session_type: String,
    status: String,
    scheduled_at: String,
    session_date: Option<String>,
    duration: i32,
    modality: Option<String>,
    max_participants: i32,
    topic: Option<String>,
    notes: Option<String>,
    homework: Option<String>,
    next_session_date: Option<String>,
    actual_start_time: Option<String>,
    actual_end_time: Option<String>,
    objectives: String,
    materials: Option<String>,
    group_id: Option<String>,
    created_at: String,
    updated_at: String,
}

fn group_session_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<GroupSessionRow, rusqlite::Error> {
    Ok(GroupSessionRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        facilitator_id: row.get(3)?,
        session_type: row.get(4)?,
        status: row.get(5)?,
        scheduled_at: row.get(6)?,
        session_date: row.get(7)?,
        duration: row.get(8)?,
        modality: row.get(9)?,
        max_participants: row.get(10)?,
        topic: row.get(11)?,
        notes: row.get(12)?,
        homework: row.get(13)?,
        next_session_date: row.get(14)?,
        actual_start_time: row.get(15)?,
        actual_end_time: row.get(16)?,
        objectives: row.get(17)?,
        materials: row.get(18)?,
        group_id: row.get(19)?,
        created_at: row.get(20)?,
        updated_at: row.get(21)?,
    })
}

fn group_session_from_row(row: GroupSessionRow) -> Result<GroupSession, DatabaseError> {
    Ok(GroupSession {
        id: parse_uuid(&row.id)?,
        name: row.name,
        description: row.description,
        facilitator_id: row.facilitator_id,
        session_type: GroupSessionType::from_str(&row.session_type)?,
        status: SessionStatus::from_str(&row.status)?,
        scheduled_at: parse_ts(&row.scheduled_at)?,
        session_date: parse_opt_ts(row.session_date)?,
        duration: row.duration,
        modality: row.modality,
        max_participants: row.max_participants,
        topic: row.topic,
        notes: row.notes,
        homework: row.homework,
        next_session_date: parse_opt_ts(row.next_session_date)?,
        actual_start_time: parse_opt_ts(row.actual_start_time)?,
        actual_end_time: parse_opt_ts(row.actual_end_time)?,
        objectives: list_from_sql(&row.objectives)?,
        materials: row.materials.as_deref().map(json_from_sql).transpose()?,
        group_id: row.group_id.as_deref().map(parse_uuid).transpose()?,
        created_at: parse_ts(&row.created_at)?,
        updated_at: parse_ts(&row.updated_at)?,
    })
}
