use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{list_from_sql, list_to_sql, opt_ts, parse_opt_ts, parse_ts, parse_uuid, ts};
use crate::db::DatabaseError;
use crate::models::enums::NoteType;
use crate::models::*;

const NOTE_COLUMNS: &str = "id, patient_id, provider_id, session_id, note_type, content,
     diagnosis, interventions, plan, is_signed, signed_at, created_at, updated_at";

pub fn insert_progress_note(conn: &Connection, n: &ProgressNote) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO progress_notes (id, patient_id, provider_id, session_id, note_type, content,
         diagnosis, interventions, plan, is_signed, signed_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            n.id.to_string(),
            n.patient_id,
            n.provider_id,
            n.session_id.map(|id| id.to_string()),
            n.note_type.as_str(),
            n.content,
            list_to_sql(&n.diagnosis)?,
            list_to_sql(&n.interventions)?,
            n.plan,
            n.is_signed as i32,
            opt_ts(&n.signed_at),
            ts(&n.created_at),
            ts(&n.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_progress_note(conn: &Connection, id: &Uuid) -> Result<Option<ProgressNote>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {NOTE_COLUMNS} FROM progress_notes WHERE id = ?1"),
            params![id.to_string()],
            note_row_from_rusqlite,
        )
        .optional()?;
    row.map(note_from_row).transpose()
}

/// Write content and signature columns. The schema trigger rejects writes to signed notes.
pub fn update_progress_note(conn: &Connection, n: &ProgressNote) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE progress_notes SET note_type = ?2, content = ?3, diagnosis = ?4,
         interventions = ?5, plan = ?6, is_signed = ?7, signed_at = ?8, updated_at = ?9
         WHERE id = ?1",
        params![
            n.id.to_string(),
            n.note_type.as_str(),
            n.content,
            list_to_sql(&n.diagnosis)?,
            list_to_sql(&n.interventions)?,
            n.plan,
            n.is_signed as i32,
            opt_ts(&n.signed_at),
            ts(&n.updated_at),
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::not_found("ProgressNote", n.id));
    }
    Ok(())
}

pub fn list_progress_notes_for_patient(
    conn: &Connection,
    patient_id: &str,
) -> Result<Vec<ProgressNote>, DatabaseError> {
    query_notes(
        conn,
        &format!("SELECT {NOTE_COLUMNS} FROM progress_notes WHERE patient_id = ?1 ORDER BY created_at DESC"),
        &[&patient_id],
    )
}

pub fn list_progress_notes_for_session(
    conn: &Connection,
    session_id: &Uuid,
) -> Result<Vec<ProgressNote>, DatabaseError> {
    let session_id = session_id.to_string();
    query_notes(
        conn,
        &format!("SELECT {NOTE_COLUMNS} FROM progress_notes WHERE session_id = ?1 ORDER BY created_at DESC"),
        &[&session_id],
    )
}

fn query_notes(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::types::ToSql],
) -> Result<Vec<ProgressNote>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, note_row_from_rusqlite)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(note_from_row(row?)?);
    }
    Ok(out)
}

// Internal row type for ProgressNote mapping
struct NoteRow {
    id: String,
    patient_id: String,
    provider_id: String,
    session_id: Option<String>,
    note_type: String,
    content: String,
    diagnosis: String,
    interventions: String,
    plan: Option<String>,
    is_signed: i32,
    signed_at: Option<String>,
    created_at: String,
    updated_at: String,
}

fn note_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<NoteRow, rusqlite::Error> {
    Ok(NoteRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        provider_id: row.get(2)?,
        session_id: row.get(3)?,
        note_type: row.get(4)?,
        content: row.get(5)?,
        diagnosis: row.get(6)?,
        interventions: row.get(7)?,
        plan: row.get(8)?,
        is_signed: row.get(9)?,
        signed_at: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn note_from_row(row: NoteRow) -> Result<ProgressNote, DatabaseError> {
    Ok(ProgressNote {
        id: parse_uuid(&row.id)?,
        patient_id: row.patient_id,
        provider_id: row.provider_id,
        session_id: row.session_id.as_deref().map(parse_uuid).transpose()?,
        note_type: NoteType::from_str(&row.note_type)?,
        content: row.content,
        diagnosis: list_from_sql(&row.diagnosis)?,
        interventions: list_from_sql(&row.interventions)?,
        plan: row.plan,
        is_signed: row.is_signed != 0,
        signed_at: parse_opt_ts(row.signed_at)?,
        created_at: parse_ts(&row.created_at)?,
        updated_at: parse_ts(&row.updated_at)?,
    })
}
