use rusqlite::{params, Connection};

use super::{list_from_sql, list_to_sql, parse_ts, parse_uuid, ts};
use crate::db::DatabaseError;
use crate::models::*;

/// Mood logs are append-only.
pub fn insert_mood_log(conn: &Connection, m: &MoodLog) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO mood_logs (id, patient_id, mood_rating, notes, triggers, activities,
         log_date, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            m.id.to_string(),
            m.patient_id,
            m.mood_rating,
            m.notes,
            list_to_sql(&m.triggers)?,
            list_to_sql(&m.activities)?,
            ts(&m.log_date),
            ts(&m.created_at),
        ],
    )?;
    Ok(())
}

/// A patient's mood entries within the filter window, newest first.
pub fn list_mood_logs(
    conn: &Connection,
    patient_id: &str,
    filter: &MoodFilter,
) -> Result<Vec<MoodLog>, DatabaseError> {
    let mut sql = String::from(
        "SELECT id, patient_id, mood_rating, notes, triggers, activities, log_date, created_at
         FROM mood_logs WHERE patient_id = ?1",
    );
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(patient_id.to_string())];

    if let Some(ref from) = filter.date_from {
        params_vec.push(Box::new(ts(from)));
        sql.push_str(&format!(" AND log_date >= ?{}", params_vec.len()));
    }
    if let Some(ref to) = filter.date_to {
        params_vec.push(Box::new(ts(to)));
        sql.push_str(&format!(" AND log_date <= ?{}", params_vec.len()));
    }
    sql.push_str(" ORDER BY log_date DESC");
    if let Some(limit) = filter.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(param_refs.as_slice(), |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i32>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, String>(6)?,
            row.get::<_, String>(7)?,
        ))
    })?;

    let mut logs = Vec::new();
    for row in rows {
        let (id, patient_id, mood_rating, notes, triggers, activities, log_date, created_at) = row?;
        logs.push(MoodLog {
            id: parse_uuid(&id)?,
            patient_id,
            mood_rating,
            notes,
            triggers: list_from_sql(&triggers)?,
            activities: list_from_sql(&activities)?,
            log_date: parse_ts(&log_date)?,
            created_at: parse_ts(&created_at)?,
        });
    }
    Ok(logs)
}
