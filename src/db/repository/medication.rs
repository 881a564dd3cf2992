use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{list_from_sql, list_to_sql, opt_ts, parse_opt_ts, parse_ts, parse_uuid, ts};
use crate::db::DatabaseError;
use crate::models::enums::{MedicationClass, MedicationStatus};
use crate::models::*;

const MEDICATION_COLUMNS: &str = "id, patient_id, prescriber_id, name, dosage, frequency,
     medication_class, status, start_date, end_date, reason, side_effects, interactions, notes,
     created_at, updated_at";

pub fn insert_psych_medication(conn: &Connection, med: &PsychMedication) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO psych_medications (id, patient_id, prescriber_id, name, dosage, frequency,
         medication_class, status, start_date, end_date, reason, side_effects, interactions,
         notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            med.id.to_string(),
            med.patient_id,
            med.prescriber_id,
            med.name,
            med.dosage,
            med.frequency,
            med.medication_class.as_str(),
            med.status.as_str(),
            ts(&med.start_date),
            opt_ts(&med.end_date),
            med.reason,
            list_to_sql(&med.side_effects)?,
            list_to_sql(&med.interactions)?,
            med.notes,
            ts(&med.created_at),
            ts(&med.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_psych_medication(conn: &Connection, id: &Uuid) -> Result<Option<PsychMedication>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {MEDICATION_COLUMNS} FROM psych_medications WHERE id = ?1"),
            params![id.to_string()],
            medication_row_from_rusqlite,
        )
        .optional()?;
    row.map(medication_from_row).transpose()
}

pub fn update_psych_medication(conn: &Connection, med: &PsychMedication) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE psych_medications SET dosage = ?2, frequency = ?3, status = ?4, end_date = ?5,
         reason = ?6, side_effects = ?7, interactions = ?8, notes = ?9, updated_at = ?10
         WHERE id = ?1",
        params![
            med.id.to_string(),
            med.dosage,
            med.frequency,
            med.status.as_str(),
            opt_ts(&med.end_date),
            med.reason,
            list_to_sql(&med.side_effects)?,
            list_to_sql(&med.interactions)?,
            med.notes,
            ts(&med.updated_at),
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::not_found("PsychMedication", med.id));
    }
    Ok(())
}

/// Medications matching the filter, newest start date first.
pub fn list_psych_medications(
    conn: &Connection,
    filter: &MedicationFilter,
) -> Result<Vec<PsychMedication>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MEDICATION_COLUMNS} FROM psych_medications
         WHERE (?1 IS NULL OR patient_id = ?1) AND (?2 IS NULL OR status = ?2)
         ORDER BY start_date DESC"
    ))?;
    let rows = stmt.query_map(
        params![filter.patient_id, filter.status.map(|s| s.as_str())],
        medication_row_from_rusqlite,
    )?;

    let mut meds = Vec::new();
    for row in rows {
        meds.push(medication_from_row(row?)?);
    }
    Ok(meds)
}

// Internal row type for PsychMedication mapping
struct MedicationRow {
    id: String,
    patient_id: String,
    prescriber_id: String,
    name: String,
    dosage: String,
    frequency: String,
    medication_class: String,
    status: String,
    start_date: String,
    end_date: Option<String>,
    reason: Option<String>,
    side_effects: String,
    interactions: String,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
}

fn medication_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<MedicationRow, rusqlite::Error> {
    Ok(MedicationRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        prescriber_id: row.get(2)?,
        name: row.get(3)?,
        dosage: row.get(4)?,
        frequency: row.get(5)?,
        medication_class: row.get(6)?,
        status: row.get(7)?,
        start_date: row.get(8)?,
        end_date: row.get(9)?,
        reason: row.get(10)?,
        side_effects: row.get(11)?,
        interactions: row.get(12)?,
        notes: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

fn medication_from_row(row: MedicationRow) -> Result<PsychMedication, DatabaseError> {
    Ok(PsychMedication {
        id: parse_uuid(&row.id)?,
        patient_id: row.patient_id,
        prescriber_id: row.prescriber_id,
        name: row.name,
        dosage: row.dosage,
        frequency: row.frequency,
        medication_class: MedicationClass::from_str(&row.medication_class)?,
        status: MedicationStatus::from_str(&row.status)?,
        start_date: parse_ts(&row.start_date)?,
        end_date: parse_opt_ts(row.end_date)?,
        reason: row.reason,
        side_effects: list_from_sql(&row.side_effects)?,
        interactions: list_from_sql(&row.interactions)?,
        notes: row.notes,
        created_at: parse_ts(&row.created_at)?,
        updated_at: parse_ts(&row.updated_at)?,
    })
}
