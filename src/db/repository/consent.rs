use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{list_from_sql, list_to_sql, opt_ts, parse_opt_ts, parse_ts, parse_uuid, ts};
use crate::db::DatabaseError;
use crate::models::enums::{ConsentStatus, ConsentType};
use crate::models::*;

const CONSENT_COLUMNS: &str = "id, patient_id, provider_id, consent_type, status, signed_at,
     expires_at, scope, notes, granted_to, granted_at, revoked_at, purpose, disclosure_scope,
     substance_use_disclosure, created_at, updated_at";

pub fn insert_consent(conn: &Connection, c: &ConsentRecord) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO consent_records (id, patient_id, provider_id, consent_type, status,
         signed_at, expires_at, scope, notes, granted_to, granted_at, revoked_at, purpose,
         disclosure_scope, substance_use_disclosure, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            c.id.to_string(),
            c.patient_id,
            c.provider_id,
            c.consent_type.as_str(),
            c.status.as_str(),
            opt_ts(&c.signed_at),
            opt_ts(&c.expires_at),
            list_to_sql(&c.scope)?,
            c.notes,
            c.granted_to,
            opt_ts(&c.granted_at),
            opt_ts(&c.revoked_at),
            c.purpose,
            list_to_sql(&c.disclosure_scope)?,
            c.substance_use_disclosure as i32,
            ts(&c.created_at),
            ts(&c.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_consent(conn: &Connection, id: &Uuid) -> Result<Option<ConsentRecord>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {CONSENT_COLUMNS} FROM consent_records WHERE id = ?1"),
            params![id.to_string()],
            consent_row_from_rusqlite,
        )
        .optional()?;
    row.map(consent_from_row).transpose()
}

/// Mark an active consent revoked. Returns false when it was not active.
pub fn mark_consent_revoked(
    conn: &Connection,
    id: &Uuid,
    revoked_at: &DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let updated = conn.execute(
        "UPDATE consent_records SET status = 'revoked', revoked_at = ?2, updated_at = ?2
         WHERE id = ?1 AND status = 'active'",
        params![id.to_string(), ts(revoked_at)],
    )?;
    Ok(updated > 0)
}

/// Newest active, unexpired consent of the given type between patient and provider.
pub fn find_valid_consent(
    conn: &Connection,
    patient_id: &str,
    provider_id: &str,
    consent_type: ConsentType,
    now: &DateTime<Utc>,
) -> Result<Option<ConsentRecord>, DatabaseError> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {CONSENT_COLUMNS} FROM consent_records
                 WHERE patient_id = ?1 AND provider_id = ?2 AND consent_type = ?3
                   AND status = 'active' AND (expires_at IS NULL OR expires_at > ?4)
                 ORDER BY granted_at DESC LIMIT 1"
            ),
            params![patient_id, provider_id, consent_type.as_str(), ts(now)],
            consent_row_from_rusqlite,
        )
        .optional()?;
    row.map(consent_from_row).transpose()
}

/// Consents for a patient, newest grant first. `active_only` narrows to status active.
pub fn list_consents_for_patient(
    conn: &Connection,
    patient_id: &str,
    active_only: bool,
) -> Result<Vec<ConsentRecord>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CONSENT_COLUMNS} FROM consent_records
         WHERE patient_id = ?1 AND (?2 = 0 OR status = 'active')
         ORDER BY granted_at DESC, created_at DESC"
    ))?;
    let rows = stmt.query_map(params![patient_id, active_only as i32], consent_row_from_rusqlite)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(consent_from_row(row?)?);
    }
    Ok(out)
}

/// Flip every active consent whose expiry has passed to expired.
pub fn expire_lapsed_consents(conn: &Connection, now: &DateTime<Utc>) -> Result<usize, DatabaseError> {
    let now = ts(now);
    let expired = conn.execute(
        "UPDATE consent_records SET status = 'expired', updated_at = ?1
         WHERE status = 'active' AND expires_at IS NOT NULL AND expires_at < ?1",
        params![now],
    )?;
    Ok(expired)
}

// Internal row type for ConsentRecord mapping
struct ConsentRow {
    id: String,
    patient_id: String,
    provider_id: String,
    consent_type: String,
    status: String,
    signed_at: Option<String>,
    expires_at: Option<String>,
    scope: String,
    notes: Option<String>,
    granted_to: Option<String>,
    granted_at: Option<String>,
    revoked_at: Option<String>,
    purpose: Option<String>,
    disclosure_scope: String,
    substance_use_disclosure: i32,
    created_at: String,
    updated_at: String,
}

fn consent_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<ConsentRow, rusqlite::Error> {
    Ok(ConsentRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        provider_id: row.get(2)?,
        consent_type: row.get(3)?,
        status: row.get(4)?,
        signed_at: row.get(5)?,
        expires_at: row.get(6)?,
        scope: row.get(7)?,
        notes: row.get(8)?,
        granted_to: row.get(9)?,
        granted_at: row.get(10)?,
        revoked_at: row.get(11)?,
        purpose: row.get(12)?,
        disclosure_scope: row.get(13)?,
        substance_use_disclosure: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

fn consent_from_row(row: ConsentRow) -> Result<ConsentRecord, DatabaseError> {
    Ok(ConsentRecord {
        id: parse_uuid(&row.id)?,
        patient_id: row.patient_id,
        provider_id: row.provider_id,
        consent_type: ConsentType::from_str(&row.consent_type)?,
        status: ConsentStatus::from_str(&row.status)?,
        signed_at: parse_opt_ts(row.signed_at)?,
        expires_at: parse_opt_ts(row.expires_at)?,
        scope: list_from_sql(&row.scope)?,
        notes: row.notes,
        granted_to: row.granted_to,
        granted_at: parse_opt_ts(row.granted_at)?,
        revoked_at: parse_opt_ts(row.revoked_at)?,
        purpose: row.purpose,
        disclosure_scope: list_from_sql(&row.disclosure_scope)?,
        substance_use_disclosure: row.substance_use_disclosure != 0,
        created_at: parse_ts(&row.created_at)?,
        updated_at: parse_ts(&row.updated_at)?,
    })
}
