use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{list_from_sql, list_to_sql, opt_ts, parse_opt_ts, parse_ts, parse_uuid, ts};
use crate::db::DatabaseError;
use crate::models::enums::{CrisisSeverity, CrisisStatus, CrisisType};
use crate::models::*;

const CRISIS_COLUMNS: &str = "id, patient_id, responder_id, crisis_type, severity, status,
     description, interventions, outcome, referred_to, contacted_at, resolved_at,
     follow_up_needed, follow_up_date, created_at, updated_at";

pub fn insert_crisis(conn: &Connection, c: &CrisisIntervention) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO crisis_interventions (id, patient_id, responder_id, crisis_type, severity,
         status, description, interventions, outcome, referred_to, contacted_at, resolved_at,
         follow_up_needed, follow_up_date, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            c.id.to_string(),
            c.patient_id,
            c.responder_id,
            c.crisis_type.as_str(),
            c.severity.as_str(),
            c.status.as_str(),
            c.description,
            list_to_sql(&c.interventions)?,
            c.outcome,
            c.referred_to,
            ts(&c.contacted_at),
            opt_ts(&c.resolved_at),
            c.follow_up_needed as i32,
            opt_ts(&c.follow_up_date),
            ts(&c.created_at),
            ts(&c.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_crisis(conn: &Connection, id: &Uuid) -> Result<Option<CrisisIntervention>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {CRISIS_COLUMNS} FROM crisis_interventions WHERE id = ?1"),
            params![id.to_string()],
            crisis_row_from_rusqlite,
        )
        .optional()?;
    row.map(crisis_from_row).transpose()
}

pub fn update_crisis(conn: &Connection, c: &CrisisIntervention) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE crisis_interventions SET responder_id = ?2, severity = ?3, status = ?4,
         interventions = ?5, outcome = ?6, referred_to = ?7, resolved_at = ?8,
         follow_up_needed = ?9, follow_up_date = ?10, updated_at = ?11
         WHERE id = ?1",
        params![
            c.id.to_string(),
            c.responder_id,
            c.severity.as_str(),
            c.status.as_str(),
            list_to_sql(&c.interventions)?,
            c.outcome,
            c.referred_to,
            opt_ts(&c.resolved_at),
            c.follow_up_needed as i32,
            opt_ts(&c.follow_up_date),
            ts(&c.updated_at),
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::not_found("CrisisIntervention", c.id));
    }
    Ok(())
}

/// Crises still needing attention: active, monitoring or escalated.
pub fn list_open_crises(conn: &Connection) -> Result<Vec<CrisisIntervention>, DatabaseError> {
    query_crises(
        conn,
        &format!(
            "SELECT {CRISIS_COLUMNS} FROM crisis_interventions
             WHERE status IN ('active', 'monitoring', 'escalated')
             ORDER BY contacted_at ASC"
        ),
        &[],
    )
}

/// Crises matching the filter, most recent contact first.
pub fn list_crises(
    conn: &Connection,
    filter: &CrisisFilter,
) -> Result<Vec<CrisisIntervention>, DatabaseError> {
    let mut sql = format!("SELECT {CRISIS_COLUMNS} FROM crisis_interventions WHERE 1=1");
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(ref patient_id) = filter.patient_id {
        params_vec.push(Box::new(patient_id.clone()));
        sql.push_str(&format!(" AND patient_id = ?{}", params_vec.len()));
    }
    if let Some(ref responder_id) = filter.responder_id {
        params_vec.push(Box::new(responder_id.clone()));
        sql.push_str(&format!(" AND responder_id = ?{}", params_vec.len()));
    }
    if let Some(status) = filter.status {
        params_vec.push(Box::new(status.as_str()));
        sql.push_str(&format!(" AND status = ?{}", params_vec.len()));
    }
    if let Some(severity) = filter.severity {
        params_vec.push(Box::new(severity.as_str()));
        sql.push_str(&format!(" AND severity = ?{}", params_vec.len()));
    }
    sql.push_str(" ORDER BY contacted_at DESC");

    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    query_crises(conn, &sql, param_refs.as_slice())
}

fn query_crises(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::types::ToSql],
) -> Result<Vec<CrisisIntervention>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, crisis_row_from_rusqlite)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(crisis_from_row(row?)?);
    }
    Ok(out)
}

// Internal row type for CrisisIntervention mapping
struct CrisisRow {
    id: String,
    patient_id: String,
    responder_id: Option<String>,
    crisis_type: String,
    severity: String,
    status: String,
    description: String,
    interventions: String,
    outcome: Option<String>,
    referred_to: Option<String>,
    contacted_at: String,
    resolved_at: Option<String>,
    follow_up_needed: i32,
    follow_up_date: Option<String>,
    created_at: String,
    updated_at: String,
}

fn crisis_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<CrisisRow, rusqlite::Error> {
    Ok(CrisisRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        responder_id: row.get(2)?,
        crisis_type: row.get(3)?,
        severity: row.get(4)?,
        status: row.get(5)?,
        description: row.get(6)?,
        interventions: row.get(7)?,
        outcome: row.get(8)?,
        referred_to: row.get(9)?,
        contacted_at: row.get(10)?,
        resolved_at: row.get(11)?,
        follow_up_needed: row.get(12)?,
        follow_up_date: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

fn crisis_from_row(row: CrisisRow) -> Result<CrisisIntervention, DatabaseError> {
    Ok(CrisisIntervention {
        id: parse_uuid(&row.id)?,
        patient_id: row.patient_id,
        responder_id: row.responder_id,
        crisis_type: CrisisType::from_str(&row.crisis_type)?,
        severity: CrisisSeverity::from_str(&row.severity)?,
        status: CrisisStatus::from_str(&row.status)?,
        description: row.description,
        interventions: list_from_sql(&row.interventions)?,
        outcome: row.outcome,
        referred_to: row.referred_to,
        contacted_at: parse_ts(&row.contacted_at)?,
        resolved_at: parse_opt_ts(row.resolved_at)?,
        follow_up_needed: row.follow_up_needed != 0,
        follow_up_date: parse_opt_ts(row.follow_up_date)?,
        created_at: parse_ts(&row.created_at)?,
        updated_at: parse_ts(&row.updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use chrono::{Duration, Utc};

    fn crisis(patient: &str, severity: CrisisSeverity, minutes_ago: i64) -> CrisisIntervention {
        let at = Utc::now() - Duration::minutes(minutes_ago);
        CrisisIntervention {
            id: Uuid::new_v4(),
            patient_id: patient.into(),
            responder_id: None,
            crisis_type: CrisisType::PanicAttack,
            severity,
            status: CrisisStatus::Active,
            description: "Hyperventilating, chest tightness".into(),
            interventions: vec![],
            outcome: None,
            referred_to: None,
            contacted_at: at,
            resolved_at: None,
            follow_up_needed: true,
            follow_up_date: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn open_crises_exclude_resolved() {
        let conn = open_memory_database().unwrap();
        let mut resolved = crisis("p1", CrisisSeverity::Low, 30);
        insert_crisis(&conn, &resolved).unwrap();
        insert_crisis(&conn, &crisis("p2", CrisisSeverity::High, 10)).unwrap();

        resolved.status = CrisisStatus::Resolved;
        resolved.resolved_at = Some(Utc::now());
        update_crisis(&conn, &resolved).unwrap();

        let open = list_open_crises(&conn).unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].patient_id, "p2");
    }

    #[test]
    fn filter_by_patient_and_severity() {
        let conn = open_memory_database().unwrap();
        insert_crisis(&conn, &crisis("p1", CrisisSeverity::Critical, 5)).unwrap();
        insert_crisis(&conn, &crisis("p1", CrisisSeverity::Low, 50)).unwrap();
        insert_crisis(&conn, &crisis("p2", CrisisSeverity::Critical, 1)).unwrap();

        let filter = CrisisFilter {
            patient_id: Some("p1".into()),
            severity: Some(CrisisSeverity::Critical),
            ..Default::default()
        };
        let found = list_crises(&conn, &filter).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].severity, CrisisSeverity::Critical);

        let all_p1 = list_crises(
            &conn,
            &CrisisFilter { patient_id: Some("p1".into()), ..Default::default() },
        )
        .unwrap();
        assert_eq!(all_p1.len(), 2);
        assert!(all_p1[0].contacted_at > all_p1[1].contacted_at);
    }

    #[test]
    fn resolved_without_timestamp_violates_schema() {
        let conn = open_memory_database().unwrap();
        let mut c = crisis("p1", CrisisSeverity::Medium, 1);
        insert_crisis(&conn, &c).unwrap();
        c.status = CrisisStatus::Resolved;
        assert!(update_crisis(&conn, &c).is_err());
    }
}
