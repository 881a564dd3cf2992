use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{json_from_sql, opt_ts, parse_opt_ts, parse_ts, parse_uuid, ts};
use crate::db::DatabaseError;
use crate::models::enums::{AssessmentType, SeverityLevel};
use crate::models::*;

const ASSESSMENT_COLUMNS: &str = "id, patient_id, assessed_by, assessment_type, score, severity,
     results, notes, follow_up_required, follow_up_date, created_at, updated_at";

pub fn insert_assessment(
    conn: &Connection,
    a: &MentalHealthAssessment,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO mental_health_assessments (id, patient_id, assessed_by, assessment_type,
         score, severity, results, notes, follow_up_required, follow_up_date, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            a.id.to_string(),
            a.patient_id,
            a.assessed_by,
            a.assessment_type.as_str(),
            a.score,
            a.severity.map(|s| s.as_str()),
            serde_json::to_string(&a.results)?,
            a.notes,
            a.follow_up_required as i32,
            opt_ts(&a.follow_up_date),
            ts(&a.created_at),
            ts(&a.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_assessment(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<MentalHealthAssessment>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {ASSESSMENT_COLUMNS} FROM mental_health_assessments WHERE id = ?1"),
            params![id.to_string()],
            assessment_row_from_rusqlite,
        )
        .optional()?;
    row.map(assessment_from_row).transpose()
}

/// A patient's assessments, newest first, optionally narrowed to one instrument.
pub fn list_assessments_for_patient(
    conn: &Connection,
    patient_id: &str,
    assessment_type: Option<AssessmentType>,
) -> Result<Vec<MentalHealthAssessment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ASSESSMENT_COLUMNS} FROM mental_health_assessments
         WHERE patient_id = ?1 AND (?2 IS NULL OR assessment_type = ?2)
         ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(
        params![patient_id, assessment_type.map(|t| t.as_str())],
        assessment_row_from_rusqlite,
    )?;

    let mut out = Vec::new();
    for row in rows {
        out.push(assessment_from_row(row?)?);
    }
    Ok(out)
}

// Internal row type for MentalHealthAssessment mapping
struct AssessmentRow {
    id: String,
    patient_id: String,
    assessed_by: String,
    assessment_type: String,
    score: Option<i32>,
    severity: Option<String>,
    results: String,
    notes: Option<String>,
    follow_up_required: i32,
    follow_up_date: Option<String>,
    created_at: String,
    updated_at: String,
}

fn assessment_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<AssessmentRow, rusqlite::Error> {
    Ok(AssessmentRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        assessed_by: row.get(2)?,
        assessment_type: row.get(3)?,
        score: row.get(4)?,
        severity: row.get(5)?,
        results: row.get(6)?,
        notes: row.get(7)?,
        follow_up_required: row.get(8)?,
        follow_up_date: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn assessment_from_row(row: AssessmentRow) -> Result<MentalHealthAssessment, DatabaseError> {
    Ok(MentalHealthAssessment {
        id: parse_uuid(&row.id)?,
        patient_id: row.patient_id,
        assessed_by: row.assessed_by,
        assessment_type: AssessmentType::from_str(&row.assessment_type)?,
        score: row.score,
        severity: row.severity.as_deref().map(SeverityLevel::from_str).transpose()?,
        results: json_from_sql(&row.results)?,
        notes: row.notes,
        follow_up_required: row.follow_up_required != 0,
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

    fn assessment(patient: &str, kind: AssessmentType, minutes_ago: i64) -> MentalHealthAssessment {
        let at = Utc::now() - Duration::minutes(minutes_ago);
        MentalHealthAssessment {
            id: Uuid::new_v4(),
            patient_id: patient.into(),
            assessed_by: "dr-a".into(),
            assessment_type: kind,
            score: Some(12),
            severity: Some(SeverityLevel::Moderate),
            results: serde_json::json!({"responses": {"phq9_1": 2}}),
            notes: None,
            follow_up_required: true,
            follow_up_date: Some(at + Duration::days(14)),
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn results_payload_survives_storage() {
        let conn = open_memory_database().unwrap();
        let a = assessment("p1", AssessmentType::Phq9, 0);
        insert_assessment(&conn, &a).unwrap();
        let loaded = get_assessment(&conn, &a.id).unwrap().unwrap();
        assert_eq!(loaded.results["responses"]["phq9_1"], 2);
        assert_eq!(loaded.severity, Some(SeverityLevel::Moderate));
        assert!(loaded.follow_up_required);
    }

    #[test]
    fn list_by_type_newest_first() {
        let conn = open_memory_database().unwrap();
        insert_assessment(&conn, &assessment("p1", AssessmentType::Phq9, 60)).unwrap();
        insert_assessment(&conn, &assessment("p1", AssessmentType::Phq9, 5)).unwrap();
        insert_assessment(&conn, &assessment("p1", AssessmentType::Gad7, 1)).unwrap();
        insert_assessment(&conn, &assessment("p2", AssessmentType::Phq9, 1)).unwrap();

        let all = list_assessments_for_patient(&conn, "p1", None).unwrap();
        assert_eq!(all.len(), 3);
        let phq = list_assessments_for_patient(&conn, "p1", Some(AssessmentType::Phq9)).unwrap();
        assert_eq!(phq.len(), 2);
        assert!(phq[0].created_at > phq[1].created_at);
    }
}
