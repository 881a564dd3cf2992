//! Assessment intake: score raw responses, derive follow-up, store.

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::config::{MODERATE_FOLLOW_UP_DAYS, URGENT_FOLLOW_UP_DAYS};
use crate::db::repository;
use crate::error::ServiceError;
use crate::models::enums::{AssessmentType, SeverityLevel};
use crate::models::MentalHealthAssessment;
use crate::scoring::{self, Responses};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAssessment {
    #[serde(default)]
    pub patient_id: String,
    pub assessment_type: AssessmentType,
    pub responses: Responses,
    pub notes: Option<String>,
}

/// When the next follow-up falls due, if one is needed at all.
pub fn follow_up_due(
    severity: SeverityLevel,
    suicidal_ideation: bool,
    assessed_at: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if suicidal_ideation || severity.rank() >= SeverityLevel::ModeratelySevere.rank() {
        Some(assessed_at + Duration::days(URGENT_FOLLOW_UP_DAYS))
    } else if severity == SeverityLevel::Moderate {
        Some(assessed_at + Duration::days(MODERATE_FOLLOW_UP_DAYS))
    } else {
        None
    }
}

/// Score and persist a completed instrument. Score and severity are
/// always derived here; callers never supply them.
pub fn submit_assessment(
    conn: &Connection,
    assessed_by: &str,
    input: NewAssessment,
    now: DateTime<Utc>,
) -> Result<MentalHealthAssessment, ServiceError> {
    if input.patient_id.trim().is_empty() {
        return Err(ServiceError::validation("patientId is required"));
    }

    scoring::validate_responses(input.assessment_type, &input.responses)
        .map_err(ServiceError::Validation)?;

    let result = scoring::score(input.assessment_type, &input.responses);
    let suicidal_ideation = input.assessment_type == AssessmentType::Phq9
        && scoring::phq9_suicidal_ideation(&input.responses);
    let follow_up_date = follow_up_due(result.severity, suicidal_ideation, now);

    let mut results = json!({
        "responses": input.responses,
        "interpretation": result.interpretation,
        "recommendations": result.recommendations,
    });
    if let Some(subscores) = &result.subscores {
        results["subscores"] = json!(subscores);
    }

    let assessment = MentalHealthAssessment {
        id: Uuid::new_v4(),
        patient_id: input.patient_id,
        assessed_by: assessed_by.to_string(),
        assessment_type: input.assessment_type,
        score: Some(result.total_score),
        severity: Some(result.severity),
        results,
        notes: input.notes,
        follow_up_required: follow_up_date.is_some(),
        follow_up_date,
        created_at: now,
        updated_at: now,
    };
    repository::insert_assessment(conn, &assessment)?;

    if suicidal_ideation {
        tracing::warn!(assessment_id = %assessment.id, "PHQ-9 item 9 positive");
    }
    tracing::info!(
        assessment_id = %assessment.id,
        kind = %assessment.assessment_type,
        severity = %result.severity,
        "Assessment recorded"
    );
    Ok(assessment)
}

pub fn get_assessment(conn: &Connection, id: &Uuid) -> Result<MentalHealthAssessment, ServiceError> {
    repository::get_assessment(conn, id)?.ok_or_else(|| ServiceError::not_found("Assessment", id))
}

pub fn patient_assessments(
    conn: &Connection,
    patient_id: &str,
    kind: Option<AssessmentType>,
) -> Result<Vec<MentalHealthAssessment>, ServiceError> {
    Ok(repository::list_assessments_for_patient(conn, patient_id, kind)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use serde_json::Value;

    fn phq9(values: [i64; 9]) -> Responses {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| (format!("phq9_{}", i + 1), json!(v)))
            .collect()
    }

    fn submit(conn: &Connection, kind: AssessmentType, responses: Responses) -> MentalHealthAssessment {
        submit_assessment(
            conn,
            "dr-a",
            NewAssessment {
                patient_id: "p1".into(),
                assessment_type: kind,
                responses,
                notes: None,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn stored_severity_matches_scoring() {
        let conn = open_memory_database().unwrap();
        let a = submit(&conn, AssessmentType::Phq9, phq9([2, 2, 2, 2, 2, 1, 1, 0, 0]));
        assert_eq!(a.score, Some(12));
        assert_eq!(a.severity, Some(SeverityLevel::Moderate));
        assert!(a.follow_up_required);
        let due = a.follow_up_date.unwrap() - a.created_at;
        assert_eq!(due.num_days(), 14);

        let stored = get_assessment(&conn, &a.id).unwrap();
        assert_eq!(stored.results["interpretation"], "Moderate depression");
        assert_eq!(stored.results["responses"]["phq9_1"], 2);
    }

    #[test]
    fn item_nine_forces_urgent_follow_up_even_when_mild() {
        let conn = open_memory_database().unwrap();
        let a = submit(&conn, AssessmentType::Phq9, phq9([1, 1, 0, 0, 0, 0, 0, 0, 1]));
        assert_eq!(a.severity, Some(SeverityLevel::None));
        assert!(a.follow_up_required);
        assert_eq!((a.follow_up_date.unwrap() - a.created_at).num_days(), 7);
        let recs = a.results["recommendations"].as_array().unwrap();
        assert!(recs[0].as_str().unwrap().starts_with("ALERT"));
    }

    #[test]
    fn low_scores_need_no_follow_up() {
        let conn = open_memory_database().unwrap();
        let a = submit(&conn, AssessmentType::Gad7, Responses::new());
        assert_eq!(a.severity, Some(SeverityLevel::Minimal));
        assert!(!a.follow_up_required);
        assert!(a.follow_up_date.is_none());
        assert!(a.results.get("subscores").is_none());
    }

    #[test]
    fn subscores_are_kept_in_results() {
        let conn = open_memory_database().unwrap();
        let responses: Responses = (1..=10).map(|i| (format!("ybocs_{i}"), json!(3))).collect();
        let a = submit(&conn, AssessmentType::Ybocs, responses);
        assert_eq!(a.severity, Some(SeverityLevel::ModeratelySevere));
        assert_eq!(a.results["subscores"]["obsessions"], Value::from(15));
    }

    #[test]
    fn follow_up_rules() {
        let now = Utc::now();
        assert_eq!(follow_up_due(SeverityLevel::Mild, false, now), None);
        assert_eq!(
            follow_up_due(SeverityLevel::Severe, false, now),
            Some(now + Duration::days(7))
        );
        assert_eq!(
            follow_up_due(SeverityLevel::Moderate, false, now),
            Some(now + Duration::days(14))
        );
    }

    #[test]
    fn patient_history_filters_by_type() {
        let conn = open_memory_database().unwrap();
        submit(&conn, AssessmentType::Phq9, Responses::new());
        submit(&conn, AssessmentType::Gad7, Responses::new());
        assert_eq!(patient_assessments(&conn, "p1", None).unwrap().len(), 2);
        assert_eq!(
            patient_assessments(&conn, "p1", Some(AssessmentType::Gad7)).unwrap().len(),
            1
        );
    }

    #[test]
    fn out_of_range_answers_are_rejected_and_not_stored() {
        let conn = open_memory_database().unwrap();
        for bad in [-50, 2147483647] {
            let mut responses = phq9([3; 9]);
            responses.insert("phq9_4".into(), json!(bad));
            let err = submit_assessment(
                &conn,
                "dr-a",
                NewAssessment {
                    patient_id: "p1".into(),
                    assessment_type: AssessmentType::Phq9,
                    responses,
                    notes: None,
                },
                Utc::now(),
            )
            .unwrap_err();
            assert!(matches!(err, ServiceError::Validation(ref msg) if msg.contains("phq9_4")));
        }
        assert!(patient_assessments(&conn, "p1", None).unwrap().is_empty());
    }

    #[test]
    fn unknown_assessment_is_not_found() {
        let conn = open_memory_database().unwrap();
        assert!(matches!(
            get_assessment(&conn, &Uuid::new_v4()),
            Err(ServiceError::NotFound { .. })
        ));
    }
}
