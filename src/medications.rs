//! Psychiatric medication records.
//!
//! Status moves through a small lifecycle; completed and discontinued are
//! terminal and stamp `end_date` when it is not already set.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::repository;
use crate::error::ServiceError;
use crate::models::enums::{MedicationClass, MedicationStatus};
use crate::models::{MedicationFilter, PsychMedication};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMedication {
    pub patient_id: String,
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub medication_class: MedicationClass,
    pub start_date: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    #[serde(default)]
    pub interactions: Vec<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationUpdate {
    pub status: Option<MedicationStatus>,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub reason: Option<String>,
    #[serde(default)]
    pub side_effects: Vec<String>,
    pub interactions: Option<Vec<String>>,
    pub notes: Option<String>,
}

fn require(field: &str, value: &str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        return Err(ServiceError::validation(format!("{field} is required")));
    }
    Ok(())
}

pub fn prescribe(
    conn: &Connection,
    prescriber_id: &str,
    input: NewMedication,
    now: DateTime<Utc>,
) -> Result<PsychMedication, ServiceError> {
    require("name", &input.name)?;
    require("dosage", &input.dosage)?;
    require("frequency", &input.frequency)?;

    let med = PsychMedication {
        id: Uuid::new_v4(),
        patient_id: input.patient_id,
        prescriber_id: prescriber_id.to_string(),
        name: input.name,
        dosage: input.dosage,
        frequency: input.frequency,
        medication_class: input.medication_class,
        status: MedicationStatus::Active,
        start_date: input.start_date.unwrap_or(now),
        end_date: None,
        reason: input.reason,
        side_effects: Vec::new(),
        interactions: input.interactions,
        notes: input.notes,
        created_at: now,
        updated_at: now,
    };
    repository::insert_psych_medication(conn, &med)?;
    tracing::info!(medication_id = %med.id, class = %med.medication_class, "Medication prescribed");
    Ok(med)
}

pub fn get_medication(conn: &Connection, id: &Uuid) -> Result<PsychMedication, ServiceError> {
    repository::get_psych_medication(conn, id)?.ok_or_else(|| ServiceError::not_found("Medication", id))
}

pub fn list_medications(
    conn: &Connection,
    filter: &MedicationFilter,
) -> Result<Vec<PsychMedication>, ServiceError> {
    Ok(repository::list_psych_medications(conn, filter)?)
}

/// Append side effects, skipping ones already recorded (case-insensitive).
pub fn merge_side_effects(existing: &mut Vec<String>, reported: Vec<String>) {
    for effect in reported {
        let effect = effect.trim().to_string();
        if effect.is_empty() {
            continue;
        }
        if !existing.iter().any(|e| e.eq_ignore_ascii_case(&effect)) {
            existing.push(effect);
        }
    }
}

pub fn update_medication(
    conn: &Connection,
    id: &Uuid,
    update: MedicationUpdate,
    now: DateTime<Utc>,
) -> Result<PsychMedication, ServiceError> {
    let mut med = get_medication(conn, id)?;

    if let Some(next) = update.status.filter(|s| *s != med.status) {
        if !med.status.can_transition_to(next) {
            tracing::warn!(medication_id = %med.id, from = %med.status, to = %next, "Rejected medication transition");
            return Err(ServiceError::transition("Medication", med.status, next));
        }
        if next.is_terminal() && med.end_date.is_none() {
            med.end_date = Some(now.max(med.start_date));
        }
        tracing::info!(medication_id = %med.id, from = %med.status, to = %next, "Medication status changed");
        med.status = next;
    } else if med.status.is_terminal() && (update.dosage.is_some() || update.frequency.is_some()) {
        return Err(ServiceError::validation(format!(
            "Medication is {} and can no longer be adjusted",
            med.status
        )));
    }

    if let Some(dosage) = update.dosage {
        require("dosage", &dosage)?;
        med.dosage = dosage;
    }
    if let Some(frequency) = update.frequency {
        require("frequency", &frequency)?;
        med.frequency = frequency;
    }
    if update.reason.is_some() {
        med.reason = update.reason;
    }
    merge_side_effects(&mut med.side_effects, update.side_effects);
    if let Some(interactions) = update.interactions {
        med.interactions = interactions;
    }
    if update.notes.is_some() {
        med.notes = update.notes;
    }

    med.updated_at = now;
    repository::update_psych_medication(conn, &med)?;
    Ok(med)
}

pub fn report_side_effects(
    conn: &Connection,
    id: &Uuid,
    side_effects: Vec<String>,
    now: DateTime<Utc>,
) -> Result<PsychMedication, ServiceError> {
    update_medication(
        conn,
        id,
        MedicationUpdate {
            side_effects,
            ..Default::default()
        },
        now,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use chrono::Duration;

    fn sertraline(conn: &Connection) -> PsychMedication {
        prescribe(
            conn,
            "dr-psych",
            NewMedication {
                patient_id: "p1".into(),
                name: "Sertraline".into(),
                dosage: "50mg".into(),
                frequency: "daily".into(),
                medication_class: MedicationClass::Antidepressant,
                start_date: Some(Utc::now() - Duration::days(60)),
                reason: Some("Major depressive disorder".into()),
                interactions: vec![],
                notes: None,
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn set_status(conn: &Connection, id: &Uuid, status: MedicationStatus) -> Result<PsychMedication, ServiceError> {
        update_medication(
            conn,
            id,
            MedicationUpdate { status: Some(status), ..Default::default() },
            Utc::now(),
        )
    }

    #[test]
    fn terminal_status_stamps_end_date() {
        let conn = open_memory_database().unwrap();
        let med = sertraline(&conn);
        let tapered = set_status(&conn, &med.id, MedicationStatus::Tapered).unwrap();
        assert!(tapered.end_date.is_none());
        let done = set_status(&conn, &med.id, MedicationStatus::Discontinued).unwrap();
        let end = done.end_date.unwrap();
        assert!(end >= done.start_date);
        assert_eq!(get_medication(&conn, &med.id).unwrap().end_date, Some(end));
    }

    #[test]
    fn terminal_status_cannot_reopen() {
        let conn = open_memory_database().unwrap();
        let med = sertraline(&conn);
        set_status(&conn, &med.id, MedicationStatus::Completed).unwrap();
        assert!(matches!(
            set_status(&conn, &med.id, MedicationStatus::Active),
            Err(ServiceError::InvalidTransition { .. })
        ));
        let err = update_medication(
            &conn,
            &med.id,
            MedicationUpdate { dosage: Some("100mg".into()), ..Default::default() },
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn hold_and_resume() {
        let conn = open_memory_database().unwrap();
        let med = sertraline(&conn);
        set_status(&conn, &med.id, MedicationStatus::OnHold).unwrap();
        let resumed = set_status(&conn, &med.id, MedicationStatus::Active).unwrap();
        assert_eq!(resumed.status, MedicationStatus::Active);
        assert!(resumed.end_date.is_none());
    }

    #[test]
    fn side_effects_append_without_duplicates() {
        let conn = open_memory_database().unwrap();
        let med = sertraline(&conn);
        report_side_effects(&conn, &med.id, vec!["Nausea".into(), "Insomnia".into()], Utc::now()).unwrap();
        let med = report_side_effects(&conn, &med.id, vec!["nausea".into(), "Headache".into(), " ".into()], Utc::now()).unwrap();
        assert_eq!(med.side_effects, vec!["Nausea", "Insomnia", "Headache"]);
    }

    #[test]
    fn list_filters_by_status() {
        let conn = open_memory_database().unwrap();
        let first = sertraline(&conn);
        sertraline(&conn);
        set_status(&conn, &first.id, MedicationStatus::Discontinued).unwrap();
        let active = list_medications(
            &conn,
            &MedicationFilter {
                patient_id: Some("p1".into()),
                status: Some(MedicationStatus::Active),
            },
        )
        .unwrap();
        assert_eq!(active.len(), 1);
        let all = list_medications(
            &conn,
            &MedicationFilter { patient_id: Some("p1".into()), status: None },
        )
        .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn blank_dosage_is_rejected() {
        let conn = open_memory_database().unwrap();
        let err = prescribe(
            &conn,
            "dr-psych",
            NewMedication {
                patient_id: "p1".into(),
                name: "Lithium".into(),
                dosage: "".into(),
                frequency: "twice daily".into(),
                medication_class: MedicationClass::MoodStabilizer,
                start_date: None,
                reason: None,
                interactions: vec![],
                notes: None,
            },
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "dosage is required");
    }
}
