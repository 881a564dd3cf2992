//! Therapy session scheduling.
//!
//! Owns the session lifecycle (scheduled → in_progress → completed, with
//! cancel/no-show exits), duration bounds and the per-therapist overlap
//! check. Group sessions reuse [`advance_status`] for the same lifecycle.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::config::{MAX_SESSION_MINUTES, MIN_SESSION_MINUTES};
use crate::db::repository;
use crate::error::ServiceError;
use crate::models::enums::{SessionStatus, SessionType};
use crate::models::{TherapySession, TherapySessionFilter};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    pub patient_id: String,
    pub therapist_id: String,
    pub session_type: SessionType,
    pub scheduled_at: DateTime<Utc>,
    pub duration: i32,
    pub modality: Option<String>,
    pub notes: Option<String>,
}

/// Partial update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdate {
    pub status: Option<SessionStatus>,
    pub session_type: Option<SessionType>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub duration: Option<i32>,
    pub modality: Option<String>,
    pub notes: Option<String>,
    pub homework: Option<String>,
    pub next_session_date: Option<DateTime<Utc>>,
}

impl SessionUpdate {
    /// True when the update touches anything beyond clinical follow-up fields.
    fn touches_schedule(&self) -> bool {
        self.status.is_some()
            || self.session_type.is_some()
            || self.scheduled_at.is_some()
            || self.duration.is_some()
            || self.modality.is_some()
    }
}

pub fn validate_duration(minutes: i32) -> Result<(), ServiceError> {
    if !(MIN_SESSION_MINUTES..=MAX_SESSION_MINUTES).contains(&minutes) {
        return Err(ServiceError::validation(format!(
            "Duration must be between {MIN_SESSION_MINUTES} and {MAX_SESSION_MINUTES} minutes"
        )));
    }
    Ok(())
}

/// Apply a lifecycle move, stamping the actual start/end times.
/// Moving to the current status is a no-op.
pub fn advance_status(
    entity: &'static str,
    status: &mut SessionStatus,
    actual_start: &mut Option<DateTime<Utc>>,
    actual_end: &mut Option<DateTime<Utc>>,
    next: SessionStatus,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    if *status == next {
        return Ok(());
    }
    if !status.can_transition_to(next) {
        tracing::warn!(entity, from = %status, to = %next, "Rejected session transition");
        return Err(ServiceError::transition(entity, *status, next));
    }
    match next {
        SessionStatus::InProgress => *actual_start = Some(now),
        SessionStatus::Completed => *actual_end = Some(now),
        _ => {}
    }
    *status = next;
    Ok(())
}

fn ensure_no_overlap(
    conn: &Connection,
    therapist_id: &str,
    start: DateTime<Utc>,
    duration: i32,
    exclude: Option<&Uuid>,
) -> Result<(), ServiceError> {
    let end = start + chrono::Duration::minutes(duration as i64);
    let clashes = repository::find_overlapping_sessions(conn, therapist_id, start, end, exclude)?;
    if let Some(clash) = clashes.first() {
        return Err(ServiceError::Conflict(format!(
            "Therapist already has session {} at {}",
            clash.id,
            repository::ts(&clash.scheduled_at)
        )));
    }
    Ok(())
}

pub fn schedule_session(
    conn: &Connection,
    input: NewSession,
    now: DateTime<Utc>,
) -> Result<TherapySession, ServiceError> {
    validate_duration(input.duration)?;
    ensure_no_overlap(conn, &input.therapist_id, input.scheduled_at, input.duration, None)?;

    let session = TherapySession {
        id: Uuid::new_v4(),
        patient_id: input.patient_id,
        therapist_id: input.therapist_id,
        session_type: input.session_type,
        status: SessionStatus::Scheduled,
        scheduled_at: input.scheduled_at,
        duration: input.duration,
        modality: input.modality,
        notes: input.notes,
        homework: None,
        next_session_date: None,
        actual_start_time: None,
        actual_end_time: None,
        created_at: now,
        updated_at: now,
    };
    repository::insert_therapy_session(conn, &session)?;

    tracing::info!(
        session_id = %session.id,
        session_type = %session.session_type,
        "Therapy session scheduled"
    );
    Ok(session)
}

pub fn get_session(conn: &Connection, id: &Uuid) -> Result<TherapySession, ServiceError> {
    repository::get_therapy_session(conn, id)?.ok_or_else(|| ServiceError::not_found("Session", id))
}

pub fn list_sessions(
    conn: &Connection,
    filter: &TherapySessionFilter,
) -> Result<Vec<TherapySession>, ServiceError> {
    Ok(repository::list_therapy_sessions(conn, filter)?)
}

pub fn update_session(
    conn: &Connection,
    id: &Uuid,
    update: SessionUpdate,
    now: DateTime<Utc>,
) -> Result<TherapySession, ServiceError> {
    let mut session = get_session(conn, id)?;

    if session.status.is_terminal() && update.touches_schedule() {
        return Err(ServiceError::validation(format!(
            "Session is {}; only notes, homework and next session date can change",
            session.status
        )));
    }

    let reschedules = update.scheduled_at.is_some() || update.duration.is_some();
    if let Some(duration) = update.duration {
        validate_duration(duration)?;
        session.duration = duration;
    }
    if let Some(at) = update.scheduled_at {
        session.scheduled_at = at;
    }
    if reschedules {
        ensure_no_overlap(
            conn,
            &session.therapist_id,
            session.scheduled_at,
            session.duration,
            Some(&session.id),
        )?;
    }

    if let Some(next) = update.status {
        advance_status(
            "Session",
            &mut session.status,
            &mut session.actual_start_time,
            &mut session.actual_end_time,
            next,
            now,
        )?;
    }
    if let Some(kind) = update.session_type {
        session.session_type = kind;
    }
    if update.modality.is_some() {
        session.modality = update.modality;
    }
    if update.notes.is_some() {
        session.notes = update.notes;
    }
    if update.homework.is_some() {
        session.homework = update.homework;
    }
    if update.next_session_date.is_some() {
        session.next_session_date = update.next_session_date;
    }

    session.updated_at = now;
    repository::update_therapy_session(conn, &session)?;
    tracing::info!(session_id = %session.id, status = %session.status, "Therapy session updated");
    Ok(session)
}

/// Cancelling is a status change; session rows are never deleted.
pub fn cancel_session(
    conn: &Connection,
    id: &Uuid,
    now: DateTime<Utc>,
) -> Result<TherapySession, ServiceError> {
    update_session(
        conn,
        id,
        SessionUpdate {
            status: Some(SessionStatus::Cancelled),
            ..Default::default()
        },
        now,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use chrono::{Duration, TimeZone};

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, hour, minute, 0).unwrap()
    }

    fn new_session(therapist: &str, start: DateTime<Utc>, duration: i32) -> NewSession {
        NewSession {
            patient_id: "patient-1".into(),
            therapist_id: therapist.into(),
            session_type: SessionType::Individual,
            scheduled_at: start,
            duration,
            modality: Some("telehealth".into()),
            notes: None,
        }
    }

    #[test]
    fn schedule_starts_in_scheduled_state() {
        let conn = open_memory_database().unwrap();
        let s = schedule_session(&conn, new_session("dr-a", at(9, 0), 50), at(8, 0)).unwrap();
        assert_eq!(s.status, SessionStatus::Scheduled);
        assert_eq!(get_session(&conn, &s.id).unwrap().modality.as_deref(), Some("telehealth"));
    }

    #[test]
    fn duration_bounds_are_inclusive() {
        let conn = open_memory_database().unwrap();
        assert!(schedule_session(&conn, new_session("dr-a", at(9, 0), 30), at(8, 0)).is_ok());
        assert!(schedule_session(&conn, new_session("dr-b", at(9, 0), 180), at(8, 0)).is_ok());
        let err = schedule_session(&conn, new_session("dr-c", at(9, 0), 29), at(8, 0)).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(schedule_session(&conn, new_session("dr-c", at(9, 0), 181), at(8, 0)).is_err());
    }

    #[test]
    fn overlapping_session_for_same_therapist_conflicts() {
        let conn = open_memory_database().unwrap();
        schedule_session(&conn, new_session("dr-a", at(9, 0), 60), at(8, 0)).unwrap();

        let err = schedule_session(&conn, new_session("dr-a", at(9, 30), 60), at(8, 0)).unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        // Back-to-back is fine, and other therapists are unaffected.
        assert!(schedule_session(&conn, new_session("dr-a", at(10, 0), 60), at(8, 0)).is_ok());
        assert!(schedule_session(&conn, new_session("dr-b", at(9, 30), 60), at(8, 0)).is_ok());
    }

    #[test]
    fn cancelled_session_frees_the_slot() {
        let conn = open_memory_database().unwrap();
        let s = schedule_session(&conn, new_session("dr-a", at(9, 0), 60), at(8, 0)).unwrap();
        cancel_session(&conn, &s.id, at(8, 30)).unwrap();
        assert!(schedule_session(&conn, new_session("dr-a", at(9, 0), 60), at(8, 31)).is_ok());
    }

    #[test]
    fn lifecycle_stamps_actual_times() {
        let conn = open_memory_database().unwrap();
        let s = schedule_session(&conn, new_session("dr-a", at(9, 0), 50), at(8, 0)).unwrap();

        let started = update_session(
            &conn,
            &s.id,
            SessionUpdate { status: Some(SessionStatus::InProgress), ..Default::default() },
            at(9, 2),
        )
        .unwrap();
        assert_eq!(started.actual_start_time, Some(at(9, 2)));

        let done = update_session(
            &conn,
            &s.id,
            SessionUpdate { status: Some(SessionStatus::Completed), ..Default::default() },
            at(9, 52),
        )
        .unwrap();
        assert_eq!(done.status, SessionStatus::Completed);
        assert_eq!(done.actual_end_time, Some(at(9, 52)));
    }

    #[test]
    fn scheduled_cannot_jump_to_completed() {
        let conn = open_memory_database().unwrap();
        let s = schedule_session(&conn, new_session("dr-a", at(9, 0), 50), at(8, 0)).unwrap();
        let err = update_session(
            &conn,
            &s.id,
            SessionUpdate { status: Some(SessionStatus::Completed), ..Default::default() },
            at(9, 0),
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidTransition { .. }));
    }

    #[test]
    fn completed_session_accepts_only_followup_fields() {
        let conn = open_memory_database().unwrap();
        let s = schedule_session(&conn, new_session("dr-a", at(9, 0), 50), at(8, 0)).unwrap();
        for next in [SessionStatus::InProgress, SessionStatus::Completed] {
            update_session(
                &conn,
                &s.id,
                SessionUpdate { status: Some(next), ..Default::default() },
                at(9, 30),
            )
            .unwrap();
        }

        let updated = update_session(
            &conn,
            &s.id,
            SessionUpdate {
                notes: Some("Discussed sleep hygiene".into()),
                homework: Some("Thought record daily".into()),
                next_session_date: Some(at(9, 0) + Duration::days(7)),
                ..Default::default()
            },
            at(10, 0),
        )
        .unwrap();
        assert_eq!(updated.homework.as_deref(), Some("Thought record daily"));

        let err = update_session(
            &conn,
            &s.id,
            SessionUpdate { duration: Some(60), ..Default::default() },
            at(10, 0),
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn reschedule_ignores_own_slot_but_checks_others() {
        let conn = open_memory_database().unwrap();
        let a = schedule_session(&conn, new_session("dr-a", at(9, 0), 60), at(8, 0)).unwrap();
        schedule_session(&conn, new_session("dr-a", at(11, 0), 60), at(8, 0)).unwrap();

        let moved = update_session(
            &conn,
            &a.id,
            SessionUpdate { scheduled_at: Some(at(9, 15)), ..Default::default() },
            at(8, 10),
        )
        .unwrap();
        assert_eq!(moved.scheduled_at, at(9, 15));

        let err = update_session(
            &conn,
            &a.id,
            SessionUpdate { scheduled_at: Some(at(10, 30)), ..Default::default() },
            at(8, 10),
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[test]
    fn missing_session_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = cancel_session(&conn, &Uuid::new_v4(), at(9, 0)).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { entity: "Session", .. }));
    }
}
