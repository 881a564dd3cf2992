//! Support groups, memberships and group sessions.
//!
//! Capacity counts only `active` members. Leaving keeps the membership row
//! so a later join re-activates it instead of creating a duplicate.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::config::{DEFAULT_GROUP_CAPACITY, DEFAULT_GROUP_SESSION_CAPACITY};
use crate::db::{self, repository};
use crate::error::ServiceError;
use crate::models::enums::{GroupSessionType, MembershipStatus, SessionStatus};
use crate::models::{
    GroupSession, GroupSessionAttendee, GroupSessionFilter, SupportGroup, SupportGroupMember,
};
use crate::sessions::{advance_status, validate_duration};

// ═══════════════════════════════════════════
// Support groups
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGroup {
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub group_type: String,
    #[serde(default)]
    pub schedule: Value,
    pub max_members: Option<i32>,
}

pub fn create_group(
    conn: &Connection,
    facilitator_id: &str,
    input: NewGroup,
    now: DateTime<Utc>,
) -> Result<SupportGroup, ServiceError> {
    if input.name.trim().is_empty() {
        return Err(ServiceError::validation("Group name is required"));
    }
    let max_members = input.max_members.unwrap_or(DEFAULT_GROUP_CAPACITY);
    if max_members < 1 {
        return Err(ServiceError::validation("Group capacity must be at least 1"));
    }

    let group = SupportGroup {
        id: Uuid::new_v4(),
        name: input.name,
        description: input.description,
        group_type: input.group_type,
        facilitator_id: facilitator_id.to_string(),
        schedule: input.schedule,
        max_members,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    repository::insert_support_group(conn, &group)?;
    tracing::info!(group_id = %group.id, capacity = max_members, "Support group created");
    Ok(group)
}

pub fn get_group(conn: &Connection, id: &Uuid) -> Result<SupportGroup, ServiceError> {
    repository::get_support_group(conn, id)?.ok_or_else(|| ServiceError::not_found("Support group", id))
}

pub fn list_groups(conn: &Connection, active_only: bool) -> Result<Vec<SupportGroup>, ServiceError> {
    Ok(repository::list_support_groups(conn, active_only)?)
}

pub fn roster(conn: &Connection, group_id: &Uuid) -> Result<Vec<SupportGroupMember>, ServiceError> {
    get_group(conn, group_id)?;
    Ok(repository::list_group_members(conn, group_id, true)?)
}

pub fn membership(
    conn: &Connection,
    group_id: &Uuid,
    patient_id: &str,
) -> Result<Option<SupportGroupMember>, ServiceError> {
    Ok(repository::get_group_membership(conn, group_id, patient_id)?)
}

/// Join a group, re-activating an earlier membership when one exists.
pub fn join_group(
    conn: &Connection,
    group_id: &Uuid,
    patient_id: &str,
    now: DateTime<Utc>,
) -> Result<SupportGroupMember, ServiceError> {
    let group = get_group(conn, group_id)?;
    if !group.is_active {
        return Err(ServiceError::validation("Support group is not accepting members"));
    }

    let tx = db::write_transaction(conn)?;
    let existing = repository::get_group_membership(&tx, group_id, patient_id)?;
    if let Some(member) = &existing {
        if member.status == MembershipStatus::Active {
            return Err(ServiceError::Conflict("Already a member of this group".into()));
        }
        if member.status == MembershipStatus::Removed {
            return Err(ServiceError::forbidden("Membership was removed by the facilitator"));
        }
    }

    let active = repository::count_active_members(&tx, group_id)?;
    if active >= i64::from(group.max_members) {
        tracing::info!(group_id = %group_id, capacity = group.max_members, "Join rejected, group full");
        return Err(ServiceError::Conflict("Support group is full".into()));
    }

    let member = match existing {
        Some(mut member) => {
            repository::update_member_status(&tx, &member.id, MembershipStatus::Active, Some(&now))?;
            member.status = MembershipStatus::Active;
            member.joined_at = now;
            member
        }
        None => {
            let member = SupportGroupMember {
                id: Uuid::new_v4(),
                group_id: *group_id,
                patient_id: patient_id.to_string(),
                joined_at: now,
                status: MembershipStatus::Active,
            };
            repository::insert_group_member(&tx, &member)?;
            member
        }
    };
    tx.commit()?;

    tracing::info!(group_id = %group_id, member_id = %member.id, "Member joined group");
    Ok(member)
}

pub fn leave_group(
    conn: &Connection,
    group_id: &Uuid,
    patient_id: &str,
) -> Result<SupportGroupMember, ServiceError> {
    let mut member = repository::get_group_membership(conn, group_id, patient_id)?
        .filter(|m| m.status == MembershipStatus::Active)
        .ok_or_else(|| ServiceError::not_found("Membership", patient_id))?;
    repository::update_member_status(conn, &member.id, MembershipStatus::Inactive, None)?;
    member.status = MembershipStatus::Inactive;
    tracing::info!(group_id = %group_id, member_id = %member.id, "Member left group");
    Ok(member)
}

// ═══════════════════════════════════════════
// Group sessions
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGroupSession {
    pub group_id: Uuid,
    pub session_date: DateTime<Utc>,
    pub duration: i32,
    pub topic: String,
    pub description: Option<String>,
    #[serde(default)]
    pub objectives: Vec<String>,
    pub materials: Option<Value>,
    pub session_type: Option<GroupSessionType>,
    pub modality: Option<String>,
    pub max_participants: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSessionUpdate {
    pub status: Option<SessionStatus>,
    pub topic: Option<String>,
    pub description: Option<String>,
    pub objectives: Option<Vec<String>>,
    pub notes: Option<String>,
    pub homework: Option<String>,
    pub materials: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceMark {
    pub patient_id: String,
    pub attended: bool,
    pub participation: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSessionWithAttendees {
    #[serde(flatten)]
    pub session: GroupSession,
    pub attendees: Vec<GroupSessionAttendee>,
}

/// Schedule a session for a group. Only its facilitator may do so.
pub fn create_group_session(
    conn: &Connection,
    facilitator_id: &str,
    input: NewGroupSession,
    now: DateTime<Utc>,
) -> Result<GroupSession, ServiceError> {
    let group = get_group(conn, &input.group_id)?;
    if group.facilitator_id != facilitator_id {
        return Err(ServiceError::forbidden("Only the group facilitator can create sessions"));
    }
    validate_duration(input.duration)?;

    let session = GroupSession {
        id: Uuid::new_v4(),
        name: input.topic.clone(),
        description: input.description,
        facilitator_id: facilitator_id.to_string(),
        session_type: input.session_type.unwrap_or(GroupSessionType::Support),
        status: SessionStatus::Scheduled,
        scheduled_at: input.session_date,
        session_date: Some(input.session_date),
        duration: input.duration,
        modality: input.modality,
        max_participants: input.max_participants.unwrap_or(DEFAULT_GROUP_SESSION_CAPACITY),
        topic: Some(input.topic),
        notes: None,
        homework: None,
        next_session_date: None,
        actual_start_time: None,
        actual_end_time: None,
        objectives: input.objectives,
        materials: input.materials,
        group_id: Some(group.id),
        created_at: now,
        updated_at: now,
    };
    repository::insert_group_session(conn, &session)?;
    tracing::info!(session_id = %session.id, group_id = %group.id, "Group session scheduled");
    Ok(session)
}

pub fn get_group_session(conn: &Connection, id: &Uuid) -> Result<GroupSession, ServiceError> {
    repository::get_group_session(conn, id)?.ok_or_else(|| ServiceError::not_found("Group session", id))
}

pub fn group_session_with_attendees(
    conn: &Connection,
    id: &Uuid,
) -> Result<GroupSessionWithAttendees, ServiceError> {
    let session = get_group_session(conn, id)?;
    let attendees = repository::attendees_for_session(conn, id)?;
    Ok(GroupSessionWithAttendees { session, attendees })
}

pub fn list_group_sessions(
    conn: &Connection,
    filter: &GroupSessionFilter,
) -> Result<Vec<GroupSession>, ServiceError> {
    Ok(repository::list_group_sessions(conn, filter)?)
}

pub fn update_group_session(
    conn: &Connection,
    id: &Uuid,
    update: GroupSessionUpdate,
    now: DateTime<Utc>,
) -> Result<GroupSession, ServiceError> {
    let mut session = get_group_session(conn, id)?;

    if let Some(next) = update.status {
        advance_status(
            "Group session",
            &mut session.status,
            &mut session.actual_start_time,
            &mut session.actual_end_time,
            next,
            now,
        )?;
    }
    if let Some(topic) = update.topic {
        session.name = topic.clone();
        session.topic = Some(topic);
    }
    if update.description.is_some() {
        session.description = update.description;
    }
    if let Some(objectives) = update.objectives {
        session.objectives = objectives;
    }
    if update.notes.is_some() {
        session.notes = update.notes;
    }
    if update.homework.is_some() {
        session.homework = update.homework;
    }
    if update.materials.is_some() {
        session.materials = update.materials;
    }

    session.updated_at = now;
    repository::update_group_session(conn, &session)?;
    Ok(session)
}

/// Record attendance for a batch of patients. Re-recording a patient
/// overwrites their row.
pub fn record_attendance(
    conn: &Connection,
    session_id: &Uuid,
    marks: Vec<AttendanceMark>,
    now: DateTime<Utc>,
) -> Result<Vec<GroupSessionAttendee>, ServiceError> {
    get_group_session(conn, session_id)?;

    let tx = db::write_transaction(conn)?;
    for mark in marks {
        repository::upsert_attendee(
            &tx,
            &GroupSessionAttendee {
                id: Uuid::new_v4(),
                session_id: *session_id,
                patient_id: mark.patient_id,
                attended: mark.attended,
                notes: mark.notes,
                participation: mark.participation,
                created_at: now,
            },
        )?;
    }
    tx.commit()?;

    Ok(repository::attendees_for_session(conn, session_id)?)
}

/// Sessions across the patient's active groups, each carrying only that
/// patient's attendance row.
pub fn patient_group_sessions(
    conn: &Connection,
    patient_id: &str,
) -> Result<Vec<GroupSessionWithAttendees>, ServiceError> {
    let sessions = repository::group_sessions_for_member(conn, patient_id)?;
    let mut out = Vec::with_capacity(sessions.len());
    for session in sessions {
        let attendees = repository::attendees_for_session(conn, &session.id)?
            .into_iter()
            .filter(|a| a.patient_id == patient_id)
            .collect();
        out.push(GroupSessionWithAttendees { session, attendees });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use chrono::Duration;

    fn group(conn: &Connection, capacity: i32) -> SupportGroup {
        create_group(
            conn,
            "dr-f",
            NewGroup {
                name: "Anxiety support".into(),
                description: None,
                group_type: "anxiety".into(),
                schedule: serde_json::json!({"day": "tuesday", "time": "18:00"}),
                max_members: Some(capacity),
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn new_session(group_id: Uuid, days_ahead: i64) -> NewGroupSession {
        NewGroupSession {
            group_id,
            session_date: Utc::now() + Duration::days(days_ahead),
            duration: 90,
            topic: "Grounding techniques".into(),
            description: None,
            objectives: vec!["Practice 5-4-3-2-1".into()],
            materials: None,
            session_type: None,
            modality: None,
            max_participants: None,
        }
    }

    fn mark(patient: &str, attended: bool) -> AttendanceMark {
        AttendanceMark {
            patient_id: patient.into(),
            attended,
            participation: None,
            notes: None,
        }
    }

    #[test]
    fn capacity_counts_only_active_members() {
        let conn = open_memory_database().unwrap();
        let g = group(&conn, 2);
        join_group(&conn, &g.id, "p1", Utc::now()).unwrap();
        join_group(&conn, &g.id, "p2", Utc::now()).unwrap();
        let err = join_group(&conn, &g.id, "p3", Utc::now()).unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        leave_group(&conn, &g.id, "p1").unwrap();
        join_group(&conn, &g.id, "p3", Utc::now()).unwrap();
        assert_eq!(roster(&conn, &g.id).unwrap().len(), 2);
    }

    #[test]
    fn concurrent_joins_fill_capacity_without_lock_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("groups.db");
        let group_id = {
            let conn = crate::db::open_database(&path).unwrap();
            group(&conn, 3).id
        };

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let conn = crate::db::open_database(&path).unwrap();
                    join_group(&conn, &group_id, &format!("p{i}"), Utc::now())
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let joined = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(joined, 3);
        for err in results.into_iter().filter_map(Result::err) {
            assert!(
                matches!(&err, ServiceError::Conflict(msg) if msg == "Support group is full"),
                "unexpected join error: {err:?}"
            );
        }

        let conn = crate::db::open_database(&path).unwrap();
        assert_eq!(roster(&conn, &group_id).unwrap().len(), 3);
    }

    #[test]
    fn rejoin_reactivates_existing_membership() {
        let conn = open_memory_database().unwrap();
        let g = group(&conn, 5);
        let first = join_group(&conn, &g.id, "p1", Utc::now()).unwrap();
        leave_group(&conn, &g.id, "p1").unwrap();
        let again = join_group(&conn, &g.id, "p1", Utc::now()).unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(
            membership(&conn, &g.id, "p1").unwrap().unwrap().status,
            MembershipStatus::Active
        );
    }

    #[test]
    fn double_join_is_a_conflict() {
        let conn = open_memory_database().unwrap();
        let g = group(&conn, 5);
        join_group(&conn, &g.id, "p1", Utc::now()).unwrap();
        assert!(matches!(
            join_group(&conn, &g.id, "p1", Utc::now()),
            Err(ServiceError::Conflict(_))
        ));
    }

    #[test]
    fn leaving_without_membership_is_not_found() {
        let conn = open_memory_database().unwrap();
        let g = group(&conn, 5);
        assert!(matches!(
            leave_group(&conn, &g.id, "ghost"),
            Err(ServiceError::NotFound { .. })
        ));
    }

    #[test]
    fn only_facilitator_schedules_sessions() {
        let conn = open_memory_database().unwrap();
        let g = group(&conn, 5);
        let err = create_group_session(&conn, "dr-other", new_session(g.id, 1), Utc::now()).unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let s = create_group_session(&conn, "dr-f", new_session(g.id, 1), Utc::now()).unwrap();
        assert_eq!(s.status, SessionStatus::Scheduled);
        assert_eq!(s.max_participants, DEFAULT_GROUP_SESSION_CAPACITY);
        assert_eq!(s.session_type, GroupSessionType::Support);
    }

    #[test]
    fn session_duration_is_bounded() {
        let conn = open_memory_database().unwrap();
        let g = group(&conn, 5);
        let mut input = new_session(g.id, 1);
        input.duration = 200;
        assert!(matches!(
            create_group_session(&conn, "dr-f", input, Utc::now()),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn group_session_follows_session_lifecycle() {
        let conn = open_memory_database().unwrap();
        let g = group(&conn, 5);
        let s = create_group_session(&conn, "dr-f", new_session(g.id, 1), Utc::now()).unwrap();
        let started = update_group_session(
            &conn,
            &s.id,
            GroupSessionUpdate { status: Some(SessionStatus::InProgress), ..Default::default() },
            Utc::now(),
        )
        .unwrap();
        assert!(started.actual_start_time.is_some());

        let err = update_group_session(
            &conn,
            &s.id,
            GroupSessionUpdate { status: Some(SessionStatus::NoShow), ..Default::default() },
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidTransition { .. }));
    }

    #[test]
    fn attendance_is_idempotent_per_patient() {
        let conn = open_memory_database().unwrap();
        let g = group(&conn, 5);
        let s = create_group_session(&conn, "dr-f", new_session(g.id, 1), Utc::now()).unwrap();
        record_attendance(&conn, &s.id, vec![mark("p1", false), mark("p2", true)], Utc::now()).unwrap();
        let rows = record_attendance(&conn, &s.id, vec![mark("p1", true)], Utc::now()).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|a| a.attended));
    }

    #[test]
    fn patient_sessions_carry_own_attendance() {
        let conn = open_memory_database().unwrap();
        let g = group(&conn, 5);
        join_group(&conn, &g.id, "p1", Utc::now()).unwrap();
        let older = create_group_session(&conn, "dr-f", new_session(g.id, 1), Utc::now()).unwrap();
        create_group_session(&conn, "dr-f", new_session(g.id, 8), Utc::now()).unwrap();
        record_attendance(&conn, &older.id, vec![mark("p1", true), mark("p2", true)], Utc::now()).unwrap();

        let sessions = patient_group_sessions(&conn, "p1").unwrap();
        assert_eq!(sessions.len(), 2);
        assert!(sessions[0].attendees.is_empty());
        assert_eq!(sessions[1].session.id, older.id);
        assert_eq!(sessions[1].attendees.len(), 1);
        assert!(patient_group_sessions(&conn, "p2").unwrap().is_empty());
    }
}
