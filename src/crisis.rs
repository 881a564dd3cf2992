//! Crisis escalation workflow.
//!
//! A crisis opens `active` and moves forward through monitoring and
//! resolution. Escalation may happen from any open state and re-enters the
//! flow at monitoring or resolution. `resolved_at` is stamped exactly when
//! the crisis resolves.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::repository;
use crate::error::ServiceError;
use crate::models::enums::{CrisisSeverity, CrisisStatus, CrisisType};
use crate::models::{CrisisFilter, CrisisIntervention};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCrisis {
    /// Defaults to the caller when a patient reports for themselves.
    #[serde(default)]
    pub patient_id: String,
    pub crisis_type: CrisisType,
    pub severity: CrisisSeverity,
    pub description: String,
    #[serde(default)]
    pub interventions: Vec<String>,
    pub responder_id: Option<String>,
}

/// Partial update. `interventions` are appended, never replaced.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrisisUpdate {
    pub status: Option<CrisisStatus>,
    pub severity: Option<CrisisSeverity>,
    pub responder_id: Option<String>,
    #[serde(default)]
    pub interventions: Vec<String>,
    pub outcome: Option<String>,
    pub referred_to: Option<String>,
    pub follow_up_needed: Option<bool>,
    pub follow_up_date: Option<DateTime<Utc>>,
}

pub fn report_crisis(
    conn: &Connection,
    input: NewCrisis,
    now: DateTime<Utc>,
) -> Result<CrisisIntervention, ServiceError> {
    if input.patient_id.trim().is_empty() {
        return Err(ServiceError::validation("Patient ID is required"));
    }
    if input.description.trim().is_empty() {
        return Err(ServiceError::validation("Crisis description is required"));
    }

    let crisis = CrisisIntervention {
        id: Uuid::new_v4(),
        patient_id: input.patient_id,
        responder_id: input.responder_id,
        crisis_type: input.crisis_type,
        severity: input.severity,
        status: CrisisStatus::Active,
        description: input.description,
        interventions: input.interventions,
        outcome: None,
        referred_to: None,
        contacted_at: now,
        resolved_at: None,
        follow_up_needed: true,
        follow_up_date: None,
        created_at: now,
        updated_at: now,
    };
    repository::insert_crisis(conn, &crisis)?;

    if crisis.severity.rank() >= CrisisSeverity::High.rank() {
        tracing::warn!(
            crisis_id = %crisis.id,
            crisis_type = %crisis.crisis_type,
            severity = %crisis.severity,
            "High-severity crisis reported"
        );
    } else {
        tracing::info!(crisis_id = %crisis.id, severity = %crisis.severity, "Crisis reported");
    }
    Ok(crisis)
}

pub fn get_crisis(conn: &Connection, id: &Uuid) -> Result<CrisisIntervention, ServiceError> {
    repository::get_crisis(conn, id)?.ok_or_else(|| ServiceError::not_found("Crisis", id))
}

pub fn list_crises(
    conn: &Connection,
    filter: &CrisisFilter,
) -> Result<Vec<CrisisIntervention>, ServiceError> {
    Ok(repository::list_crises(conn, filter)?)
}

/// Move a crisis to `next`, keeping `resolved_at` in step with the status.
pub fn transition(
    crisis: &mut CrisisIntervention,
    next: CrisisStatus,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    if crisis.status == next {
        return Ok(());
    }
    if !crisis.status.can_transition_to(next) {
        tracing::warn!(crisis_id = %crisis.id, from = %crisis.status, to = %next, "Rejected crisis transition");
        return Err(ServiceError::transition("Crisis", crisis.status, next));
    }
    crisis.resolved_at = (next == CrisisStatus::Resolved).then_some(now);
    if next == CrisisStatus::Escalated {
        tracing::warn!(crisis_id = %crisis.id, severity = %crisis.severity, "Crisis escalated");
    }
    crisis.status = next;
    Ok(())
}

pub fn update_crisis(
    conn: &Connection,
    id: &Uuid,
    update: CrisisUpdate,
    now: DateTime<Utc>,
) -> Result<CrisisIntervention, ServiceError> {
    let mut crisis = get_crisis(conn, id)?;

    if let Some(next) = update.status {
        transition(&mut crisis, next, now)?;
    }
    if let Some(severity) = update.severity {
        crisis.severity = severity;
    }
    if update.responder_id.is_some() {
        crisis.responder_id = update.responder_id;
    }
    crisis.interventions.extend(update.interventions);
    if update.outcome.is_some() {
        crisis.outcome = update.outcome;
    }
    if update.referred_to.is_some() {
        crisis.referred_to = update.referred_to;
    }
    if let Some(needed) = update.follow_up_needed {
        crisis.follow_up_needed = needed;
    }
    if update.follow_up_date.is_some() {
        crisis.follow_up_date = update.follow_up_date;
        crisis.follow_up_needed = true;
    }

    crisis.updated_at = now;
    repository::update_crisis(conn, &crisis)?;
    tracing::info!(crisis_id = %crisis.id, status = %crisis.status, "Crisis updated");
    Ok(crisis)
}

pub fn assign_responder(
    conn: &Connection,
    id: &Uuid,
    responder_id: &str,
    now: DateTime<Utc>,
) -> Result<CrisisIntervention, ServiceError> {
    update_crisis(
        conn,
        id,
        CrisisUpdate {
            responder_id: Some(responder_id.to_string()),
            ..Default::default()
        },
        now,
    )
}

pub fn add_interventions(
    conn: &Connection,
    id: &Uuid,
    interventions: Vec<String>,
    now: DateTime<Utc>,
) -> Result<CrisisIntervention, ServiceError> {
    update_crisis(
        conn,
        id,
        CrisisUpdate {
            interventions,
            ..Default::default()
        },
        now,
    )
}

// ═══════════════════════════════════════════
// Dashboard
// ═══════════════════════════════════════════

/// Open crises bucketed by severity.
#[derive(Debug, Clone, Serialize)]
pub struct CrisisDashboard {
    pub critical: Vec<CrisisIntervention>,
    pub high: Vec<CrisisIntervention>,
    pub medium: Vec<CrisisIntervention>,
    pub low: Vec<CrisisIntervention>,
    pub total: usize,
}

/// Every open crisis, most severe first, oldest contact first within a band.
pub fn open_crises_by_priority(conn: &Connection) -> Result<Vec<CrisisIntervention>, ServiceError> {
    let mut open = repository::list_open_crises(conn)?;
    // Stable sort keeps the contacted_at ASC order from the query.
    open.sort_by(|a, b| b.severity.rank().cmp(&a.severity.rank()));
    Ok(open)
}

pub fn dashboard(conn: &Connection) -> Result<CrisisDashboard, ServiceError> {
    let open = open_crises_by_priority(conn)?;
    let total = open.len();
    let mut board = CrisisDashboard {
        critical: Vec::new(),
        high: Vec::new(),
        medium: Vec::new(),
        low: Vec::new(),
        total,
    };
    for crisis in open {
        match crisis.severity {
            CrisisSeverity::Critical => board.critical.push(crisis),
            CrisisSeverity::High => board.high.push(crisis),
            CrisisSeverity::Medium => board.medium.push(crisis),
            CrisisSeverity::Low => board.low.push(crisis),
        }
    }
    Ok(board)
}

// ═══════════════════════════════════════════
// Hotlines
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
pub struct Hotline {
    pub key: &'static str,
    pub name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<&'static str>,
    pub available: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub services: Option<&'static str>,
}

pub static HOTLINES: [Hotline; 4] = [
    Hotline {
        key: "suicide_prevention",
        name: "National Suicide Prevention Lifeline",
        phone: Some("988"),
        text: None,
        available: "24/7",
        services: None,
    },
    Hotline {
        key: "crisis_text_line",
        name: "Crisis Text Line",
        phone: None,
        text: Some("HOME to 741741"),
        available: "24/7",
        services: None,
    },
    Hotline {
        key: "emergency_services",
        name: "Emergency Services",
        phone: Some("911"),
        text: None,
        available: "24/7",
        services: None,
    },
    Hotline {
        key: "samhsa",
        name: "SAMHSA National Helpline",
        phone: Some("1-800-662-4357"),
        text: None,
        available: "24/7",
        services: Some("Mental health and substance abuse"),
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use chrono::Duration;

    fn report(conn: &Connection, severity: CrisisSeverity, at: DateTime<Utc>) -> CrisisIntervention {
        report_crisis(
            conn,
            NewCrisis {
                patient_id: "p1".into(),
                crisis_type: CrisisType::SuicidalIdeation,
                severity,
                description: "Patient expressing thoughts of self-harm".into(),
                interventions: vec![],
                responder_id: None,
            },
            at,
        )
        .unwrap()
    }

    fn set_status(conn: &Connection, id: &Uuid, status: CrisisStatus) -> Result<CrisisIntervention, ServiceError> {
        update_crisis(
            conn,
            id,
            CrisisUpdate { status: Some(status), ..Default::default() },
            Utc::now(),
        )
    }

    #[test]
    fn new_crisis_is_active_with_follow_up() {
        let conn = open_memory_database().unwrap();
        let c = report(&conn, CrisisSeverity::Critical, Utc::now());
        assert_eq!(c.status, CrisisStatus::Active);
        assert!(c.follow_up_needed);
        assert!(c.resolved_at.is_none());
        assert!(c.interventions.is_empty());
    }

    #[test]
    fn resolving_stamps_resolved_at() {
        let conn = open_memory_database().unwrap();
        let c = report(&conn, CrisisSeverity::High, Utc::now());
        let monitoring = set_status(&conn, &c.id, CrisisStatus::Monitoring).unwrap();
        assert!(monitoring.resolved_at.is_none());
        let resolved = set_status(&conn, &c.id, CrisisStatus::Resolved).unwrap();
        assert!(resolved.resolved_at.is_some());
        assert!(get_crisis(&conn, &c.id).unwrap().resolved_at.is_some());
    }

    #[test]
    fn resolved_is_terminal() {
        let conn = open_memory_database().unwrap();
        let c = report(&conn, CrisisSeverity::Low, Utc::now());
        set_status(&conn, &c.id, CrisisStatus::Resolved).unwrap();
        for next in [CrisisStatus::Active, CrisisStatus::Monitoring, CrisisStatus::Escalated] {
            let err = set_status(&conn, &c.id, next).unwrap_err();
            assert!(matches!(err, ServiceError::InvalidTransition { .. }));
        }
    }

    #[test]
    fn escalation_reenters_flow() {
        let conn = open_memory_database().unwrap();
        let c = report(&conn, CrisisSeverity::Medium, Utc::now());
        set_status(&conn, &c.id, CrisisStatus::Monitoring).unwrap();
        set_status(&conn, &c.id, CrisisStatus::Escalated).unwrap();
        assert!(set_status(&conn, &c.id, CrisisStatus::Active).is_err());
        let back = set_status(&conn, &c.id, CrisisStatus::Monitoring).unwrap();
        assert_eq!(back.status, CrisisStatus::Monitoring);
    }

    #[test]
    fn interventions_append_and_responder_assigns() {
        let conn = open_memory_database().unwrap();
        let c = report(&conn, CrisisSeverity::High, Utc::now());
        add_interventions(&conn, &c.id, vec!["Safety planning".into()], Utc::now()).unwrap();
        add_interventions(
            &conn,
            &c.id,
            vec!["Means restriction counseling".into(), "Family contacted".into()],
            Utc::now(),
        )
        .unwrap();
        let assigned = assign_responder(&conn, &c.id, "provider-123", Utc::now()).unwrap();
        assert_eq!(assigned.interventions.len(), 3);
        assert_eq!(assigned.responder_id.as_deref(), Some("provider-123"));
    }

    #[test]
    fn outcome_referral_and_follow_up_are_recorded() {
        let conn = open_memory_database().unwrap();
        let c = report(&conn, CrisisSeverity::High, Utc::now());
        let follow_up = Utc::now() + Duration::days(2);
        let updated = update_crisis(
            &conn,
            &c.id,
            CrisisUpdate {
                outcome: Some("Patient stabilized".into()),
                referred_to: Some("Inpatient psychiatric unit".into()),
                follow_up_date: Some(follow_up),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(updated.outcome.as_deref(), Some("Patient stabilized"));
        assert_eq!(updated.referred_to.as_deref(), Some("Inpatient psychiatric unit"));
        assert!(updated.follow_up_needed);
    }

    #[test]
    fn dashboard_groups_open_crises_by_severity() {
        let conn = open_memory_database().unwrap();
        let base = Utc::now() - Duration::hours(5);
        let old_critical = report(&conn, CrisisSeverity::Critical, base);
        report(&conn, CrisisSeverity::Critical, base + Duration::hours(1));
        report(&conn, CrisisSeverity::High, base + Duration::hours(2));
        report(&conn, CrisisSeverity::Medium, base + Duration::hours(3));
        let low = report(&conn, CrisisSeverity::Low, base + Duration::hours(4));
        let done = report(&conn, CrisisSeverity::Critical, base);
        set_status(&conn, &done.id, CrisisStatus::Resolved).unwrap();
        set_status(&conn, &low.id, CrisisStatus::Escalated).unwrap();

        let board = dashboard(&conn).unwrap();
        assert_eq!(board.total, 5);
        assert_eq!(board.critical.len(), 2);
        assert_eq!(board.critical[0].id, old_critical.id);
        assert_eq!(board.high.len(), 1);
        assert_eq!(board.medium.len(), 1);
        assert_eq!(board.low.len(), 1);

        let ordered = open_crises_by_priority(&conn).unwrap();
        assert_eq!(ordered.first().unwrap().severity, CrisisSeverity::Critical);
        assert_eq!(ordered.last().unwrap().severity, CrisisSeverity::Low);
    }

    #[test]
    fn hotline_directory_lists_988_first() {
        assert_eq!(HOTLINES[0].phone, Some("988"));
        assert_eq!(HOTLINES[1].text, Some("HOME to 741741"));
        assert!(HOTLINES.iter().any(|h| h.phone == Some("1-800-662-4357")));
    }

    #[test]
    fn empty_description_is_rejected() {
        let conn = open_memory_database().unwrap();
        let err = report_crisis(
            &conn,
            NewCrisis {
                patient_id: "p1".into(),
                crisis_type: CrisisType::Other,
                severity: CrisisSeverity::Low,
                description: "  ".into(),
                interventions: vec![],
                responder_id: None,
            },
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }
}
