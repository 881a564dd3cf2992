use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::enums::{CrisisSeverity, CrisisStatus, MedicationStatus, SessionStatus};

#[derive(Debug, Default)]
pub struct TherapySessionFilter {
    pub patient_id: Option<String>,
    pub therapist_id: Option<String>,
    pub status: Option<SessionStatus>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct GroupSessionFilter {
    pub group_id: Option<Uuid>,
    pub facilitator_id: Option<String>,
    pub status: Option<SessionStatus>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct MedicationFilter {
    pub patient_id: Option<String>,
    pub status: Option<MedicationStatus>,
}

#[derive(Debug, Default)]
pub struct MoodFilter {
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

#[derive(Debug, Default)]
pub struct CrisisFilter {
    pub patient_id: Option<String>,
    pub responder_id: Option<String>,
    pub status: Option<CrisisStatus>,
    pub severity: Option<CrisisSeverity>,
}
