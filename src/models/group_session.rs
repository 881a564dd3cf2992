use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{GroupSessionType, SessionStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSession {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub facilitator_id: String,
    pub session_type: GroupSessionType,
    pub status: SessionStatus,
    pub scheduled_at: DateTime<Utc>,
    pub session_date: Option<DateTime<Utc>>,
    pub duration: i32,
    pub modality: Option<String>,
    pub max_participants: i32,
    pub topic: Option<String>,
    pub notes: Option<String>,
    pub homework: Option<String>,
    pub next_session_date: Option<DateTime<Utc>>,
    pub actual_start_time: Option<DateTime<Utc>>,
    pub actual_end_time: Option<DateTime<Utc>>,
    pub objectives: Vec<String>,
    pub materials: Option<serde_json::Value>,
    pub group_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSessionAttendee {
    pub id: Uuid,
    pub session_id: Uuid,
    pub patient_id: String,
    pub attended: bool,
    pub notes: Option<String>,
    pub participation: Option<String>,
    pub created_at: DateTime<Utc>,
}
