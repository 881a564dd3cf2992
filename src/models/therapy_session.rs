use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{SessionStatus, SessionType};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TherapySession {
    pub id: Uuid,
    pub patient_id: String,
    pub therapist_id: String,
    pub session_type: SessionType,
    pub status: SessionStatus,
    pub scheduled_at: DateTime<Utc>,
    /// Minutes.
    pub duration: i32,
    pub modality: Option<String>,
    pub notes: Option<String>,
    pub homework: Option<String>,
    pub next_session_date: Option<DateTime<Utc>>,
    pub actual_start_time: Option<DateTime<Utc>>,
    pub actual_end_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TherapySession {
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.scheduled_at + Duration::minutes(self.duration as i64)
    }
}
