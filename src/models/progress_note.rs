use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::NoteType;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressNote {
    pub id: Uuid,
    pub patient_id: String,
    pub provider_id: String,
    pub session_id: Option<Uuid>,
    pub note_type: NoteType,
    pub content: String,
    pub diagnosis: Vec<String>,
    pub interventions: Vec<String>,
    pub plan: Option<String>,
    pub is_signed: bool,
    pub signed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
