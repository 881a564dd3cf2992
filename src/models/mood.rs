use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodLog {
    pub id: Uuid,
    pub patient_id: String,
    pub mood_rating: i32,
    pub notes: Option<String>,
    pub triggers: Vec<String>,
    pub activities: Vec<String>,
    pub log_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
