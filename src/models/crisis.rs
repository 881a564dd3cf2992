use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{CrisisSeverity, CrisisStatus, CrisisType};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrisisIntervention {
    pub id: Uuid,
    pub patient_id: String,
    pub responder_id: Option<String>,
    pub crisis_type: CrisisType,
    pub severity: CrisisSeverity,
    pub status: CrisisStatus,
    pub description: String,
    pub interventions: Vec<String>,
    pub outcome: Option<String>,
    pub referred_to: Option<String>,
    pub contacted_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub follow_up_needed: bool,
    pub follow_up_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
