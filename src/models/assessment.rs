use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AssessmentType, SeverityLevel};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MentalHealthAssessment {
    pub id: Uuid,
    pub patient_id: String,
    pub assessed_by: String,
    pub assessment_type: AssessmentType,
    pub score: Option<i32>,
    pub severity: Option<SeverityLevel>,
    /// Responses, interpretation, recommendations and subscores.
    pub results: serde_json::Value,
    pub notes: Option<String>,
    pub follow_up_required: bool,
    pub follow_up_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
