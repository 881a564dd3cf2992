use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{PlanStatus, TreatmentGoalStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentPlan {
    pub id: Uuid,
    pub patient_id: String,
    pub provider_id: String,
    pub diagnosis: Vec<String>,
    pub goals: serde_json::Value,
    pub interventions: serde_json::Value,
    pub medications: Option<serde_json::Value>,
    pub frequency: Option<String>,
    pub start_date: DateTime<Utc>,
    pub review_date: DateTime<Utc>,
    pub status: PlanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentGoal {
    pub id: Uuid,
    pub treatment_plan_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub target_date: Option<DateTime<Utc>>,
    pub status: TreatmentGoalStatus,
    /// Percent complete, 0..=100.
    pub progress: i32,
    pub interventions: Vec<String>,
    pub strategies: Vec<String>,
    pub measurements: Vec<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
