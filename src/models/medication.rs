use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{MedicationClass, MedicationStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PsychMedication {
    pub id: Uuid,
    pub patient_id: String,
    pub prescriber_id: String,
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub medication_class: MedicationClass,
    pub status: MedicationStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    pub side_effects: Vec<String>,
    pub interactions: Vec<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
