use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::MembershipStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportGroup {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub group_type: String,
    pub facilitator_id: String,
    pub schedule: serde_json::Value,
    pub max_members: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportGroupMember {
    pub id: Uuid,
    pub group_id: Uuid,
    pub patient_id: String,
    pub joined_at: DateTime<Utc>,
    pub status: MembershipStatus,
}
