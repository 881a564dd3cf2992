use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{ConsentStatus, ConsentType};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentRecord {
    pub id: Uuid,
    pub patient_id: String,
    pub provider_id: String,
    pub consent_type: ConsentType,
    pub status: ConsentStatus,
    pub signed_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Vec<String>,
    pub notes: Option<String>,
    pub granted_to: Option<String>,
    pub granted_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub purpose: Option<String>,
    pub disclosure_scope: Vec<String>,
    /// 42 CFR Part 2 authorization.
    pub substance_use_disclosure: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConsentRecord {
    /// Active and not past its expiry at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.status == ConsentStatus::Active && self.expires_at.map_or(true, |exp| exp > now)
    }
}
