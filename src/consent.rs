//! Consent grants, revocation, expiry and access checks.
//!
//! A consent is usable while it is `active` and its `expires_at` (if any)
//! lies in the future. Expiry is also persisted by the sweeper through
//! [`update_expired_consents`], but reads never depend on that having run.

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::EMERGENCY_CONSENT_HOURS;
use crate::db::repository;
use crate::error::ServiceError;
use crate::models::enums::{ConsentStatus, ConsentType};
use crate::models::ConsentRecord;

/// Resource name guarded by 42 CFR Part 2.
pub const SUBSTANCE_USE_RESOURCE: &str = "substance_use";

/// Disclosure scope accepts either a single resource or a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl From<OneOrMany> for Vec<String> {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewConsent {
    /// Filled from the caller when a patient grants their own consent.
    #[serde(default)]
    pub patient_id: String,
    pub provider_id: String,
    pub consent_type: ConsentType,
    pub purpose: Option<String>,
    pub disclosure_scope: Option<OneOrMany>,
    #[serde(default)]
    pub scope: Vec<String>,
    pub granted_to: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub substance_use_disclosure: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consent_id: Option<Uuid>,
}

impl AccessDecision {
    fn deny(reason: &'static str) -> Self {
        Self {
            allowed: false,
            reason,
            consent_id: None,
        }
    }
}

pub fn grant_consent(
    conn: &Connection,
    input: NewConsent,
    now: DateTime<Utc>,
) -> Result<ConsentRecord, ServiceError> {
    if input.patient_id.trim().is_empty() || input.provider_id.trim().is_empty() {
        return Err(ServiceError::validation("patientId and providerId are required"));
    }
    let is_part2 = input.consent_type == ConsentType::CfrPart2;
    let purpose = input.purpose.filter(|p| !p.trim().is_empty());
    if is_part2 && purpose.is_none() {
        return Err(ServiceError::validation("42 CFR Part 2 consent requires a purpose"));
    }
    if input.expires_at.is_some_and(|exp| exp <= now) {
        return Err(ServiceError::validation("Consent expiry must be in the future"));
    }

    let consent = ConsentRecord {
        id: Uuid::new_v4(),
        patient_id: input.patient_id,
        provider_id: input.provider_id,
        consent_type: input.consent_type,
        status: ConsentStatus::Active,
        signed_at: Some(now),
        expires_at: input.expires_at,
        scope: input.scope,
        notes: input.notes,
        granted_to: input.granted_to,
        granted_at: Some(now),
        revoked_at: None,
        purpose,
        disclosure_scope: input.disclosure_scope.map(Vec::from).unwrap_or_default(),
        substance_use_disclosure: input.substance_use_disclosure || is_part2,
        created_at: now,
        updated_at: now,
    };
    repository::insert_consent(conn, &consent)?;
    tracing::info!(
        consent_id = %consent.id,
        kind = %consent.consent_type,
        part2 = consent.substance_use_disclosure,
        "Consent granted"
    );
    Ok(consent)
}

pub fn get_consent(conn: &Connection, id: &Uuid) -> Result<ConsentRecord, ServiceError> {
    repository::get_consent(conn, id)?.ok_or_else(|| ServiceError::not_found("Consent", id))
}

/// Revoke a patient's own active consent.
pub fn revoke_consent(
    conn: &Connection,
    id: &Uuid,
    patient_id: &str,
    now: DateTime<Utc>,
) -> Result<ConsentRecord, ServiceError> {
    let mut consent = repository::get_consent(conn, id)?
        .filter(|c| c.patient_id == patient_id)
        .ok_or_else(|| ServiceError::forbidden("Consent not found or unauthorized"))?;

    if consent.status != ConsentStatus::Active {
        return Err(ServiceError::transition("Consent", consent.status, ConsentStatus::Revoked));
    }
    // revoked_at >= granted_at
    let revoked_at = consent.granted_at.map_or(now, |g| g.max(now));
    if !repository::mark_consent_revoked(conn, id, &revoked_at)? {
        return Err(ServiceError::transition("Consent", consent.status, ConsentStatus::Revoked));
    }

    consent.status = ConsentStatus::Revoked;
    consent.revoked_at = Some(revoked_at);
    consent.updated_at = revoked_at;
    tracing::info!(consent_id = %consent.id, "Consent revoked");
    Ok(consent)
}

pub fn has_valid_consent(
    conn: &Connection,
    patient_id: &str,
    provider_id: &str,
    consent_type: ConsentType,
    now: DateTime<Utc>,
) -> Result<bool, ServiceError> {
    Ok(repository::find_valid_consent(conn, patient_id, provider_id, consent_type, &now)?.is_some())
}

/// 42 CFR Part 2: a valid consent from this provider that explicitly authorizes
/// substance-use disclosure.
pub fn can_disclose_substance_use(
    conn: &Connection,
    patient_id: &str,
    provider_id: &str,
    now: DateTime<Utc>,
) -> Result<bool, ServiceError> {
    let consents = repository::list_consents_for_patient(conn, patient_id, true)?;
    Ok(consents.iter().any(|c| {
        c.provider_id == provider_id && c.is_valid_at(now) && c.substance_use_disclosure
    }))
}

/// Active consents for a patient, newest grant first.
pub fn patient_consents(conn: &Connection, patient_id: &str) -> Result<Vec<ConsentRecord>, ServiceError> {
    Ok(repository::list_consents_for_patient(conn, patient_id, true)?)
}

pub fn update_expired_consents(conn: &Connection, now: DateTime<Utc>) -> Result<usize, ServiceError> {
    let count = repository::expire_lapsed_consents(conn, &now)?;
    if count > 0 {
        tracing::info!(count, "Expired lapsed consents");
    }
    Ok(count)
}

/// Decide whether `provider_id` may read `resource` for the patient.
pub fn validate_access(
    conn: &Connection,
    patient_id: &str,
    provider_id: &str,
    resource: &str,
    now: DateTime<Utc>,
) -> Result<AccessDecision, ServiceError> {
    let Some(consent) =
        repository::find_valid_consent(conn, patient_id, provider_id, ConsentType::Treatment, &now)?
    else {
        return Ok(AccessDecision::deny("No valid consent found"));
    };

    let scope = &consent.disclosure_scope;
    let in_scope = scope.is_empty() || scope.iter().any(|s| s == "*" || s == resource);
    if !in_scope {
        return Ok(AccessDecision::deny("Resource type not within consent scope"));
    }
    if resource == SUBSTANCE_USE_RESOURCE && !consent.substance_use_disclosure {
        return Ok(AccessDecision::deny("Substance use disclosure not authorized"));
    }

    Ok(AccessDecision {
        allowed: true,
        reason: "Valid consent found",
        consent_id: Some(consent.id),
    })
}

/// Short-lived break-glass consent. Never covers substance-use records.
pub fn create_emergency_consent(
    conn: &Connection,
    patient_id: &str,
    provider_id: &str,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<ConsentRecord, ServiceError> {
    if reason.trim().is_empty() {
        return Err(ServiceError::validation("Emergency reason is required"));
    }
    let consent = ConsentRecord {
        id: Uuid::new_v4(),
        patient_id: patient_id.to_string(),
        provider_id: provider_id.to_string(),
        consent_type: ConsentType::EmergencyContact,
        status: ConsentStatus::Active,
        signed_at: Some(now),
        expires_at: Some(now + Duration::hours(EMERGENCY_CONSENT_HOURS)),
        scope: Vec::new(),
        notes: None,
        granted_to: Some(provider_id.to_string()),
        granted_at: Some(now),
        revoked_at: None,
        purpose: Some(format!("Emergency: {reason}")),
        disclosure_scope: Vec::new(),
        substance_use_disclosure: false,
        created_at: now,
        updated_at: now,
    };
    repository::insert_consent(conn, &consent)?;
    tracing::warn!(consent_id = %consent.id, "Emergency consent created");
    Ok(consent)
}
