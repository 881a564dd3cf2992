//! Consent endpoints.
//!
//! Patients grant and revoke their own consents. Providers may open a
//! short-lived emergency consent and ask whether they may access a
//! resource.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use chrono::Utc;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{self, ApiContext, ApiResult, Created, UserContext};
use crate::consent::{self, AccessDecision, NewConsent};
use crate::models::ConsentRecord;

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConsentListQuery {
    pub patient_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyBody {
    pub patient_id: String,
    pub reason: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateQuery {
    pub patient_id: String,
    pub provider_id: Option<String>,
    pub resource: String,
}

/// `GET /api/consents`: active consents.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Query(query): Query<ConsentListQuery>,
) -> ApiResult<Vec<ConsentRecord>> {
    let patient_id = if user.is_patient() {
        user.user_id.clone()
    } else {
        query
            .patient_id
            .ok_or_else(|| ApiError::bad_request("patientId is required"))?
    };
    let conn = ctx.core.open_db()?;
    Ok(types::list(consent::patient_consents(&conn, &patient_id)?))
}

/// `POST /api/consents`
pub async fn grant(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(mut body): Json<NewConsent>,
) -> Created<ConsentRecord> {
    if !user.is_patient() {
        return Err(ApiError::forbidden("Only patients can grant consent"));
    }
    body.patient_id = user.user_id.clone();
    let conn = ctx.core.open_db()?;
    let record = consent::grant_consent(&conn, body, Utc::now())?;
    Ok(types::created(record, "Consent granted successfully"))
}

/// `POST /api/consents/:id/revoke`
pub async fn revoke(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> ApiResult<ConsentRecord> {
    if !user.is_patient() {
        return Err(ApiError::forbidden("Only patients can revoke consent"));
    }
    let id = types::parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let record = consent::revoke_consent(&conn, &id, &user.user_id, Utc::now())?;
    Ok(types::with_message(record, "Consent revoked successfully"))
}

/// `POST /api/consents/emergency`
pub async fn emergency(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(body): Json<EmergencyBody>,
) -> Created<ConsentRecord> {
    user.require_provider("Only providers can create emergency consent")?;
    let conn = ctx.core.open_db()?;
    let record = consent::create_emergency_consent(
        &conn,
        &body.patient_id,
        &user.user_id,
        &body.reason,
        Utc::now(),
    )?;
    Ok(types::created(record, "Emergency consent created"))
}

/// `GET /api/consents/validate?patientId&resource[&providerId]`
pub async fn validate(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Query(query): Query<ValidateQuery>,
) -> ApiResult<AccessDecision> {
    user.require_self_or_clinical(&query.patient_id)?;
    let provider_id = match (&query.provider_id, user.is_provider()) {
        (Some(id), _) => id.clone(),
        (None, true) => user.user_id.clone(),
        (None, false) => return Err(ApiError::bad_request("providerId is required")),
    };
    let conn = ctx.core.open_db()?;
    let decision = consent::validate_access(
        &conn,
        &query.patient_id,
        &provider_id,
        &query.resource,
        Utc::now(),
    )?;
    Ok(types::data(decision))
}
