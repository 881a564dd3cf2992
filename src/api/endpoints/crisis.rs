//! Crisis endpoints.
//!
//! Anyone may raise a crisis; only providers and admins work it.
//! `GET /api/crisis/hotlines/info` is public.

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{self, ApiContext, ApiResult, UserContext};
use crate::crisis::{self, CrisisDashboard, CrisisUpdate, Hotline, NewCrisis};
use crate::models::enums::{CrisisSeverity, CrisisStatus};
use crate::models::{CrisisFilter, CrisisIntervention};

const RESPONDERS_ONLY: &str = "Only crisis responders can update interventions";

#[derive(Serialize)]
pub struct EmergencyContacts {
    pub suicide_prevention: &'static str,
    pub crisis_text_line: &'static str,
    pub emergency: &'static str,
}

const EMERGENCY_CONTACTS: EmergencyContacts = EmergencyContacts {
    suicide_prevention: "988",
    crisis_text_line: "Text HOME to 741741",
    emergency: "911",
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrisisCreated {
    pub data: CrisisIntervention,
    pub message: &'static str,
    pub emergency_contacts: EmergencyContacts,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CrisisListQuery {
    pub patient_id: Option<String>,
    pub status: Option<CrisisStatus>,
    pub severity: Option<CrisisSeverity>,
}

/// `POST /api/crisis`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(mut body): Json<NewCrisis>,
) -> Result<(StatusCode, Json<CrisisCreated>), ApiError> {
    if body.patient_id.trim().is_empty() && user.is_patient() {
        body.patient_id = user.user_id.clone();
    }
    if body.patient_id.trim().is_empty() {
        return Err(ApiError::bad_request("Patient ID is required"));
    }
    let conn = ctx.core.open_db()?;
    let crisis = crisis::report_crisis(&conn, body, Utc::now())?;
    Ok((
        StatusCode::CREATED,
        Json(CrisisCreated {
            data: crisis,
            message: "Crisis intervention initiated",
            emergency_contacts: EMERGENCY_CONTACTS,
        }),
    ))
}

/// `GET /api/crisis`: patients see their own, responders see all.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Query(query): Query<CrisisListQuery>,
) -> ApiResult<Vec<CrisisIntervention>> {
    let patient_id = if user.is_patient() {
        Some(user.user_id.clone())
    } else {
        query.patient_id
    };
    let filter = CrisisFilter {
        patient_id,
        status: query.status,
        severity: query.severity,
        ..Default::default()
    };
    let conn = ctx.core.open_db()?;
    Ok(types::list(crisis::list_crises(&conn, &filter)?))
}

/// `GET /api/crisis/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> ApiResult<CrisisIntervention> {
    let id = types::parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let crisis = crisis::get_crisis(&conn, &id)?;
    user.require_self_or_clinical(&crisis.patient_id)?;
    Ok(types::data(crisis))
}

/// `PATCH /api/crisis/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    Json(mut body): Json<CrisisUpdate>,
) -> ApiResult<CrisisIntervention> {
    if !user.is_clinical() {
        return Err(ApiError::forbidden(RESPONDERS_ONLY));
    }
    let id = types::parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let current = crisis::get_crisis(&conn, &id)?;
    // the first responder to touch an unassigned crisis takes it
    if current.responder_id.is_none() && body.responder_id.is_none() {
        body.responder_id = Some(user.user_id.clone());
    }
    let updated = crisis::update_crisis(&conn, &id, body, Utc::now())?;
    Ok(types::with_message(updated, "Crisis intervention updated"))
}

/// `GET /api/crisis/active/dashboard`
pub async fn dashboard(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
) -> ApiResult<CrisisDashboard> {
    if !user.is_clinical() {
        return Err(ApiError::forbidden("Access denied"));
    }
    let conn = ctx.core.open_db()?;
    Ok(types::data(crisis::dashboard(&conn)?))
}

/// `GET /api/crisis/hotlines/info`
pub async fn hotlines() -> ApiResult<BTreeMap<&'static str, &'static Hotline>> {
    let by_key = crisis::HOTLINES.iter().map(|h| (h.key, h)).collect();
    Ok(types::data(by_key))
}
