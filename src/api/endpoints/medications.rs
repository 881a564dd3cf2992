//! Psychiatric medication endpoints.
//!
//! - `GET /api/medications`: patients see their own list
//! - `POST /api/medications`: providers prescribe
//! - `PATCH /api/medications/:id`: providers adjust; patients may only
//!   report side effects on their own medications

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use chrono::Utc;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{self, ApiContext, ApiResult, Created, UserContext};
use crate::medications::{self, MedicationUpdate, NewMedication};
use crate::models::enums::MedicationStatus;
use crate::models::{MedicationFilter, PsychMedication};

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MedListQuery {
    pub patient_id: Option<String>,
    pub status: Option<MedicationStatus>,
}

/// `GET /api/medications`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Query(query): Query<MedListQuery>,
) -> ApiResult<Vec<PsychMedication>> {
    let patient_id = if user.is_patient() {
        Some(user.user_id.clone())
    } else {
        query.patient_id
    };
    let filter = MedicationFilter {
        patient_id,
        status: query.status,
    };
    let conn = ctx.core.open_db()?;
    Ok(types::list(medications::list_medications(&conn, &filter)?))
}

/// `POST /api/medications`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(body): Json<NewMedication>,
) -> Created<PsychMedication> {
    user.require_provider("Only providers can prescribe medications")?;
    let conn = ctx.core.open_db()?;
    let med = medications::prescribe(&conn, &user.user_id, body, Utc::now())?;
    Ok(types::created(med, "Medication added successfully"))
}

/// `PATCH /api/medications/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    Json(body): Json<MedicationUpdate>,
) -> ApiResult<PsychMedication> {
    let id = types::parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let med = medications::get_medication(&conn, &id)?;

    let updated = if user.is_patient() {
        if med.patient_id != user.user_id {
            return Err(ApiError::forbidden("Access denied"));
        }
        medications::report_side_effects(&conn, &id, body.side_effects, Utc::now())?
    } else {
        user.require_provider("Only providers can update medications")?;
        medications::update_medication(&conn, &id, body, Utc::now())?
    };
    Ok(types::with_message(updated, "Medication updated successfully"))
}
