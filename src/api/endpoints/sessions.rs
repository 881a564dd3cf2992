//! Therapy session endpoints.
//!
//! - `POST /api/sessions`: patient books a session with a therapist
//! - `GET /api/sessions`: scoped by role
//! - `GET|PATCH|DELETE /api/sessions/:id`

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{self, ApiContext, ApiResult, Created, UserContext};
use crate::models::enums::{SessionStatus, SessionType, UserRole};
use crate::models::{TherapySession, TherapySessionFilter};
use crate::sessions::{self, NewSession, SessionUpdate};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSessionBody {
    pub therapist_id: String,
    pub session_type: SessionType,
    pub scheduled_at: DateTime<Utc>,
    pub duration: i32,
    pub modality: Option<String>,
    pub notes: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionListQuery {
    pub status: Option<SessionStatus>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

fn ensure_participant(user: &UserContext, session: &TherapySession) -> Result<(), ApiError> {
    if user.is_admin() || session.patient_id == user.user_id || session.therapist_id == user.user_id {
        Ok(())
    } else {
        Err(ApiError::forbidden("Forbidden"))
    }
}

/// `POST /api/sessions`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(body): Json<BookSessionBody>,
) -> Created<TherapySession> {
    if !user.is_patient() {
        return Err(ApiError::forbidden("Only patients can create therapy sessions"));
    }
    let conn = ctx.core.open_db()?;
    let session = sessions::schedule_session(
        &conn,
        NewSession {
            patient_id: user.user_id,
            therapist_id: body.therapist_id,
            session_type: body.session_type,
            scheduled_at: body.scheduled_at,
            duration: body.duration,
            modality: body.modality,
            notes: body.notes,
        },
        Utc::now(),
    )?;
    Ok(types::created(session, "Therapy session scheduled successfully"))
}

/// `GET /api/sessions`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Query(query): Query<SessionListQuery>,
) -> ApiResult<Vec<TherapySession>> {
    let mut filter = TherapySessionFilter {
        status: query.status,
        date_from: query.start_date,
        date_to: query.end_date,
        ..Default::default()
    };
    match user.role {
        UserRole::Patient => filter.patient_id = Some(user.user_id),
        UserRole::Provider => filter.therapist_id = Some(user.user_id),
        UserRole::Admin => {}
    }
    let conn = ctx.core.open_db()?;
    Ok(types::list(sessions::list_sessions(&conn, &filter)?))
}

/// `GET /api/sessions/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> ApiResult<TherapySession> {
    let id = types::parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let session = sessions::get_session(&conn, &id)?;
    ensure_participant(&user, &session)?;
    Ok(types::data(session))
}

/// `PATCH /api/sessions/:id`: therapist (or admin) only.
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    Json(body): Json<SessionUpdate>,
) -> ApiResult<TherapySession> {
    let id = types::parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let session = sessions::get_session(&conn, &id)?;
    if !(user.is_admin() || session.therapist_id == user.user_id) {
        return Err(ApiError::forbidden("Only the session therapist can update the session"));
    }
    let updated = sessions::update_session(&conn, &id, body, Utc::now())?;
    Ok(types::with_message(updated, "Therapy session updated successfully"))
}

/// `DELETE /api/sessions/:id`: cancels; the row is kept.
pub async fn cancel(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> ApiResult<TherapySession> {
    let id = types::parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let session = sessions::get_session(&conn, &id)?;
    ensure_participant(&user, &session)?;
    let cancelled = sessions::cancel_session(&conn, &id, Utc::now())?;
    Ok(types::with_message(cancelled, "Session cancelled successfully"))
}
