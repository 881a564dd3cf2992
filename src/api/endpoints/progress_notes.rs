//! Progress note endpoints.
//!
//! Providers write notes; a provider reads a patient's notes only with a
//! valid treatment consent or as the note's author. Signed notes are
//! frozen.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use chrono::Utc;

use crate::api::error::ApiError;
use crate::api::types::{self, ApiContext, ApiResult, Created, UserContext};
use crate::consent;
use crate::models::enums::ConsentType;
use crate::models::ProgressNote;
use crate::notes::{self, NewNote, NoteUpdate, SessionNote};
use crate::sessions;

/// `POST /api/progress-notes`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(body): Json<NewNote>,
) -> Created<ProgressNote> {
    user.require_provider("Only providers can create progress notes")?;
    let conn = ctx.core.open_db()?;
    let note = notes::create_note(&conn, &user.user_id, body, Utc::now())?;
    Ok(types::created(note, "Progress note created successfully"))
}

/// `GET /api/progress-notes/patient/:id`
pub async fn for_patient(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(patient_id): Path<String>,
) -> ApiResult<Vec<ProgressNote>> {
    let conn = ctx.core.open_db()?;
    let allowed = if user.is_provider() {
        consent::has_valid_consent(&conn, &patient_id, &user.user_id, ConsentType::Treatment, Utc::now())?
    } else {
        user.is_admin() || patient_id == user.user_id
    };
    if !allowed {
        return Err(ApiError::forbidden("Access denied - valid consent required"));
    }
    Ok(types::list(notes::notes_for_patient(&conn, &patient_id)?))
}

/// `GET /api/progress-notes/session/:id`
pub async fn for_session(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(session_id): Path<String>,
) -> ApiResult<Vec<ProgressNote>> {
    let session_id = types::parse_id(&session_id)?;
    let conn = ctx.core.open_db()?;
    let session = sessions::get_session(&conn, &session_id)?;
    let allowed = user.is_admin()
        || (user.is_patient() && session.patient_id == user.user_id)
        || (user.is_provider() && session.therapist_id == user.user_id);
    if !allowed {
        return Err(ApiError::forbidden("Access denied"));
    }
    Ok(types::list(notes::notes_for_session(&conn, &session_id)?))
}

/// `GET /api/progress-notes/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> ApiResult<ProgressNote> {
    let id = types::parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let note = notes::get_note(&conn, &id)?;
    let allowed = if user.is_provider() {
        notes::provider_can_read(&conn, &note, &user.user_id, Utc::now())?
    } else {
        user.is_admin() || note.patient_id == user.user_id
    };
    if !allowed {
        return Err(ApiError::forbidden("Access denied"));
    }
    Ok(types::data(note))
}

/// `PATCH /api/progress-notes/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    Json(body): Json<NoteUpdate>,
) -> ApiResult<ProgressNote> {
    user.require_provider("Only providers can update progress notes")?;
    let id = types::parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let note = notes::update_note(&conn, &id, &user.user_id, body, Utc::now())?;
    Ok(types::with_message(note, "Progress note updated successfully"))
}

/// `POST /api/progress-notes/:id/sign`
pub async fn sign(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> ApiResult<ProgressNote> {
    user.require_provider("Only providers can sign progress notes")?;
    let id = types::parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let note = notes::sign_note(&conn, &id, &user.user_id, Utc::now())?;
    Ok(types::with_message(note, "Progress note signed successfully"))
}

/// `POST /api/progress-notes/sessions/:session_id/notes`
pub async fn add_to_session(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(session_id): Path<String>,
    Json(body): Json<SessionNote>,
) -> Created<ProgressNote> {
    user.require_provider("Only providers can add session notes")?;
    let session_id = types::parse_id(&session_id)?;
    let conn = ctx.core.open_db()?;
    let note = notes::add_session_note(&conn, &session_id, &user.user_id, body, Utc::now())?;
    Ok(types::created(note, "Session note added successfully"))
}
