//! Group session endpoints. Facilitators run sessions; members read them.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{self, ApiContext, ApiResult, Created, UserContext};
use crate::groups::{
    self, AttendanceMark, GroupSessionUpdate, GroupSessionWithAttendees, NewGroupSession,
};
use crate::models::enums::{MembershipStatus, SessionStatus};
use crate::models::{GroupSession, GroupSessionAttendee, GroupSessionFilter};

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GroupSessionListQuery {
    pub group_id: Option<Uuid>,
    pub status: Option<SessionStatus>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct AttendanceBody {
    pub attendees: Vec<AttendanceMark>,
}

fn ensure_facilitator(user: &UserContext, session: &GroupSession) -> Result<(), ApiError> {
    if session.facilitator_id != user.user_id {
        return Err(ApiError::forbidden("Access denied"));
    }
    Ok(())
}

/// `POST /api/group-sessions`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(body): Json<NewGroupSession>,
) -> Created<GroupSession> {
    user.require_provider("Only providers can create group sessions")?;
    let conn = ctx.core.open_db()?;
    let session = groups::create_group_session(&conn, &user.user_id, body, Utc::now())?;
    Ok(types::created(session, "Group session created successfully"))
}

/// `GET /api/group-sessions`: providers see the sessions they facilitate.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Query(query): Query<GroupSessionListQuery>,
) -> ApiResult<Vec<GroupSession>> {
    let filter = GroupSessionFilter {
        group_id: query.group_id,
        facilitator_id: user.is_provider().then(|| user.user_id.clone()),
        status: query.status,
        date_from: query.start_date,
        date_to: query.end_date,
    };
    let conn = ctx.core.open_db()?;
    Ok(types::list(groups::list_group_sessions(&conn, &filter)?))
}

/// `GET /api/group-sessions/:id`: patients must be active group members.
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> ApiResult<GroupSessionWithAttendees> {
    let id = types::parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let session = groups::group_session_with_attendees(&conn, &id)?;
    if user.is_patient() {
        let is_member = match session.session.group_id {
            Some(group_id) => groups::membership(&conn, &group_id, &user.user_id)?
                .is_some_and(|m| m.status == MembershipStatus::Active),
            None => false,
        };
        if !is_member {
            return Err(ApiError::forbidden("Access denied"));
        }
    }
    Ok(types::data(session))
}

/// `PATCH /api/group-sessions/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    Json(body): Json<GroupSessionUpdate>,
) -> ApiResult<GroupSession> {
    user.require_provider("Only providers can update group sessions")?;
    let id = types::parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    ensure_facilitator(&user, &groups::get_group_session(&conn, &id)?)?;
    let updated = groups::update_group_session(&conn, &id, body, Utc::now())?;
    Ok(types::with_message(updated, "Group session updated successfully"))
}

/// `POST /api/group-sessions/:id/attendance`
pub async fn attendance(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    Json(body): Json<AttendanceBody>,
) -> ApiResult<Vec<GroupSessionAttendee>> {
    user.require_provider("Only providers can record attendance")?;
    let id = types::parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    ensure_facilitator(&user, &groups::get_group_session(&conn, &id)?)?;
    let attendees = groups::record_attendance(&conn, &id, body.attendees, Utc::now())?;
    Ok(types::with_message(attendees, "Attendance recorded successfully"))
}

/// `GET /api/group-sessions/patient/:id/sessions`
pub async fn for_patient(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(patient_id): Path<String>,
) -> ApiResult<Vec<GroupSessionWithAttendees>> {
    user.require_self_or_clinical(&patient_id)?;
    let conn = ctx.core.open_db()?;
    Ok(types::list(groups::patient_group_sessions(&conn, &patient_id)?))
}
