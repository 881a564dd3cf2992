//! Support group endpoints.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{self, ApiContext, ApiResult, Created, UserContext};
use crate::groups::{self, NewGroup};
use crate::models::{SupportGroup, SupportGroupMember};

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GroupListQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDetail {
    #[serde(flatten)]
    pub group: SupportGroup,
    pub member_count: usize,
    /// Roster is only shown to clinicians.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<SupportGroupMember>>,
}

/// `POST /api/groups`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(body): Json<NewGroup>,
) -> Created<SupportGroup> {
    user.require_provider("Only providers can create support groups")?;
    let conn = ctx.core.open_db()?;
    let group = groups::create_group(&conn, &user.user_id, body, Utc::now())?;
    Ok(types::created(group, "Support group created successfully"))
}

/// `GET /api/groups`
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(query): Query<GroupListQuery>,
) -> ApiResult<Vec<SupportGroup>> {
    let conn = ctx.core.open_db()?;
    Ok(types::list(groups::list_groups(&conn, !query.include_inactive)?))
}

/// `GET /api/groups/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> ApiResult<GroupDetail> {
    let id = types::parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let group = groups::get_group(&conn, &id)?;
    let roster = groups::roster(&conn, &id)?;
    Ok(types::data(GroupDetail {
        member_count: roster.len(),
        members: user.is_clinical().then_some(roster),
        group,
    }))
}

/// `POST /api/groups/:id/join`
pub async fn join(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> Created<SupportGroupMember> {
    if !user.is_patient() {
        return Err(ApiError::forbidden("Only patients can join support groups"));
    }
    let id = types::parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let member = groups::join_group(&conn, &id, &user.user_id, Utc::now())?;
    Ok(types::created(member, "Joined support group successfully"))
}

/// `POST /api/groups/:id/leave`
pub async fn leave(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> ApiResult<SupportGroupMember> {
    if !user.is_patient() {
        return Err(ApiError::forbidden("Only patients can leave support groups"));
    }
    let id = types::parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let member = groups::leave_group(&conn, &id, &user.user_id)?;
    Ok(types::with_message(member, "Left support group successfully"))
}
