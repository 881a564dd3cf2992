//! Treatment plan and goal endpoints.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use chrono::Utc;

use crate::api::error::ApiError;
use crate::api::types::{self, ApiContext, ApiResult, Created, UserContext};
use crate::models::{TreatmentGoal, TreatmentPlan};
use crate::treatment::{
    self, GoalUpdate, NewGoal, NewPlan, PlanProgress, PlanUpdate, PlanWithGoals, UpdatedGoal,
};

/// Admins, the plan's patient and the plan's provider.
fn ensure_can_view(user: &UserContext, plan: &TreatmentPlan) -> Result<(), ApiError> {
    let allowed = user.is_admin()
        || (user.is_patient() && plan.patient_id == user.user_id)
        || (user.is_provider() && plan.provider_id == user.user_id);
    if allowed {
        Ok(())
    } else {
        Err(ApiError::forbidden("Access denied"))
    }
}

fn ensure_owner(user: &UserContext, plan: &TreatmentPlan, role_msg: &str) -> Result<(), ApiError> {
    user.require_provider(role_msg)?;
    if plan.provider_id != user.user_id {
        return Err(ApiError::forbidden("Access denied"));
    }
    Ok(())
}

/// `POST /api/treatment-plans`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(body): Json<NewPlan>,
) -> Created<PlanWithGoals> {
    user.require_provider("Only providers can create treatment plans")?;
    let conn = ctx.core.open_db()?;
    let plan = treatment::create_plan(&conn, &user.user_id, body, Utc::now())?;
    Ok(types::created(plan, "Treatment plan created successfully"))
}

/// `GET /api/treatment-plans/patient/:id`: the active plan.
pub async fn active_for_patient(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(patient_id): Path<String>,
) -> ApiResult<PlanWithGoals> {
    user.require_self_or_clinical(&patient_id)?;
    let conn = ctx.core.open_db()?;
    let plan = treatment::active_plan_for_patient(&conn, &patient_id)?
        .ok_or_else(|| ApiError::not_found("No active treatment plan found"))?;
    Ok(types::data(plan))
}

/// `GET /api/treatment-plans/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> ApiResult<PlanWithGoals> {
    let id = types::parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let plan = treatment::plan_with_goals(&conn, &id)?;
    ensure_can_view(&user, &plan.plan)?;
    Ok(types::data(plan))
}

/// `PATCH /api/treatment-plans/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    Json(body): Json<PlanUpdate>,
) -> ApiResult<TreatmentPlan> {
    let id = types::parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let plan = treatment::get_plan(&conn, &id)?;
    ensure_owner(&user, &plan, "Only providers can update treatment plans")?;
    let updated = treatment::update_plan(&conn, &id, body, Utc::now())?;
    Ok(types::with_message(updated, "Treatment plan updated successfully"))
}

/// `POST /api/treatment-plans/:id/goals`
pub async fn add_goal(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    Json(body): Json<NewGoal>,
) -> Created<TreatmentGoal> {
    let id = types::parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let plan = treatment::get_plan(&conn, &id)?;
    ensure_owner(&user, &plan, "Only providers can add goals")?;
    let goal = treatment::add_goal(&conn, &id, body, Utc::now())?;
    Ok(types::created(goal, "Goal added successfully"))
}

/// `PATCH /api/treatment-plans/goals/:goal_id`
pub async fn update_goal(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(goal_id): Path<String>,
    Json(body): Json<GoalUpdate>,
) -> ApiResult<UpdatedGoal> {
    user.require_provider("Only providers can update goals")?;
    let goal_id = types::parse_id(&goal_id)?;
    let conn = ctx.core.open_db()?;
    let goal = treatment::get_goal(&conn, &goal_id)?;
    let plan = treatment::get_plan(&conn, &goal.treatment_plan_id)?;
    ensure_owner(&user, &plan, "Only providers can update goals")?;
    let updated = treatment::update_goal(&conn, &goal_id, body, Utc::now())?;
    Ok(types::with_message(updated, "Goal updated successfully"))
}

/// `GET /api/treatment-plans/:id/progress`
pub async fn progress(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> ApiResult<PlanProgress> {
    let id = types::parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let plan = treatment::get_plan(&conn, &id)?;
    ensure_can_view(&user, &plan)?;
    Ok(types::data(treatment::plan_progress(&conn, &id)?))
}
