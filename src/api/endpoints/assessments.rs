//! Assessment endpoints.
//!
//! Providers record instruments for any patient; patients may submit
//! self-report instruments for themselves. Scores are always computed
//! server-side.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use chrono::Utc;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{self, ApiContext, ApiResult, Created, UserContext};
use crate::assessments::{self, NewAssessment};
use crate::models::enums::AssessmentType;
use crate::models::MentalHealthAssessment;
use crate::scoring::{self, Question};

#[derive(Deserialize, Default)]
pub struct AssessmentListQuery {
    #[serde(rename = "type")]
    pub kind: Option<AssessmentType>,
}

/// `POST /api/assessments`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(mut body): Json<NewAssessment>,
) -> Created<MentalHealthAssessment> {
    if user.is_patient() {
        if !body.patient_id.is_empty() && body.patient_id != user.user_id {
            return Err(ApiError::forbidden("Patients can only submit their own assessments"));
        }
        body.patient_id = user.user_id.clone();
    }
    let conn = ctx.core.open_db()?;
    let assessment = assessments::submit_assessment(&conn, &user.user_id, body, Utc::now())?;
    Ok(types::created(assessment, "Assessment completed successfully"))
}

/// `GET /api/assessments/patient/:id`
pub async fn for_patient(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(patient_id): Path<String>,
    Query(query): Query<AssessmentListQuery>,
) -> ApiResult<Vec<MentalHealthAssessment>> {
    user.require_self_or_clinical(&patient_id)?;
    let conn = ctx.core.open_db()?;
    Ok(types::list(assessments::patient_assessments(&conn, &patient_id, query.kind)?))
}

/// `GET /api/assessments/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> ApiResult<MentalHealthAssessment> {
    let id = types::parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let assessment = assessments::get_assessment(&conn, &id)?;
    user.require_self_or_clinical(&assessment.patient_id)?;
    Ok(types::data(assessment))
}

/// `GET /api/assessments/questions/:type`: PHQ9, GAD7 or CSSRS.
pub async fn questions(Path(kind): Path<String>) -> ApiResult<Vec<Question>> {
    let questions = match kind.to_ascii_uppercase().as_str() {
        "CSSRS" | "C-SSRS" => scoring::cssrs_questions(),
        other => other
            .parse::<AssessmentType>()
            .map(scoring::questions_for)
            .unwrap_or_default(),
    };
    if questions.is_empty() {
        return Err(ApiError::not_found(format!("No questions available for {kind}")));
    }
    Ok(types::list(questions))
}
