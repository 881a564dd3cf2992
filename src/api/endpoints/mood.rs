//! Mood log endpoints. Patients write their own journal; clinicians read
//! it by passing `patientId`.

use axum::extract::{Query, State};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{self, ApiContext, ApiResult, Created, UserContext};
use crate::models::{MoodFilter, MoodLog};
use crate::mood::{self, MoodSummary, NewMoodLog};

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MoodQuery {
    pub patient_id: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

impl MoodQuery {
    /// Whose journal the caller is asking for.
    fn subject(&self, user: &UserContext) -> Result<String, ApiError> {
        if user.is_patient() {
            return Ok(user.user_id.clone());
        }
        self.patient_id
            .clone()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| ApiError::bad_request("patientId is required"))
    }
}

/// `POST /api/mood`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(body): Json<NewMoodLog>,
) -> Created<MoodLog> {
    if !user.is_patient() {
        return Err(ApiError::forbidden("Only patients can log mood"));
    }
    let conn = ctx.core.open_db()?;
    let log = mood::record_mood(&conn, &user.user_id, body, Utc::now())?;
    Ok(types::created(log, "Mood logged successfully"))
}

/// `GET /api/mood`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Query(query): Query<MoodQuery>,
) -> ApiResult<Vec<MoodLog>> {
    let patient_id = query.subject(&user)?;
    let filter = MoodFilter {
        date_from: query.start_date,
        date_to: query.end_date,
        limit: query.limit,
    };
    let conn = ctx.core.open_db()?;
    Ok(types::list(mood::mood_history(&conn, &patient_id, &filter)?))
}

/// `GET /api/mood/summary`
pub async fn summary(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Query(query): Query<MoodQuery>,
) -> ApiResult<MoodSummary> {
    let patient_id = query.subject(&user)?;
    let conn = ctx.core.open_db()?;
    let summary = mood::mood_summary(&conn, &patient_id, query.start_date, query.end_date)?;
    Ok(types::data(summary))
}
