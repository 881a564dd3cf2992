//! HTTP router.
//!
//! `/health` and `/api/crisis/hotlines/info` are public. Everything else
//! under `/api/` passes the middleware stack (outermost → innermost):
//! 1. Identity → 2. Audit logger

use std::sync::Arc;

use axum::http::{header, HeaderValue};
use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints::{
    assessments, consents, crisis, group_sessions, groups, health, medications, mood,
    progress_notes, sessions, treatment_plans,
};
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the full API router.
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

fn build_router(ctx: ApiContext) -> Router {
    // Layers are applied from bottom (innermost) to top (outermost):
    //   Extension (outermost) → Identity → Audit (innermost) → Handler
    //
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route("/sessions", get(sessions::list).post(sessions::create))
        .route(
            "/sessions/:id",
            get(sessions::detail)
                .patch(sessions::update)
                .delete(sessions::cancel),
        )
        .route("/assessments", post(assessments::create))
        .route("/assessments/patient/:id", get(assessments::for_patient))
        .route("/assessments/questions/:type", get(assessments::questions))
        .route("/assessments/:id", get(assessments::detail))
        .route("/crisis", get(crisis::list).post(crisis::create))
        .route("/crisis/active/dashboard", get(crisis::dashboard))
        .route("/crisis/:id", get(crisis::detail).patch(crisis::update))
        .route("/treatment-plans", post(treatment_plans::create))
        .route(
            "/treatment-plans/patient/:id",
            get(treatment_plans::active_for_patient),
        )
        .route(
            "/treatment-plans/goals/:goal_id",
            patch(treatment_plans::update_goal),
        )
        .route(
            "/treatment-plans/:id",
            get(treatment_plans::detail).patch(treatment_plans::update),
        )
        .route("/treatment-plans/:id/goals", post(treatment_plans::add_goal))
        .route("/treatment-plans/:id/progress", get(treatment_plans::progress))
        .route("/mood", get(mood::list).post(mood::create))
        .route("/mood/summary", get(mood::summary))
        .route("/groups", get(groups::list).post(groups::create))
        .route("/groups/:id", get(groups::detail))
        .route("/groups/:id/join", post(groups::join))
        .route("/groups/:id/leave", post(groups::leave))
        .route(
            "/group-sessions",
            get(group_sessions::list).post(group_sessions::create),
        )
        .route(
            "/group-sessions/:id",
            get(group_sessions::detail).patch(group_sessions::update),
        )
        .route(
            "/group-sessions/:id/attendance",
            post(group_sessions::attendance),
        )
        .route(
            "/group-sessions/patient/:id/sessions",
            get(group_sessions::for_patient),
        )
        .route("/consents", get(consents::list).post(consents::grant))
        .route("/consents/emergency", post(consents::emergency))
        .route("/consents/validate", get(consents::validate))
        .route("/consents/:id/revoke", post(consents::revoke))
        .route(
            "/medications",
            get(medications::list).post(medications::create),
        )
        .route("/medications/:id", patch(medications::update))
        .route("/progress-notes", post(progress_notes::create))
        .route(
            "/progress-notes/patient/:id",
            get(progress_notes::for_patient),
        )
        .route(
            "/progress-notes/session/:id",
            get(progress_notes::for_session),
        )
        .route(
            "/progress-notes/sessions/:session_id/notes",
            post(progress_notes::add_to_session),
        )
        .route(
            "/progress-notes/:id",
            get(progress_notes::detail).patch(progress_notes::update),
        )
        .route("/progress-notes/:id/sign", post(progress_notes::sign))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_identity))
        .layer(axum::Extension(ctx.clone()));

    // Crisis lines stay reachable without identity
    let public = Router::new()
        .route("/crisis/hotlines/info", get(crisis::hotlines))
        .with_state(ctx.clone());

    Router::new()
        .route("/health", get(health::check))
        .with_state(ctx)
        .nest("/api", protected.merge(public))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
}
