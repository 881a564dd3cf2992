//! Audit logging middleware.
//!
//! Records every authenticated request (user, role, method, path,
//! response status) and, when the path names one, the patient whose
//! records were touched. Runs innermost, after identity is injected.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::{ApiContext, UserContext};
use crate::db::repository::AuditEntry;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    let ctx = req.extensions().get::<ApiContext>().cloned();
    let user = req.extensions().get::<UserContext>().cloned();

    let response = next.run(req).await;

    if let (Some(ctx), Some(user)) = (ctx, user) {
        let status = response.status().as_u16();
        tracing::info!(
            user = %user.user_id,
            role = %user.role,
            %method,
            %path,
            status,
            "API request"
        );
        ctx.core.log_access(AuditEntry {
            timestamp: chrono::Utc::now(),
            patient_id: patient_in_path(&path).map(str::to_string),
            user_id: user.user_id,
            role: user.role.to_string(),
            action: format!("{method} {path}"),
            outcome: format!("status:{status}"),
        });
    }

    response
}

/// The segment after `/patient/` in routes like `/api/mood/patient/:id`.
fn patient_in_path(path: &str) -> Option<&str> {
    let mut segments = path.split('/');
    segments.find(|s| *s == "patient")?;
    segments.next().filter(|s| !s.is_empty())
}
