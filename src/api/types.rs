//! Shared types for the HTTP API layer.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::core_state::CoreState;
use crate::models::enums::UserRole;

// ═══════════════════════════════════════════════════════════
// API context: shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }
}

// ═══════════════════════════════════════════════════════════
// User context: injected by auth middleware
// ═══════════════════════════════════════════════════════════

/// Caller identity forwarded by the gateway, injected into request
/// extensions by the auth middleware.
#[derive(Debug, Clone)]
pub struct UserContext {
    pub user_id: String,
    pub role: UserRole,
}

impl UserContext {
    pub fn is_patient(&self) -> bool {
        self.role == UserRole::Patient
    }

    pub fn is_provider(&self) -> bool {
        self.role == UserRole::Provider
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Providers and admins.
    pub fn is_clinical(&self) -> bool {
        matches!(self.role, UserRole::Provider | UserRole::Admin)
    }

    /// Fail unless the caller is a provider.
    pub fn require_provider(&self, msg: &str) -> Result<(), ApiError> {
        if self.is_provider() {
            Ok(())
        } else {
            Err(ApiError::forbidden(msg))
        }
    }

    /// Patients may only touch their own records; clinical roles pass.
    pub fn require_self_or_clinical(&self, patient_id: &str) -> Result<(), ApiError> {
        if self.is_clinical() || self.user_id == patient_id {
            Ok(())
        } else {
            Err(ApiError::forbidden("Access denied"))
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Response envelope
// ═══════════════════════════════════════════════════════════

/// `{ "data": ..., "count"?: n, "message"?: ... }`
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

pub type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;
pub type Created<T> = Result<(StatusCode, Json<Envelope<T>>), ApiError>;

pub fn data<T>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        data,
        count: None,
        message: None,
    })
}

pub fn list<T>(items: Vec<T>) -> Json<Envelope<Vec<T>>> {
    let count = items.len();
    Json(Envelope {
        data: items,
        count: Some(count),
        message: None,
    })
}

pub fn with_message<T>(data: T, message: &'static str) -> Json<Envelope<T>> {
    Json(Envelope {
        data,
        count: None,
        message: Some(message),
    })
}

pub fn created<T>(data: T, message: &'static str) -> (StatusCode, Json<Envelope<T>>) {
    (StatusCode::CREATED, with_message(data, message))
}

/// Parse a path identifier.
pub fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request("Invalid ID format"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole) -> UserContext {
        UserContext {
            user_id: "u1".into(),
            role,
        }
    }

    #[test]
    fn clinical_roles() {
        assert!(user(UserRole::Provider).is_clinical());
        assert!(user(UserRole::Admin).is_clinical());
        assert!(!user(UserRole::Patient).is_clinical());
    }

    #[test]
    fn patients_only_reach_their_own_records() {
        let patient = user(UserRole::Patient);
        assert!(patient.require_self_or_clinical("u1").is_ok());
        assert!(patient.require_self_or_clinical("someone-else").is_err());
        assert!(user(UserRole::Provider).require_self_or_clinical("anyone").is_ok());
    }

    #[test]
    fn list_envelope_carries_count() {
        let json = serde_json::to_value(list(vec![1, 2, 3]).0).unwrap();
        assert_eq!(json["count"], 3);
        assert!(json.get("message").is_none());
    }

    #[test]
    fn malformed_id_is_bad_request() {
        assert!(matches!(parse_id("nope"), Err(ApiError::BadRequest(_))));
        assert!(parse_id(&Uuid::new_v4().to_string()).is_ok());
    }
}
