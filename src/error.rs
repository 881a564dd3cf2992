use crate::db::DatabaseError;

/// Errors from the workflow modules (sessions, crisis, consent, ...).
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(DatabaseError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} cannot move from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{entity} {id} is signed and can no longer be changed")]
    Immutable { entity: &'static str, id: String },
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn transition(entity: &'static str, from: impl ToString, to: impl ToString) -> Self {
        Self::InvalidTransition {
            entity,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }
}

impl From<DatabaseError> for ServiceError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity_type, id } => Self::NotFound {
                entity: entity_name(&entity_type),
                id,
            },
            other => Self::Database(other),
        }
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::Sqlite(err))
    }
}

fn entity_name(entity_type: &str) -> &'static str {
    match entity_type {
        "TherapySession" => "Session",
        "CrisisIntervention" => "Crisis",
        "TreatmentPlan" => "Treatment plan",
        "TreatmentGoal" => "Goal",
        "SupportGroup" => "Support group",
        "SupportGroupMember" => "Membership",
        "GroupSession" => "Group session",
        "ConsentRecord" => "Consent",
        "PsychMedication" => "Medication",
        "ProgressNote" => "Progress note",
        "MentalHealthAssessment" => "Assessment",
        _ => "Record",
    }
}
