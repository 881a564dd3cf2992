//! Clinical progress notes.
//!
//! Only the authoring provider edits or signs a note. Once signed a note is
//! frozen; the schema trigger backs this up for writers that bypass this
//! module.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::consent;
use crate::db::repository;
use crate::error::ServiceError;
use crate::models::enums::{ConsentType, NoteType};
use crate::models::ProgressNote;
use crate::sessions;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNote {
    pub patient_id: String,
    pub session_id: Option<Uuid>,
    pub note_type: NoteType,
    pub content: String,
    #[serde(default)]
    pub diagnosis: Vec<String>,
    #[serde(default)]
    pub interventions: Vec<String>,
    pub plan: Option<String>,
    #[serde(default = "default_true")]
    pub is_confidential: bool,
    /// Consent captured on paper at the point of care.
    #[serde(default)]
    pub consent_signed: bool,
}

/// Body for a note attached to a therapy session; the patient comes from the session.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionNote {
    pub note_type: NoteType,
    pub content: String,
    #[serde(default)]
    pub diagnosis: Vec<String>,
    #[serde(default)]
    pub interventions: Vec<String>,
    pub plan: Option<String>,
    #[serde(default = "default_true")]
    pub is_confidential: bool,
    #[serde(default)]
    pub consent_signed: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteUpdate {
    pub note_type: Option<NoteType>,
    pub content: Option<String>,
    pub diagnosis: Option<Vec<String>>,
    pub interventions: Option<Vec<String>>,
    pub plan: Option<String>,
    #[serde(default)]
    pub sign: bool,
}

fn validate_content(content: &str) -> Result<(), ServiceError> {
    if content.trim().is_empty() {
        return Err(ServiceError::validation("Note content cannot be empty"));
    }
    Ok(())
}

fn ensure_consent(
    conn: &Connection,
    patient_id: &str,
    provider_id: &str,
    is_confidential: bool,
    consent_signed: bool,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    if !is_confidential || consent_signed {
        return Ok(());
    }
    if !consent::has_valid_consent(conn, patient_id, provider_id, ConsentType::Treatment, now)? {
        return Err(ServiceError::forbidden("Valid consent required for confidential notes"));
    }
    Ok(())
}

pub fn create_note(
    conn: &Connection,
    provider_id: &str,
    input: NewNote,
    now: DateTime<Utc>,
) -> Result<ProgressNote, ServiceError> {
    validate_content(&input.content)?;
    ensure_consent(
        conn,
        &input.patient_id,
        provider_id,
        input.is_confidential,
        input.consent_signed,
        now,
    )?;
    if let Some(session_id) = &input.session_id {
        let session = sessions::get_session(conn, session_id)?;
        if session.patient_id != input.patient_id {
            return Err(ServiceError::validation("Session belongs to a different patient"));
        }
    }

    let note = ProgressNote {
        id: Uuid::new_v4(),
        patient_id: input.patient_id,
        provider_id: provider_id.to_string(),
        session_id: input.session_id,
        note_type: input.note_type,
        content: input.content,
        diagnosis: input.diagnosis,
        interventions: input.interventions,
        plan: input.plan,
        is_signed: false,
        signed_at: None,
        created_at: now,
        updated_at: now,
    };
    repository::insert_progress_note(conn, &note)?;
    tracing::info!(note_id = %note.id, kind = %note.note_type, "Progress note created");
    Ok(note)
}

/// Attach a note to a therapy session. The caller must be its therapist.
pub fn add_session_note(
    conn: &Connection,
    session_id: &Uuid,
    provider_id: &str,
    input: SessionNote,
    now: DateTime<Utc>,
) -> Result<ProgressNote, ServiceError> {
    let session = sessions::get_session(conn, session_id)?;
    if session.therapist_id != provider_id {
        return Err(ServiceError::forbidden("Only the session therapist can add notes"));
    }
    create_note(
        conn,
        provider_id,
        NewNote {
            patient_id: session.patient_id,
            session_id: Some(session.id),
            note_type: input.note_type,
            content: input.content,
            diagnosis: input.diagnosis,
            interventions: input.interventions,
            plan: input.plan,
            is_confidential: input.is_confidential,
            consent_signed: input.consent_signed,
        },
        now,
    )
}

pub fn get_note(conn: &Connection, id: &Uuid) -> Result<ProgressNote, ServiceError> {
    repository::get_progress_note(conn, id)?.ok_or_else(|| ServiceError::not_found("Progress note", id))
}

pub fn update_note(
    conn: &Connection,
    id: &Uuid,
    provider_id: &str,
    update: NoteUpdate,
    now: DateTime<Utc>,
) -> Result<ProgressNote, ServiceError> {
    let mut note = get_note(conn, id)?;
    if note.provider_id != provider_id {
        return Err(ServiceError::forbidden("Only the note creator can update it"));
    }
    if note.is_signed {
        return Err(ServiceError::Immutable {
            entity: "Progress note",
            id: note.id.to_string(),
        });
    }

    if let Some(note_type) = update.note_type {
        note.note_type = note_type;
    }
    if let Some(content) = update.content {
        validate_content(&content)?;
        note.content = content;
    }
    if let Some(diagnosis) = update.diagnosis {
        note.diagnosis = diagnosis;
    }
    if let Some(interventions) = update.interventions {
        note.interventions = interventions;
    }
    if update.plan.is_some() {
        note.plan = update.plan;
    }
    if update.sign {
        note.is_signed = true;
        note.signed_at = Some(now);
    }

    note.updated_at = now;
    repository::update_progress_note(conn, &note)?;
    if note.is_signed {
        tracing::info!(note_id = %note.id, "Progress note signed");
    }
    Ok(note)
}

pub fn sign_note(
    conn: &Connection,
    id: &Uuid,
    provider_id: &str,
    now: DateTime<Utc>,
) -> Result<ProgressNote, ServiceError> {
    update_note(
        conn,
        id,
        provider_id,
        NoteUpdate {
            sign: true,
            ..Default::default()
        },
        now,
    )
}

pub fn notes_for_patient(conn: &Connection, patient_id: &str) -> Result<Vec<ProgressNote>, ServiceError> {
    Ok(repository::list_progress_notes_for_patient(conn, patient_id)?)
}

pub fn notes_for_session(conn: &Connection, session_id: &Uuid) -> Result<Vec<ProgressNote>, ServiceError> {
    Ok(repository::list_progress_notes_for_session(conn, session_id)?)
}

/// A provider reads a note they wrote, or any note of a patient who has
/// granted them treatment consent.
pub fn provider_can_read(
    conn: &Connection,
    note: &ProgressNote,
    provider_id: &str,
    now: DateTime<Utc>,
) -> Result<bool, ServiceError> {
    if note.provider_id == provider_id {
        return Ok(true);
    }
    consent::has_valid_consent(conn, &note.patient_id, provider_id, ConsentType::Treatment, now)
}
