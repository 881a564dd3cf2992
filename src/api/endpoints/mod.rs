//! API endpoint handlers, one module per resource.
//! Handlers resolve access rules and delegate to the workflow modules.

pub mod assessments;
pub mod consents;
pub mod crisis;
pub mod group_sessions;
pub mod groups;
pub mod health;
pub mod medications;
pub mod mood;
pub mod progress_notes;
pub mod sessions;
pub mod treatment_plans;
