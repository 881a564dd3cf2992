//! Repository layer: entity-scoped database operations.
//!
//! One sub-module per aggregate. Functions take a borrowed `Connection`
//! and return `DatabaseError`; workflow rules live in the domain modules.

mod assessment;
mod audit;
mod consent;
mod crisis;
mod group_session;
mod medication;
mod mood;
mod progress_note;
mod support_group;
mod therapy_session;
mod treatment;

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use super::DatabaseError;

pub use assessment::*;
pub use audit::*;
pub use consent::*;
pub use crisis::*;
pub use group_session::*;
pub use medication::*;
pub use mood::*;
pub use progress_note::*;
pub use support_group::*;
pub use therapy_session::*;
pub use treatment::*;

// ═══════════════════════════════════════════
// Column codecs: TEXT storage for ids, instants and lists
// ═══════════════════════════════════════════

/// Fixed-width RFC 3339 so TEXT comparison orders chronologically.
pub fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn opt_ts(dt: &Option<DateTime<Utc>>) -> Option<String> {
    dt.as_ref().map(ts)
}

pub(crate) fn parse_ts(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| DatabaseError::ConstraintViolation(format!("invalid timestamp '{s}': {e}")))
}

pub(crate) fn parse_opt_ts(s: Option<String>) -> Result<Option<DateTime<Utc>>, DatabaseError> {
    s.as_deref().map(parse_ts).transpose()
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

pub(crate) fn list_to_sql(items: &[String]) -> Result<String, DatabaseError> {
    Ok(serde_json::to_string(items)?)
}

pub(crate) fn list_from_sql(s: &str) -> Result<Vec<String>, DatabaseError> {
    Ok(serde_json::from_str(s)?)
}

pub(crate) fn json_from_sql(s: &str) -> Result<serde_json::Value, DatabaseError> {
    Ok(serde_json::from_str(s)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_sort_as_text() {
        let early = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2026, 11, 20, 17, 30, 0).unwrap();
        assert!(ts(&early) < ts(&late));
        assert_eq!(parse_ts(&ts(&late)).unwrap(), late);
    }

    #[test]
    fn malformed_columns_surface_as_errors() {
        assert!(parse_ts("yesterday").is_err());
        assert!(parse_uuid("not-a-uuid").is_err());
        assert!(list_from_sql("{oops").is_err());
    }
}
