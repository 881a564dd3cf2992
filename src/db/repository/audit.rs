use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection};

use super::ts;
use crate::db::DatabaseError;

/// One request recorded by the audit middleware.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub role: String,
    pub action: String,
    pub outcome: String,
    /// Which patient's records were touched, when the path names one.
    pub patient_id: Option<String>,
}

/// Insert a batch of audit entries into the audit_log table.
/// The batch is written atomically: on error no row of it is kept.
pub fn insert_audit_entries(conn: &Connection, entries: &[AuditEntry]) -> Result<(), DatabaseError> {
    let tx = crate::db::write_transaction(conn)?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO audit_log (timestamp, user_id, role, action, outcome, patient_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for e in entries {
            stmt.execute(params![
                ts(&e.timestamp),
                e.user_id,
                e.role,
                e.action,
                e.outcome,
                e.patient_id
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

/// Prune audit entries older than the given number of days.
pub fn prune_audit_log(conn: &Connection, retention_days: i64) -> Result<usize, DatabaseError> {
    let cutoff = Utc::now() - Duration::days(retention_days);
    let deleted = conn.execute(
        "DELETE FROM audit_log WHERE timestamp < ?1",
        params![ts(&cutoff)],
    )?;
    Ok(deleted)
}

/// Audit entries for a user within the last N days, newest first.
/// Returns (timestamp, action, outcome) tuples.
#[cfg(test)]
pub fn query_audit_by_user(
    conn: &Connection,
    user_id: &str,
    days: i64,
) -> Result<Vec<(String, String, String)>, DatabaseError> {
    let since = Utc::now() - Duration::days(days);
    let mut stmt = conn.prepare(
        "SELECT timestamp, action, outcome FROM audit_log
         WHERE user_id = ?1 AND timestamp >= ?2
         ORDER BY timestamp DESC",
    )?;
    let rows = stmt
        .query_map(params![user_id, ts(&since)], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn entry(user: &str, age_days: i64) -> AuditEntry {
        AuditEntry {
            timestamp: Utc::now() - Duration::days(age_days),
            user_id: user.into(),
            role: "provider".into(),
            action: "GET /api/progress-notes/patient/p1".into(),
            outcome: "status:200".into(),
            patient_id: Some("p1".into()),
        }
    }

    #[test]
    fn prune_removes_only_expired_entries() {
        let conn = open_memory_database().unwrap();
        insert_audit_entries(&conn, &[entry("dr-a", 200), entry("dr-a", 1)]).unwrap();

        let deleted = prune_audit_log(&conn, 90).unwrap();
        assert_eq!(deleted, 1);
        let remaining = query_audit_by_user(&conn, "dr-a", 365).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].2, "status:200");
    }
}
