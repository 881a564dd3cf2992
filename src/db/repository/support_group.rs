use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{json_from_sql, parse_ts, parse_uuid, ts};
use crate::db::DatabaseError;
use crate::models::enums::MembershipStatus;
use crate::models::*;

const GROUP_COLUMNS: &str = "id, name, description, type, facilitator_id, schedule,
     max_members, is_active, created_at, updated_at";

pub fn insert_support_group(conn: &Connection, g: &SupportGroup) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO support_groups (id, name, description, type, facilitator_id, schedule,
         max_members, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            g.id.to_string(),
            g.name,
            g.description,
            g.group_type,
            g.facilitator_id,
            serde_json::to_string(&g.schedule)?,
            g.max_members,
            g.is_active as i32,
            ts(&g.created_at),
            ts(&g.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_support_group(conn: &Connection, id: &Uuid) -> Result<Option<SupportGroup>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {GROUP_COLUMNS} FROM support_groups WHERE id = ?1"),
            params![id.to_string()],
            group_row_from_rusqlite,
        )
        .optional()?;
    row.map(group_from_row).transpose()
}

pub fn list_support_groups(conn: &Connection, active_only: bool) -> Result<Vec<SupportGroup>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {GROUP_COLUMNS} FROM support_groups
         WHERE (?1 = 0 OR is_active = 1) ORDER BY name ASC"
    ))?;
    let rows = stmt.query_map(params![active_only as i32], group_row_from_rusqlite)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(group_from_row(row?)?);
    }
    Ok(out)
}

// ═══════════════════════════════════════════
// Memberships
// ═══════════════════════════════════════════

pub fn insert_group_member(conn: &Connection, m: &SupportGroupMember) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO support_group_members (id, group_id, patient_id, joined_at, status)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            m.id.to_string(),
            m.group_id.to_string(),
            m.patient_id,
            ts(&m.joined_at),
            m.status.as_str(),
        ],
    )?;
    Ok(())
}

pub fn get_group_membership(
    conn: &Connection,
    group_id: &Uuid,
    patient_id: &str,
) -> Result<Option<SupportGroupMember>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, group_id, patient_id, joined_at, status
             FROM support_group_members WHERE group_id = ?1 AND patient_id = ?2",
            params![group_id.to_string(), patient_id],
            member_row_from_rusqlite,
        )
        .optional()?;
    row.map(member_from_row).transpose()
}

pub fn update_member_status(
    conn: &Connection,
    member_id: &Uuid,
    status: MembershipStatus,
    joined_at: Option<&chrono::DateTime<chrono::Utc>>,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE support_group_members SET status = ?2, joined_at = COALESCE(?3, joined_at)
         WHERE id = ?1",
        params![member_id.to_string(), status.as_str(), joined_at.map(ts)],
    )?;
    if updated == 0 {
        return Err(DatabaseError::not_found("SupportGroupMember", member_id));
    }
    Ok(())
}

pub fn count_active_members(conn: &Connection, group_id: &Uuid) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM support_group_members WHERE group_id = ?1 AND status = 'active'",
        params![group_id.to_string()],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(count)
}

/// Members of a group in join order.
pub fn list_group_members(
    conn: &Connection,
    group_id: &Uuid,
    active_only: bool,
) -> Result<Vec<SupportGroupMember>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, group_id, patient_id, joined_at, status FROM support_group_members
         WHERE group_id = ?1 AND (?2 = 0 OR status = 'active')
         ORDER BY joined_at ASC",
    )?;
    let rows = stmt.query_map(
        params![group_id.to_string(), active_only as i32],
        member_row_from_rusqlite,
    )?;
    let mut out = Vec::new();
    for row in rows {
        out.push(member_from_row(row?)?);
    }
    Ok(out)
}

// Internal row types
struct GroupRow {
    id: String,
    name: String,
    description: Option<String>,
    group_type: String,
    facilitator_id: String,
    schedule: String,
    max_members: i32,
    is_active: i32,
    created_at: String,
    updated_at: String,
}

fn group_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<GroupRow, rusqlite::Error> {
    Ok(GroupRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        group_type: row.get(3)?,
        facilitator_id: row.get(4)?,
        schedule: row.get(5)?,
        max_members: row.get(6)?,
        is_active: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn group_from_row(row: GroupRow) -> Result<SupportGroup, DatabaseError> {
    Ok(SupportGroup {
        id: parse_uuid(&row.id)?,
        name: row.name,
        description: row.description,
        group_type: row.group_type,
        facilitator_id: row.facilitator_id,
        schedule: json_from_sql(&row.schedule)?,
        max_members: row.max_members,
        is_active: row.is_active != 0,
        created_at: parse_ts(&row.created_at)?,
        updated_at: parse_ts(&row.updated_at)?,
    })
}

struct MemberRow {
    id: String,
    group_id: String,
    patient_id: String,
    joined_at: String,
    status: String,
}

fn member_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<MemberRow, rusqlite::Error> {
    Ok(MemberRow {
        id: row.get(0)?,
        group_id: row.get(1)?,
        patient_id: row.get(2)?,
        joined_at: row.get(3)?,
        status: row.get(4)?,
    })
}

fn member_from_row(row: MemberRow) -> Result<SupportGroupMember, DatabaseError> {
    Ok(SupportGroupMember {
        id: parse_uuid(&row.id)?,
        group_id: parse_uuid(&row.group_id)?,
        patient_id: row.patient_id,
        joined_at: parse_ts(&row.joined_at)?,
        status: MembershipStatus::from_str(&row.status)?,
    })
}
