use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{json_from_sql, list_from_sql, list_to_sql, opt_ts, parse_opt_ts, parse_ts, parse_uuid, ts};
use crate::db::DatabaseError;
use crate::models::enums::{PlanStatus, TreatmentGoalStatus};
use crate::models::*;

const PLAN_COLUMNS: &str = "id, patient_id, provider_id, diagnosis, goals, interventions,
     medications, frequency, start_date, review_date, status, created_at, updated_at";

const GOAL_COLUMNS: &str = "id, treatment_plan_id, title, description, target_date, status,
     progress, interventions, strategies, measurements, notes, created_at, updated_at";

// ═══════════════════════════════════════════
// Treatment plans
// ═══════════════════════════════════════════

pub fn insert_treatment_plan(conn: &Connection, p: &TreatmentPlan) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO treatment_plans (id, patient_id, provider_id, diagnosis, goals, interventions,
         medications, frequency, start_date, review_date, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            p.id.to_string(),
            p.patient_id,
            p.provider_id,
            list_to_sql(&p.diagnosis)?,
            serde_json::to_string(&p.goals)?,
            serde_json::to_string(&p.interventions)?,
            p.medications.as_ref().map(serde_json::to_string).transpose()?,
            p.frequency,
            ts(&p.start_date),
            ts(&p.review_date),
            p.status.as_str(),
            ts(&p.created_at),
            ts(&p.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_treatment_plan(conn: &Connection, id: &Uuid) -> Result<Option<TreatmentPlan>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {PLAN_COLUMNS} FROM treatment_plans WHERE id = ?1"),
            params![id.to_string()],
            plan_row_from_rusqlite,
        )
        .optional()?;
    row.map(plan_from_row).transpose()
}

pub fn update_treatment_plan(conn: &Connection, p: &TreatmentPlan) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE treatment_plans SET diagnosis = ?2, goals = ?3, interventions = ?4,
         medications = ?5, frequency = ?6, review_date = ?7, status = ?8, updated_at = ?9
         WHERE id = ?1",
        params![
            p.id.to_string(),
            list_to_sql(&p.diagnosis)?,
            serde_json::to_string(&p.goals)?,
            serde_json::to_string(&p.interventions)?,
            p.medications.as_ref().map(serde_json::to_string).transpose()?,
            p.frequency,
            ts(&p.review_date),
            p.status.as_str(),
            ts(&p.updated_at),
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::not_found("TreatmentPlan", p.id));
    }
    Ok(())
}

pub fn list_treatment_plans_for_patient(
    conn: &Connection,
    patient_id: &str,
) -> Result<Vec<TreatmentPlan>, DatabaseError> {
    query_plans(
        conn,
        &format!("SELECT {PLAN_COLUMNS} FROM treatment_plans WHERE patient_id = ?1 ORDER BY created_at DESC"),
        &[&patient_id],
    )
}

/// Most recently created active plan for the patient.
pub fn latest_active_plan(conn: &Connection, patient_id: &str) -> Result<Option<TreatmentPlan>, DatabaseError> {
    let plans = query_plans(
        conn,
        &format!(
            "SELECT {PLAN_COLUMNS} FROM treatment_plans
             WHERE patient_id = ?1 AND status = 'active'
             ORDER BY created_at DESC LIMIT 1"
        ),
        &[&patient_id],
    )?;
    Ok(plans.into_iter().next())
}

/// Active plans whose review date has arrived.
pub fn plans_due_for_review(
    conn: &Connection,
    now: DateTime<Utc>,
) -> Result<Vec<TreatmentPlan>, DatabaseError> {
    let now = ts(&now);
    query_plans(
        conn,
        &format!(
            "SELECT {PLAN_COLUMNS} FROM treatment_plans
             WHERE status = 'active' AND review_date <= ?1
             ORDER BY review_date ASC"
        ),
        &[&now],
    )
}

fn query_plans(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::types::ToSql],
) -> Result<Vec<TreatmentPlan>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, plan_row_from_rusqlite)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(plan_from_row(row?)?);
    }
    Ok(out)
}

// ═══════════════════════════════════════════
// Treatment goals
// ═══════════════════════════════════════════

pub fn insert_treatment_goal(conn: &Connection, g: &TreatmentGoal) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO treatment_goals (id, treatment_plan_id, title, description, target_date,
         status, progress, interventions, strategies, measurements, notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            g.id.to_string(),
            g.treatment_plan_id.to_string(),
            g.title,
            g.description,
            opt_ts(&g.target_date),
            g.status.as_str(),
            g.progress,
            list_to_sql(&g.interventions)?,
            list_to_sql(&g.strategies)?,
            list_to_sql(&g.measurements)?,
            g.notes,
            ts(&g.created_at),
            ts(&g.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_treatment_goal(conn: &Connection, id: &Uuid) -> Result<Option<TreatmentGoal>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {GOAL_COLUMNS} FROM treatment_goals WHERE id = ?1"),
            params![id.to_string()],
            goal_row_from_rusqlite,
        )
        .optional()?;
    row.map(goal_from_row).transpose()
}

pub fn update_treatment_goal(conn: &Connection, g: &TreatmentGoal) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE treatment_goals SET title = ?2, description = ?3, target_date = ?4, status = ?5,
         progress = ?6, interventions = ?7, strategies = ?8, measurements = ?9, notes = ?10,
         updated_at = ?11
         WHERE id = ?1",
        params![
            g.id.to_string(),
            g.title,
            g.description,
            opt_ts(&g.target_date),
            g.status.as_str(),
            g.progress,
            list_to_sql(&g.interventions)?,
            list_to_sql(&g.strategies)?,
            list_to_sql(&g.measurements)?,
            g.notes,
            ts(&g.updated_at),
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::not_found("TreatmentGoal", g.id));
    }
    Ok(())
}

/// Goals of a plan in creation order.
pub fn goals_for_plan(conn: &Connection, plan_id: &Uuid) -> Result<Vec<TreatmentGoal>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {GOAL_COLUMNS} FROM treatment_goals
         WHERE treatment_plan_id = ?1 ORDER BY created_at ASC, rowid ASC"
    ))?;
    let rows = stmt.query_map(params![plan_id.to_string()], goal_row_from_rusqlite)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(goal_from_row(row?)?);
    }
    Ok(out)
}

// Internal row types
struct PlanRow {
    id: String,
    patient_id: String,
    provider_id: String,
    diagnosis: String,
    goals: String,
    interventions: String,
    medications: Option<String>,
    frequency: Option<String>,
    start_date: String,
    review_date: String,
    status: String,
    created_at: String,
    updated_at: String,
}

fn plan_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<PlanRow, rusqlite::Error> {
    Ok(PlanRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        provider_id: row.get(2)?,
        diagnosis: row.get(3)?,
        goals: row.get(4)?,
        interventions: row.get(5)?,
        medications: row.get(6)?,
        frequency: row.get(7)?,
        start_date: row.get(8)?,
        review_date: row.get(9)?,
        status: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn plan_from_row(row: PlanRow) -> Result<TreatmentPlan, DatabaseError> {
    Ok(TreatmentPlan {
        id: parse_uuid(&row.id)?,
        patient_id: row.patient_id,
        provider_id: row.provider_id,
        diagnosis: list_from_sql(&row.diagnosis)?,
        goals: json_from_sql(&row.goals)?,
        interventions: json_from_sql(&row.interventions)?,
        medications: row.medications.as_deref().map(json_from_sql).transpose()?,
        frequency: row.frequency,
        start_date: parse_ts(&row.start_date)?,
        review_date: parse_ts(&row.review_date)?,
        status: PlanStatus::from_str(&row.status)?,
        created_at: parse_ts(&row.created_at)?,
        updated_at: parse_ts(&row.updated_at)?,
    })
}

struct GoalRow {
    id: String,
    treatment_plan_id: String,
    title: String,
    description: Option<String>,
    target_date: Option<String>,
    status: String,
    progress: i32,
    interventions: String,
    strategies: String,
    measurements: String,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
}

fn goal_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<GoalRow, rusqlite::Error> {
    Ok(GoalRow {
        id: row.get(0)?,
        treatment_plan_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        target_date: row.get(4)?,
        status: row.get(5)?,
        progress: row.get(6)?,
        interventions: row.get(7)?,
        strategies: row.get(8)?,
        measurements: row.get(9)?,
        notes: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn goal_from_row(row: GoalRow) -> Result<TreatmentGoal, DatabaseError> {
    Ok(TreatmentGoal {
        id: parse_uuid(&row.id)?,
        treatment_plan_id: parse_uuid(&row.treatment_plan_id)?,
        title: row.title,
        description: row.description,
        target_date: parse_opt_ts(row.target_date)?,
        status: TreatmentGoalStatus::from_str(&row.status)?,
        progress: row.progress,
        interventions: list_from_sql(&row.interventions)?,
        strategies: list_from_sql(&row.strategies)?,
        measurements: list_from_sql(&row.measurements)?,
        notes: row.notes,
        created_at: parse_ts(&row.created_at)?,
        updated_at: parse_ts(&row.updated_at)?,
    })
}
