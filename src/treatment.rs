//! Treatment plans and goal progress tracking.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::db::{self, repository};
use crate::error::ServiceError;
use crate::models::enums::{PlanStatus, TreatmentGoalStatus};
use crate::models::{TreatmentGoal, TreatmentPlan};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGoal {
    pub description: String,
    pub target_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub strategies: Vec<String>,
    #[serde(default)]
    pub measurements: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPlan {
    pub patient_id: String,
    #[serde(default)]
    pub diagnosis: Vec<String>,
    #[serde(default = "empty_object")]
    pub interventions: Value,
    pub medications: Option<Value>,
    pub frequency: Option<String>,
    pub start_date: DateTime<Utc>,
    pub review_date: DateTime<Utc>,
    #[serde(default)]
    pub goals: Vec<NewGoal>,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanUpdate {
    pub diagnosis: Option<Vec<String>>,
    pub interventions: Option<Value>,
    pub medications: Option<Value>,
    pub frequency: Option<String>,
    pub review_date: Option<DateTime<Utc>>,
    pub status: Option<PlanStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalUpdate {
    pub progress: Option<i32>,
    pub status: Option<TreatmentGoalStatus>,
    pub barriers: Option<Vec<String>>,
    pub strategies: Option<Vec<String>>,
}

/// A goal after a progress update, with the barriers reported in it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedGoal {
    #[serde(flatten)]
    pub goal: TreatmentGoal,
    pub barriers: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanWithGoals {
    #[serde(flatten)]
    pub plan: TreatmentPlan,
    pub treatment_goals: Vec<TreatmentGoal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanProgress {
    pub total_goals: usize,
    pub achieved_goals: usize,
    pub in_progress_goals: usize,
    pub overall_progress: i32,
}

fn validate_progress(progress: i32) -> Result<(), ServiceError> {
    if !(0..=100).contains(&progress) {
        return Err(ServiceError::validation(format!(
            "Progress must be between 0 and 100, got {progress}"
        )));
    }
    Ok(())
}

fn build_goal(plan_id: Uuid, input: NewGoal, now: DateTime<Utc>) -> Result<TreatmentGoal, ServiceError> {
    if input.description.trim().is_empty() {
        return Err(ServiceError::validation("Goal description is required"));
    }
    Ok(TreatmentGoal {
        id: Uuid::new_v4(),
        treatment_plan_id: plan_id,
        title: input.description.clone(),
        description: Some(input.description),
        target_date: input.target_date,
        status: TreatmentGoalStatus::InProgress,
        progress: 0,
        interventions: Vec::new(),
        strategies: input.strategies,
        measurements: input.measurements,
        notes: None,
        created_at: now,
        updated_at: now,
    })
}

/// Create a plan and its initial goals atomically.
pub fn create_plan(
    conn: &Connection,
    provider_id: &str,
    input: NewPlan,
    now: DateTime<Utc>,
) -> Result<PlanWithGoals, ServiceError> {
    if input.review_date < input.start_date {
        return Err(ServiceError::validation("Review date must not precede start date"));
    }

    let plan_id = Uuid::new_v4();
    let goals = input
        .goals
        .into_iter()
        .map(|g| build_goal(plan_id, g, now))
        .collect::<Result<Vec<_>, _>>()?;
    let summary: Vec<&str> = goals.iter().map(|g| g.title.as_str()).collect();

    let plan = TreatmentPlan {
        id: plan_id,
        patient_id: input.patient_id,
        provider_id: provider_id.to_string(),
        diagnosis: input.diagnosis,
        goals: serde_json::json!(summary),
        interventions: input.interventions,
        medications: input.medications,
        frequency: input.frequency,
        start_date: input.start_date,
        review_date: input.review_date,
        status: PlanStatus::Active,
        created_at: now,
        updated_at: now,
    };

    let tx = db::write_transaction(conn)?;
    repository::insert_treatment_plan(&tx, &plan)?;
    for goal in &goals {
        repository::insert_treatment_goal(&tx, goal)?;
    }
    tx.commit()?;

    tracing::info!(plan_id = %plan.id, goals = goals.len(), "Treatment plan created");
    Ok(PlanWithGoals {
        plan,
        treatment_goals: goals,
    })
}

pub fn get_plan(conn: &Connection, id: &Uuid) -> Result<TreatmentPlan, ServiceError> {
    repository::get_treatment_plan(conn, id)?.ok_or_else(|| ServiceError::not_found("Treatment plan", id))
}

pub fn plan_with_goals(conn: &Connection, id: &Uuid) -> Result<PlanWithGoals, ServiceError> {
    let plan = get_plan(conn, id)?;
    let treatment_goals = repository::goals_for_plan(conn, id)?;
    Ok(PlanWithGoals { plan, treatment_goals })
}

/// Most recent active plan for the patient, with its goals.
pub fn active_plan_for_patient(
    conn: &Connection,
    patient_id: &str,
) -> Result<Option<PlanWithGoals>, ServiceError> {
    let Some(plan) = repository::latest_active_plan(conn, patient_id)? else {
        return Ok(None);
    };
    let treatment_goals = repository::goals_for_plan(conn, &plan.id)?;
    Ok(Some(PlanWithGoals { plan, treatment_goals }))
}

pub fn update_plan(
    conn: &Connection,
    id: &Uuid,
    update: PlanUpdate,
    now: DateTime<Utc>,
) -> Result<TreatmentPlan, ServiceError> {
    let mut plan = get_plan(conn, id)?;
    if let Some(diagnosis) = update.diagnosis {
        plan.diagnosis = diagnosis;
    }
    if let Some(interventions) = update.interventions {
        plan.interventions = interventions;
    }
    if update.medications.is_some() {
        plan.medications = update.medications;
    }
    if update.frequency.is_some() {
        plan.frequency = update.frequency;
    }
    if let Some(review_date) = update.review_date {
        if review_date < plan.start_date {
            return Err(ServiceError::validation("Review date must not precede start date"));
        }
        plan.review_date = review_date;
    }
    if let Some(status) = update.status {
        if status != plan.status {
            tracing::info!(plan_id = %plan.id, from = %plan.status, to = %status, "Treatment plan status changed");
        }
        plan.status = status;
    }
    plan.updated_at = now;
    repository::update_treatment_plan(conn, &plan)?;
    Ok(plan)
}

pub fn add_goal(
    conn: &Connection,
    plan_id: &Uuid,
    input: NewGoal,
    now: DateTime<Utc>,
) -> Result<TreatmentGoal, ServiceError> {
    let mut plan = get_plan(conn, plan_id)?;
    let goal = build_goal(*plan_id, input, now)?;

    if let Value::Array(summary) = &mut plan.goals {
        summary.push(Value::String(goal.title.clone()));
    }
    plan.updated_at = now;

    let tx = db::write_transaction(conn)?;
    repository::insert_treatment_goal(&tx, &goal)?;
    repository::update_treatment_plan(&tx, &plan)?;
    tx.commit()?;
    Ok(goal)
}

pub fn get_goal(conn: &Connection, id: &Uuid) -> Result<TreatmentGoal, ServiceError> {
    repository::get_treatment_goal(conn, id)?.ok_or_else(|| ServiceError::not_found("Goal", id))
}

/// Apply a progress update. `achieved` pins progress to 100.
///
/// Goals have no barriers column: reported barriers are appended to the
/// goal's notes as a `Barriers: a, b` line, keeping earlier notes, and are
/// echoed back as a list on the result.
pub fn update_goal(
    conn: &Connection,
    id: &Uuid,
    update: GoalUpdate,
    now: DateTime<Utc>,
) -> Result<UpdatedGoal, ServiceError> {
    let mut goal = get_goal(conn, id)?;

    if let Some(progress) = update.progress {
        validate_progress(progress)?;
        goal.progress = progress;
    }
    if let Some(status) = update.status {
        goal.status = status;
    }
    if goal.status == TreatmentGoalStatus::Achieved {
        goal.progress = 100;
    }
    if let Some(strategies) = update.strategies {
        goal.strategies = strategies;
    }
    let barriers: Vec<String> = update
        .barriers
        .unwrap_or_default()
        .into_iter()
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty())
        .collect();
    if !barriers.is_empty() {
        let line = format!("Barriers: {}", barriers.join(", "));
        goal.notes = Some(match goal.notes.take().filter(|n| !n.trim().is_empty()) {
            Some(notes) => format!("{notes}\n{line}"),
            None => line,
        });
    }

    goal.updated_at = now;
    repository::update_treatment_goal(conn, &goal)?;
    tracing::info!(goal_id = %goal.id, progress = goal.progress, status = %goal.status, "Goal updated");
    Ok(UpdatedGoal { goal, barriers })
}

pub fn summarize_goals(goals: &[TreatmentGoal]) -> PlanProgress {
    let total_goals = goals.len();
    let achieved_goals = goals
        .iter()
        .filter(|g| g.status == TreatmentGoalStatus::Achieved)
        .count();
    let in_progress_goals = goals
        .iter()
        .filter(|g| g.status == TreatmentGoalStatus::InProgress)
        .count();
    let overall_progress = if total_goals == 0 {
        0
    } else {
        let sum: i32 = goals.iter().map(|g| g.progress).sum();
        (sum as f64 / total_goals as f64).round() as i32
    };
    PlanProgress {
        total_goals,
        achieved_goals,
        in_progress_goals,
        overall_progress,
    }
}

pub fn plan_progress(conn: &Connection, plan_id: &Uuid) -> Result<PlanProgress, ServiceError> {
    get_plan(conn, plan_id)?;
    Ok(summarize_goals(&repository::goals_for_plan(conn, plan_id)?))
}

pub fn plans_due_for_review(
    conn: &Connection,
    now: DateTime<Utc>,
) -> Result<Vec<TreatmentPlan>, ServiceError> {
    Ok(repository::plans_due_for_review(conn, now)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use chrono::Duration;

    fn goal(description: &str) -> NewGoal {
        NewGoal {
            description: description.into(),
            target_date: None,
            strategies: vec!["Daily journaling".into()],
            measurements: vec![],
        }
    }

    fn new_plan(goals: Vec<NewGoal>, review_in_days: i64) -> NewPlan {
        let start = Utc::now() - Duration::days(30);
        NewPlan {
            patient_id: "p1".into(),
            diagnosis: vec!["F32.1".into()],
            interventions: serde_json::json!({"cbt": "weekly"}),
            medications: None,
            frequency: Some("weekly".into()),
            start_date: start,
            review_date: Utc::now() + Duration::days(review_in_days),
            goals,
        }
    }

    #[test]
    fn plan_is_created_with_goals() {
        let conn = open_memory_database().unwrap();
        let created = create_plan(
            &conn,
            "dr-a",
            new_plan(vec![goal("Reduce PHQ-9 below 10"), goal("Return to work")], 30),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(created.plan.status, PlanStatus::Active);
        assert_eq!(created.treatment_goals.len(), 2);
        assert!(created
            .treatment_goals
            .iter()
            .all(|g| g.status == TreatmentGoalStatus::InProgress && g.progress == 0));

        let loaded = plan_with_goals(&conn, &created.plan.id).unwrap();
        assert_eq!(loaded.treatment_goals[0].title, "Reduce PHQ-9 below 10");
        assert_eq!(loaded.plan.goals, serde_json::json!(["Reduce PHQ-9 below 10", "Return to work"]));
    }

    #[test]
    fn invalid_goal_rolls_back_the_plan() {
        let conn = open_memory_database().unwrap();
        let err = create_plan(&conn, "dr-a", new_plan(vec![goal(" ")], 30), Utc::now()).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(active_plan_for_patient(&conn, "p1").unwrap().is_none());
    }

    #[test]
    fn progress_outside_range_is_rejected() {
        let conn = open_memory_database().unwrap();
        let plan = create_plan(&conn, "dr-a", new_plan(vec![goal("Sleep 7h")], 30), Utc::now()).unwrap();
        let goal_id = plan.treatment_goals[0].id;
        for bad in [-1, 101] {
            let err = update_goal(
                &conn,
                &goal_id,
                GoalUpdate { progress: Some(bad), ..Default::default() },
                Utc::now(),
            )
            .unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)));
        }
        assert_eq!(get_goal(&conn, &goal_id).unwrap().progress, 0);
    }

    #[test]
    fn achieved_forces_full_progress() {
        let conn = open_memory_database().unwrap();
        let plan = create_plan(&conn, "dr-a", new_plan(vec![goal("Sleep 7h")], 30), Utc::now()).unwrap();
        let updated = update_goal(
            &conn,
            &plan.treatment_goals[0].id,
            GoalUpdate {
                progress: Some(40),
                status: Some(TreatmentGoalStatus::Achieved),
                barriers: Some(vec!["Shift work".into()]),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(updated.goal.progress, 100);
        assert_eq!(updated.goal.notes.as_deref(), Some("Barriers: Shift work"));
        assert_eq!(updated.barriers, ["Shift work"]);
    }

    #[test]
    fn barriers_append_to_existing_notes() {
        let conn = open_memory_database().unwrap();
        let plan = create_plan(&conn, "dr-a", new_plan(vec![goal("Sleep 7h")], 30), Utc::now()).unwrap();
        let goal_id = plan.treatment_goals[0].id;
        conn.execute(
            "UPDATE treatment_goals SET notes = 'Prefers morning check-ins' WHERE id = ?1",
            [goal_id.to_string()],
        )
        .unwrap();

        let first = update_goal(
            &conn,
            &goal_id,
            GoalUpdate {
                barriers: Some(vec!["Time constraints".into(), "Motivation".into()]),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(first.barriers.len(), 2);

        let second = update_goal(
            &conn,
            &goal_id,
            GoalUpdate { barriers: Some(vec!["Shift work".into()]), ..Default::default() },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(
            second.goal.notes.as_deref(),
            Some("Prefers morning check-ins\nBarriers: Time constraints, Motivation\nBarriers: Shift work")
        );

        let progress_only = update_goal(
            &conn,
            &goal_id,
            GoalUpdate { progress: Some(30), ..Default::default() },
            Utc::now(),
        )
        .unwrap();
        assert!(progress_only.barriers.is_empty());
        assert_eq!(progress_only.goal.notes, second.goal.notes);
    }

    #[test]
    fn progress_summary_rounds_mean() {
        let conn = open_memory_database().unwrap();
        let plan = create_plan(
            &conn,
            "dr-a",
            new_plan(vec![goal("a"), goal("b"), goal("c")], 30),
            Utc::now(),
        )
        .unwrap();
        let ids: Vec<Uuid> = plan.treatment_goals.iter().map(|g| g.id).collect();
        update_goal(&conn, &ids[0], GoalUpdate { status: Some(TreatmentGoalStatus::Achieved), ..Default::default() }, Utc::now()).unwrap();
        update_goal(&conn, &ids[1], GoalUpdate { progress: Some(50), ..Default::default() }, Utc::now()).unwrap();

        let progress = plan_progress(&conn, &plan.plan.id).unwrap();
        assert_eq!(
            progress,
            PlanProgress {
                total_goals: 3,
                achieved_goals: 1,
                in_progress_goals: 2,
                overall_progress: 50,
            }
        );
        assert_eq!(summarize_goals(&[]).overall_progress, 0);
    }

    #[test]
    fn added_goal_joins_plan() {
        let conn = open_memory_database().unwrap();
        let plan = create_plan(&conn, "dr-a", new_plan(vec![goal("a")], 30), Utc::now()).unwrap();
        add_goal(&conn, &plan.plan.id, goal("b"), Utc::now()).unwrap();
        let loaded = plan_with_goals(&conn, &plan.plan.id).unwrap();
        assert_eq!(loaded.treatment_goals.len(), 2);
        assert_eq!(loaded.plan.goals, serde_json::json!(["a", "b"]));
    }

    #[test]
    fn review_scan_finds_only_active_overdue_plans() {
        let conn = open_memory_database().unwrap();
        let overdue = create_plan(&conn, "dr-a", new_plan(vec![], -1), Utc::now()).unwrap();
        create_plan(&conn, "dr-a", new_plan(vec![], 10), Utc::now()).unwrap();
        let closed = create_plan(&conn, "dr-a", new_plan(vec![], -2), Utc::now()).unwrap();
        update_plan(
            &conn,
            &closed.plan.id,
            PlanUpdate { status: Some(PlanStatus::Completed), ..Default::default() },
            Utc::now(),
        )
        .unwrap();

        let due = plans_due_for_review(&conn, Utc::now()).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, overdue.plan.id);
    }

    #[test]
    fn active_plan_is_most_recent() {
        let conn = open_memory_database().unwrap();
        let now = Utc::now();
        create_plan(&conn, "dr-a", new_plan(vec![], 30), now - Duration::days(3)).unwrap();
        let newer = create_plan(&conn, "dr-a", new_plan(vec![goal("x")], 30), now).unwrap();
        let active = active_plan_for_patient(&conn, "p1").unwrap().unwrap();
        assert_eq!(active.plan.id, newer.plan.id);
        assert_eq!(active.treatment_goals.len(), 1);
    }
}
