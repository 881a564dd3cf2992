//! Append-only mood journal.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{MOOD_MAX, MOOD_MIN};
use crate::db::repository;
use crate::error::ServiceError;
use crate::models::{MoodFilter, MoodLog};

/// How many triggers the summary reports.
const TOP_TRIGGERS: usize = 5;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMoodLog {
    pub mood_rating: i32,
    pub notes: Option<String>,
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(default)]
    pub activities: Vec<String>,
    pub log_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerCount {
    pub trigger: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodSummary {
    pub count: usize,
    pub average: Option<f64>,
    pub min: Option<i32>,
    pub max: Option<i32>,
    pub top_triggers: Vec<TriggerCount>,
}

pub fn record_mood(
    conn: &Connection,
    patient_id: &str,
    input: NewMoodLog,
    now: DateTime<Utc>,
) -> Result<MoodLog, ServiceError> {
    if !(MOOD_MIN..=MOOD_MAX).contains(&input.mood_rating) {
        return Err(ServiceError::validation(format!(
            "Mood rating must be between {MOOD_MIN} and {MOOD_MAX}"
        )));
    }

    let log = MoodLog {
        id: Uuid::new_v4(),
        patient_id: patient_id.to_string(),
        mood_rating: input.mood_rating,
        notes: input.notes,
        triggers: input.triggers,
        activities: input.activities,
        log_date: input.log_date.unwrap_or(now),
        created_at: now,
    };
    repository::insert_mood_log(conn, &log)?;
    tracing::debug!(mood_id = %log.id, rating = log.mood_rating, "Mood logged");
    Ok(log)
}

pub fn mood_history(
    conn: &Connection,
    patient_id: &str,
    filter: &MoodFilter,
) -> Result<Vec<MoodLog>, ServiceError> {
    Ok(repository::list_mood_logs(conn, patient_id, filter)?)
}

pub fn summarize(logs: &[MoodLog]) -> MoodSummary {
    let count = logs.len();
    let average = (count > 0).then(|| {
        let sum: i32 = logs.iter().map(|l| l.mood_rating).sum();
        (sum as f64 / count as f64 * 10.0).round() / 10.0
    });

    let mut tally: HashMap<&str, usize> = HashMap::new();
    for trigger in logs.iter().flat_map(|l| &l.triggers) {
        *tally.entry(trigger.as_str()).or_default() += 1;
    }
    let mut top_triggers: Vec<TriggerCount> = tally
        .into_iter()
        .map(|(trigger, count)| TriggerCount {
            trigger: trigger.to_string(),
            count,
        })
        .collect();
    top_triggers.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.trigger.cmp(&b.trigger)));
    top_triggers.truncate(TOP_TRIGGERS);

    MoodSummary {
        count,
        average,
        min: logs.iter().map(|l| l.mood_rating).min(),
        max: logs.iter().map(|l| l.mood_rating).max(),
        top_triggers,
    }
}

pub fn mood_summary(
    conn: &Connection,
    patient_id: &str,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Result<MoodSummary, ServiceError> {
    let logs = repository::list_mood_logs(
        conn,
        patient_id,
        &MoodFilter {
            date_from: from,
            date_to: to,
            limit: None,
        },
    )?;
    Ok(summarize(&logs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use chrono::Duration;

    fn entry(rating: i32, triggers: &[&str], days_ago: i64) -> NewMoodLog {
        NewMoodLog {
            mood_rating: rating,
            notes: None,
            triggers: triggers.iter().map(|t| t.to_string()).collect(),
            activities: vec![],
            log_date: Some(Utc::now() - Duration::days(days_ago)),
        }
    }

    #[test]
    fn rating_bounds_are_inclusive() {
        let conn = open_memory_database().unwrap();
        assert!(record_mood(&conn, "p1", entry(1, &[], 0), Utc::now()).is_ok());
        assert!(record_mood(&conn, "p1", entry(10, &[], 0), Utc::now()).is_ok());
        for bad in [0, 11] {
            let err = record_mood(&conn, "p1", entry(bad, &[], 0), Utc::now()).unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)));
        }
    }

    #[test]
    fn history_is_windowed_newest_first() {
        let conn = open_memory_database().unwrap();
        record_mood(&conn, "p1", entry(3, &[], 10), Utc::now()).unwrap();
        record_mood(&conn, "p1", entry(6, &[], 2), Utc::now()).unwrap();
        record_mood(&conn, "p1", entry(8, &[], 1), Utc::now()).unwrap();
        record_mood(&conn, "p2", entry(5, &[], 1), Utc::now()).unwrap();

        let recent = mood_history(
            &conn,
            "p1",
            &MoodFilter {
                date_from: Some(Utc::now() - Duration::days(7)),
                ..Default::default()
            },
        )
        .unwrap();
        let ratings: Vec<i32> = recent.iter().map(|l| l.mood_rating).collect();
        assert_eq!(ratings, vec![8, 6]);
    }

    #[test]
    fn summary_ranks_triggers() {
        let conn = open_memory_database().unwrap();
        record_mood(&conn, "p1", entry(4, &["work", "sleep"], 3), Utc::now()).unwrap();
        record_mood(&conn, "p1", entry(5, &["work"], 2), Utc::now()).unwrap();
        record_mood(&conn, "p1", entry(9, &["family"], 1), Utc::now()).unwrap();

        let summary = mood_summary(&conn, "p1", None, None).unwrap();
        assert_eq!(summary.count, 3);
        assert_eq!(summary.average, Some(6.0));
        assert_eq!(summary.min, Some(4));
        assert_eq!(summary.max, Some(9));
        assert_eq!(summary.top_triggers[0].trigger, "work");
        assert_eq!(summary.top_triggers[0].count, 2);
    }

    #[test]
    fn empty_summary_has_no_average() {
        let summary = summarize(&[]);
        assert_eq!(summary.count, 0);
        assert!(summary.average.is_none());
        assert!(summary.top_triggers.is_empty());
    }
}
