//! Standardized instrument scoring.
//!
//! Every scorer takes the raw response object submitted by the client
//! (`{"phq9_1": 2, "dast_3": false, ...}`) and returns the derived total,
//! severity band, a short interpretation and recommended next steps.
//! Missing items count as zero. `true` counts as 1 for numeric items.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::enums::{AssessmentType, SeverityLevel};

pub type Responses = Map<String, Value>;

/// Scored outcome of a single instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub total_score: i32,
    pub severity: SeverityLevel,
    pub interpretation: String,
    pub recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscores: Option<BTreeMap<String, i32>>,
}

impl ScoreResult {
    fn new(total_score: i32, severity: SeverityLevel, interpretation: &str, recs: &[&str]) -> Self {
        Self {
            total_score,
            severity,
            interpretation: interpretation.to_string(),
            recommendations: recs.iter().map(|r| r.to_string()).collect(),
            subscores: None,
        }
    }

    fn with_subscores(mut self, subscores: &[(&str, i32)]) -> Self {
        self.subscores = Some(
            subscores
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        );
        self
    }
}

/// Score a stored instrument.
pub fn score(kind: AssessmentType, responses: &Responses) -> ScoreResult {
    match kind {
        AssessmentType::Phq9 => score_phq9(responses),
        AssessmentType::Gad7 => score_gad7(responses),
        AssessmentType::Pcl5 => score_pcl5(responses),
        AssessmentType::Audit => score_audit(responses),
        AssessmentType::Dast => score_dast(responses),
        AssessmentType::Mdq => score_mdq(responses),
        AssessmentType::Ybocs => score_ybocs(responses),
        AssessmentType::Pss => score_pss(responses),
        AssessmentType::GeneralIntake => score_general_intake(responses),
    }
}

// ═══════════════════════════════════════════
// Response access
// ═══════════════════════════════════════════

/// Numeric value of an item. Booleans count as 0/1; anything else is 0.
fn item(responses: &Responses, key: &str) -> i32 {
    let value = match responses.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .unwrap_or(0),
        Some(Value::Bool(b)) => i64::from(*b),
        _ => 0,
    };
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Yes/no answer. `None` when the item was not answered.
fn answer(responses: &Responses, key: &str) -> Option<bool> {
    match responses.get(key) {
        Some(Value::Bool(b)) => Some(*b),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Some(Value::String(s)) => match s.to_ascii_lowercase().as_str() {
            "yes" | "true" => Some(true),
            "no" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn is_yes(responses: &Responses, key: &str) -> bool {
    answer(responses, key) == Some(true)
}

fn sum(responses: &Responses, prefix: &str, items: std::ops::RangeInclusive<u32>) -> i32 {
    items
        .map(|i| item(responses, &format!("{prefix}_{i}")))
        .fold(0i32, i32::saturating_add)
}

// ═══════════════════════════════════════════
// Answer ranges
// ═══════════════════════════════════════════

/// What a single questionnaire item accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemRange {
    Scale { min: i64, max: i64 },
    YesNo,
}

fn scale_items(prefix: &str, count: u32, min: i64, max: i64) -> Vec<(String, ItemRange)> {
    (1..=count)
        .map(|i| (format!("{prefix}_{i}"), ItemRange::Scale { min, max }))
        .collect()
}

fn yes_no_items(prefix: &str, count: u32) -> Vec<(String, ItemRange)> {
    (1..=count)
        .map(|i| (format!("{prefix}_{i}"), ItemRange::YesNo))
        .collect()
}

fn item_ranges(kind: AssessmentType) -> Vec<(String, ItemRange)> {
    match kind {
        AssessmentType::Phq9 => scale_items("phq9", 9, 0, 3),
        AssessmentType::Gad7 => scale_items("gad7", 7, 0, 3),
        AssessmentType::Pcl5 => scale_items("pcl5", 20, 0, 4),
        AssessmentType::Audit => scale_items("audit", 10, 0, 4),
        AssessmentType::Dast => yes_no_items("dast", 10),
        AssessmentType::Mdq => {
            let mut items = yes_no_items("mdq", 13);
            items.push(("mdq_concurrent".into(), ItemRange::YesNo));
            items.push(("mdq_impairment".into(), ItemRange::Scale { min: 0, max: 3 }));
            items
        }
        AssessmentType::Ybocs => scale_items("ybocs", 10, 0, 4),
        AssessmentType::Pss => scale_items("pss", 10, 0, 4),
        AssessmentType::GeneralIntake => vec![
            ("intake_2".into(), ItemRange::YesNo),
            ("intake_3".into(), ItemRange::YesNo),
            ("intake_4".into(), ItemRange::YesNo),
            ("intake_5".into(), ItemRange::Scale { min: 1, max: 5 }),
        ],
    }
}

fn in_range(value: &Value, range: ItemRange) -> bool {
    match (range, value) {
        (_, Value::Null) => true,
        (ItemRange::Scale { min, max }, Value::Number(n)) => {
            n.as_i64().is_some_and(|v| (min..=max).contains(&v))
        }
        (ItemRange::Scale { min, max }, Value::Bool(b)) => (min..=max).contains(&i64::from(*b)),
        (ItemRange::YesNo, Value::Bool(_)) => true,
        (ItemRange::YesNo, Value::Number(n)) => matches!(n.as_i64(), Some(0 | 1)),
        (ItemRange::YesNo, Value::String(s)) => {
            matches!(s.to_ascii_lowercase().as_str(), "yes" | "no" | "true" | "false")
        }
        _ => false,
    }
}

/// Check every answered item of `kind` against the instrument's scale.
/// Unanswered and `null` items pass; other keys are left alone.
pub fn validate_responses(kind: AssessmentType, responses: &Responses) -> Result<(), String> {
    for (key, range) in item_ranges(kind) {
        let Some(value) = responses.get(&key) else {
            continue;
        };
        if !in_range(value, range) {
            return Err(match range {
                ItemRange::Scale { min, max } => {
                    format!("Invalid answer for {key}: expected a whole number from {min} to {max}")
                }
                ItemRange::YesNo => format!("Invalid answer for {key}: expected yes or no"),
            });
        }
    }
    Ok(())
}

// ═══════════════════════════════════════════
// Instruments
// ═══════════════════════════════════════════

pub fn score_phq9(responses: &Responses) -> ScoreResult {
    let total = sum(responses, "phq9", 1..=9);
    let mut result = match total {
        ..=4 => ScoreResult::new(
            total,
            SeverityLevel::None,
            "Minimal or no depression",
            &["Monitor symptoms", "Maintain healthy lifestyle"],
        ),
        5..=9 => ScoreResult::new(
            total,
            SeverityLevel::Mild,
            "Mild depression",
            &[
                "Watchful waiting, repeat PHQ-9 at follow-up",
                "Consider counseling, psychotherapy, or other interventions",
            ],
        ),
        10..=14 => ScoreResult::new(
            total,
            SeverityLevel::Moderate,
            "Moderate depression",
            &[
                "Treatment plan needed - counseling and/or medication",
                "Follow-up in 2-4 weeks",
            ],
        ),
        15..=19 => ScoreResult::new(
            total,
            SeverityLevel::ModeratelySevere,
            "Moderately severe depression",
            &[
                "Active treatment with medication and/or psychotherapy",
                "Close follow-up weekly or biweekly",
            ],
        ),
        _ => ScoreResult::new(
            total,
            SeverityLevel::Severe,
            "Severe depression",
            &[
                "Immediate initiation of pharmacotherapy and/or psychotherapy",
                "Consider psychiatric consultation",
                "Weekly follow-up required",
            ],
        ),
    };

    if phq9_suicidal_ideation(responses) {
        result.recommendations.insert(
            0,
            "ALERT: Suicidal ideation present - assess suicide risk immediately".to_string(),
        );
    }
    result
}

/// PHQ-9 item 9 ("better off dead") answered above zero.
pub fn phq9_suicidal_ideation(responses: &Responses) -> bool {
    item(responses, "phq9_9") > 0
}

pub fn score_gad7(responses: &Responses) -> ScoreResult {
    let total = sum(responses, "gad7", 1..=7);
    match total {
        ..=4 => ScoreResult::new(
            total,
            SeverityLevel::Minimal,
            "Minimal anxiety",
            &["Monitor symptoms", "Relaxation techniques and stress management"],
        ),
        5..=9 => ScoreResult::new(
            total,
            SeverityLevel::Mild,
            "Mild anxiety",
            &[
                "Watchful waiting, consider counseling",
                "Stress management and relaxation techniques",
            ],
        ),
        10..=14 => ScoreResult::new(
            total,
            SeverityLevel::Moderate,
            "Moderate anxiety",
            &[
                "Probable GAD - further assessment recommended",
                "Consider counseling and/or medication",
            ],
        ),
        _ => ScoreResult::new(
            total,
            SeverityLevel::Severe,
            "Severe anxiety",
            &[
                "Active treatment required",
                "Consider medication and psychotherapy (CBT)",
                "Follow-up in 2-4 weeks",
            ],
        ),
    }
}

/// C-SSRS screener. The highest positive item sets the risk level.
pub fn score_cssrs(responses: &Responses) -> ScoreResult {
    const INDICATORS: [&str; 6] = [
        "Wish to be dead",
        "Suicidal thoughts",
        "Suicidal thoughts with method",
        "Suicidal intent",
        "Suicidal intent with plan",
        "Suicidal behavior",
    ];

    let mut risk_level = 0;
    let mut positive: Vec<&str> = Vec::new();
    for (i, label) in INDICATORS.iter().enumerate() {
        if is_yes(responses, &format!("cssrs_{}", i + 1)) {
            risk_level = i as i32 + 1;
            positive.push(*label);
        }
    }
    if !positive.is_empty() {
        tracing::debug!(indicators = ?positive, "C-SSRS positive indicators");
    }

    let result = match risk_level {
        0 => ScoreResult::new(
            0,
            SeverityLevel::None,
            "No suicidal ideation detected",
            &["Continue monitoring"],
        ),
        1 => ScoreResult::new(
            1,
            SeverityLevel::Mild,
            "Low risk - passive suicidal ideation",
            &["Enhanced clinical care and monitoring", "Safety plan recommended"],
        ),
        2 => ScoreResult::new(
            2,
            SeverityLevel::Moderate,
            "Moderate risk - active suicidal ideation",
            &[
                "Crisis intervention required",
                "Develop comprehensive safety plan",
                "Consider hospitalization",
            ],
        ),
        3 | 4 => ScoreResult::new(
            risk_level,
            SeverityLevel::ModeratelySevere,
            "High risk - suicidal ideation with intent",
            &[
                "IMMEDIATE ACTION REQUIRED",
                "Do not leave patient alone",
                "Psychiatric consultation required",
                "Strong consideration for hospitalization",
            ],
        ),
        _ => ScoreResult::new(
            risk_level,
            SeverityLevel::Severe,
            "Imminent risk - suicidal plan or recent behavior",
            &[
                "EMERGENCY INTERVENTION REQUIRED",
                "Immediate psychiatric hospitalization",
                "Initiate crisis protocol",
                "Contact emergency services (911)",
            ],
        ),
    };

    result.with_subscores(&[
        ("riskLevel", risk_level),
        ("positiveIndicators", positive.len() as i32),
    ])
}

pub fn score_pcl5(responses: &Responses) -> ScoreResult {
    let intrusion = sum(responses, "pcl5", 1..=5);
    let avoidance = sum(responses, "pcl5", 6..=7);
    let negative_cognitions = sum(responses, "pcl5", 8..=14);
    let arousal = sum(responses, "pcl5", 15..=20);
    let total = [avoidance, negative_cognitions, arousal]
        .into_iter()
        .fold(intrusion, i32::saturating_add);

    let result = if total < 20 {
        ScoreResult::new(
            total,
            SeverityLevel::Minimal,
            "Minimal PTSD symptoms",
            &["Continue monitoring", "Practice self-care and stress management"],
        )
    } else if total < 31 {
        ScoreResult::new(
            total,
            SeverityLevel::Mild,
            "Mild PTSD symptoms - below clinical threshold",
            &["Consider supportive counseling", "Trauma-informed psychoeducation"],
        )
    } else if total < 44 {
        ScoreResult::new(
            total,
            SeverityLevel::Moderate,
            "Probable PTSD - clinical threshold met (score >= 31)",
            &[
                "Comprehensive PTSD evaluation recommended",
                "Consider trauma-focused therapy (CPT, PE, or EMDR)",
            ],
        )
    } else if total < 60 {
        ScoreResult::new(
            total,
            SeverityLevel::ModeratelySevere,
            "Moderately severe PTSD symptoms",
            &[
                "Trauma-focused therapy strongly recommended",
                "Consider medication evaluation",
                "Safety planning may be indicated",
            ],
        )
    } else {
        ScoreResult::new(
            total,
            SeverityLevel::Severe,
            "Severe PTSD symptoms",
            &[
                "Immediate trauma-focused intervention needed",
                "Psychiatric evaluation for medication",
                "Assess for suicidal ideation and safety",
            ],
        )
    };

    result.with_subscores(&[
        ("intrusion", intrusion),
        ("avoidance", avoidance),
        ("negativeCognitions", negative_cognitions),
        ("arousal", arousal),
    ])
}

pub fn score_audit(responses: &Responses) -> ScoreResult {
    let total = sum(responses, "audit", 1..=10);
    match total {
        ..=7 => ScoreResult::new(
            total,
            SeverityLevel::None,
            "Low risk drinking",
            &[
                "Continue to monitor alcohol consumption",
                "Provide education on safe drinking limits",
            ],
        ),
        8..=15 => ScoreResult::new(
            total,
            SeverityLevel::Mild,
            "Hazardous drinking",
            &["Brief intervention recommended", "Advise on reducing alcohol consumption"],
        ),
        16..=19 => ScoreResult::new(
            total,
            SeverityLevel::Moderate,
            "Harmful drinking",
            &[
                "Brief intervention and continued monitoring",
                "Consider referral to addiction specialist",
            ],
        ),
        _ => ScoreResult::new(
            total,
            SeverityLevel::Severe,
            "Possible alcohol dependence",
            &[
                "Referral to addiction specialist recommended",
                "Consider medically supervised detoxification",
            ],
        ),
    }
}

/// DAST-10. Item 3 ("able to stop") is reverse scored.
pub fn score_dast(responses: &Responses) -> ScoreResult {
    let total: i32 = (1..=10)
        .map(|i| {
            let a = answer(responses, &format!("dast_{i}"));
            let counts = if i == 3 { a == Some(false) } else { a == Some(true) };
            counts as i32
        })
        .sum();

    match total {
        0 => ScoreResult::new(
            0,
            SeverityLevel::None,
            "No drug use problems reported",
            &["Continue monitoring"],
        ),
        1..=2 => ScoreResult::new(
            total,
            SeverityLevel::Mild,
            "Low level of drug-related problems",
            &["Brief intervention and monitoring"],
        ),
        3..=5 => ScoreResult::new(
            total,
            SeverityLevel::Moderate,
            "Moderate level of drug-related problems",
            &["Outpatient treatment recommended"],
        ),
        6..=8 => ScoreResult::new(
            total,
            SeverityLevel::ModeratelySevere,
            "Substantial level of drug-related problems",
            &["Intensive outpatient treatment recommended"],
        ),
        _ => ScoreResult::new(
            total,
            SeverityLevel::Severe,
            "Severe level of drug-related problems",
            &[
                "Intensive treatment required",
                "Consider inpatient or residential treatment",
            ],
        ),
    }
}

/// Mood Disorder Questionnaire. Positive screen needs 7+ symptoms that
/// occurred together and caused at least moderate impairment.
pub fn score_mdq(responses: &Responses) -> ScoreResult {
    let symptom_count = (1..=13)
        .filter(|i| is_yes(responses, &format!("mdq_{i}")))
        .count() as i32;
    let concurrent = is_yes(responses, "mdq_concurrent");
    let impairment = match responses.get("mdq_impairment") {
        Some(Value::Number(_)) => item(responses, "mdq_impairment"),
        _ => 0,
    };
    let positive_screen = symptom_count >= 7 && concurrent && impairment >= 2;

    let result = if !positive_screen {
        if symptom_count < 4 {
            ScoreResult::new(
                symptom_count,
                SeverityLevel::None,
                "Negative screen for bipolar disorder",
                &["Continue routine monitoring"],
            )
        } else {
            ScoreResult::new(
                symptom_count,
                SeverityLevel::Mild,
                "Some manic symptoms present but below threshold",
                &["Monitor for mood episode development"],
            )
        }
    } else if impairment == 2 {
        ScoreResult::new(
            symptom_count,
            SeverityLevel::Moderate,
            "Positive screen for bipolar disorder - moderate impairment",
            &["Comprehensive psychiatric evaluation recommended"],
        )
    } else {
        ScoreResult::new(
            symptom_count,
            SeverityLevel::Severe,
            "Positive screen for bipolar disorder - significant impairment",
            &["Urgent psychiatric evaluation recommended"],
        )
    };

    result.with_subscores(&[
        ("symptomCount", symptom_count),
        ("concurrent", concurrent as i32),
        ("impairment", impairment),
        ("positiveScreen", positive_screen as i32),
    ])
}

pub fn score_ybocs(responses: &Responses) -> ScoreResult {
    let obsessions = sum(responses, "ybocs", 1..=5);
    let compulsions = sum(responses, "ybocs", 6..=10);
    let total = obsessions.saturating_add(compulsions);

    let result = match total {
        ..=7 => ScoreResult::new(
            total,
            SeverityLevel::None,
            "Subclinical OCD symptoms",
            &["Monitor symptoms"],
        ),
        8..=15 => ScoreResult::new(
            total,
            SeverityLevel::Mild,
            "Mild OCD",
            &["Consider cognitive-behavioral therapy (CBT)"],
        ),
        16..=23 => ScoreResult::new(
            total,
            SeverityLevel::Moderate,
            "Moderate OCD",
            &["CBT with ERP recommended", "Consider medication evaluation"],
        ),
        24..=31 => ScoreResult::new(
            total,
            SeverityLevel::ModeratelySevere,
            "Severe OCD",
            &[
                "Intensive CBT/ERP treatment recommended",
                "Medication evaluation strongly indicated",
            ],
        ),
        _ => ScoreResult::new(
            total,
            SeverityLevel::Severe,
            "Extreme OCD",
            &[
                "Intensive outpatient or residential treatment",
                "Aggressive medication management",
            ],
        ),
    };

    result.with_subscores(&[("obsessions", obsessions), ("compulsions", compulsions)])
}

/// Perceived Stress Scale. Items 4, 5, 7 and 8 are positively worded.
pub fn score_pss(responses: &Responses) -> ScoreResult {
    const REVERSED: [u32; 4] = [4, 5, 7, 8];
    let total: i32 = (1..=10)
        .map(|i| {
            let v = item(responses, &format!("pss_{i}"));
            if REVERSED.contains(&i) {
                4i32.saturating_sub(v)
            } else {
                v
            }
        })
        .fold(0i32, i32::saturating_add);

    match total {
        ..=13 => ScoreResult::new(
            total,
            SeverityLevel::None,
            "Low perceived stress",
            &["Maintain current stress management practices"],
        ),
        14..=19 => ScoreResult::new(
            total,
            SeverityLevel::Mild,
            "Moderate perceived stress",
            &["Consider stress reduction techniques"],
        ),
        20..=26 => ScoreResult::new(
            total,
            SeverityLevel::Moderate,
            "Moderate to high perceived stress",
            &["Stress management intervention recommended"],
        ),
        27..=33 => ScoreResult::new(
            total,
            SeverityLevel::ModeratelySevere,
            "High perceived stress",
            &["Counseling or therapy strongly recommended"],
        ),
        _ => ScoreResult::new(
            total,
            SeverityLevel::Severe,
            "Very high perceived stress",
            &["Immediate intervention recommended", "Mental health evaluation"],
        ),
    }
}

/// General intake. `intake_5` is the patient's own 1-5 rating of their mental health.
pub fn score_general_intake(responses: &Responses) -> ScoreResult {
    let rating = match responses.get("intake_5") {
        Some(Value::Number(_)) => item(responses, "intake_5"),
        _ => 3,
    };
    let prior_treatment = is_yes(responses, "intake_2");
    let on_medications = is_yes(responses, "intake_3");
    let medical_conditions = is_yes(responses, "intake_4");

    let (severity, interpretation) = match rating {
        r if r >= 4 => (SeverityLevel::None, "Patient reports good to excellent mental health"),
        3 => (SeverityLevel::Mild, "Patient reports fair mental health"),
        2 => (
            SeverityLevel::Moderate,
            "Patient reports fair mental health with some concerns",
        ),
        _ => (SeverityLevel::ModeratelySevere, "Patient reports poor mental health"),
    };

    let mut result = ScoreResult::new(
        rating,
        severity,
        interpretation,
        &["Comprehensive initial assessment"],
    );
    if prior_treatment {
        result.recommendations.push("Obtain prior treatment records".into());
    }
    if on_medications {
        result.recommendations.push("Review current medication list".into());
    }
    if medical_conditions {
        result.recommendations.push("Coordinate with primary care provider".into());
    }

    result.with_subscores(&[
        ("selfRatedHealth", rating),
        ("priorTreatment", prior_treatment as i32),
        ("currentMedications", on_medications as i32),
        ("medicalConditions", medical_conditions as i32),
    ])
}

// ═══════════════════════════════════════════
// Question catalogue
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Scale,
    YesNo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionOption {
    pub value: i32,
    pub label: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Question {
    pub id: String,
    pub question: &'static str,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<QuestionOption>,
}

const FREQUENCY_LABELS: [&str; 4] = [
    "Not at all",
    "Several days",
    "More than half the days",
    "Nearly every day",
];

const PHQ9_TEXT: [&str; 9] = [
    "Little interest or pleasure in doing things",
    "Feeling down, depressed, or hopeless",
    "Trouble falling or staying asleep, or sleeping too much",
    "Feeling tired or having little energy",
    "Poor appetite or overeating",
    "Feeling bad about yourself - or that you are a failure or have let yourself or your family down",
    "Trouble concentrating on things, such as reading the newspaper or watching television",
    "Moving or speaking so slowly that other people could have noticed. Or the opposite - being so fidgety or restless that you have been moving around a lot more than usual",
    "Thoughts that you would be better off dead, or of hurting yourself",
];

const GAD7_TEXT: [&str; 7] = [
    "Feeling nervous, anxious, or on edge",
    "Not being able to stop or control worrying",
    "Worrying too much about different things",
    "Trouble relaxing",
    "Being so restless that it is hard to sit still",
    "Becoming easily annoyed or irritable",
    "Feeling afraid, as if something awful might happen",
];

const CSSRS_TEXT: [&str; 6] = [
    "Have you wished you were dead or wished you could go to sleep and not wake up?",
    "Have you actually had any thoughts of killing yourself?",
    "Have you been thinking about how you might do this?",
    "Have you had these thoughts and had some intention of acting on them?",
    "Have you started to work out or worked out the details of how to kill yourself? Do you intend to carry out this plan?",
    "Have you ever done anything, started to do anything, or prepared to do anything to end your life?",
];

fn frequency_scale(prefix: &str, texts: &[&'static str]) -> Vec<Question> {
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| Question {
            id: format!("{prefix}_{}", i + 1),
            question: text,
            kind: QuestionKind::Scale,
            options: FREQUENCY_LABELS
                .iter()
                .enumerate()
                .map(|(v, label)| QuestionOption {
                    value: v as i32,
                    label,
                })
                .collect(),
        })
        .collect()
}

/// Questions for a stored instrument. Instruments without a catalogue return none.
pub fn questions_for(kind: AssessmentType) -> Vec<Question> {
    match kind {
        AssessmentType::Phq9 => frequency_scale("phq9", &PHQ9_TEXT),
        AssessmentType::Gad7 => frequency_scale("gad7", &GAD7_TEXT),
        _ => Vec::new(),
    }
}

pub fn cssrs_questions() -> Vec<Question> {
    CSSRS_TEXT
        .iter()
        .enumerate()
        .map(|(i, text)| Question {
            id: format!("cssrs_{}", i + 1),
            question: text,
            kind: QuestionKind::YesNo,
            options: Vec::new(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn responses(v: Value) -> Responses {
        v.as_object().cloned().unwrap()
    }

    fn uniform(prefix: &str, n: u32, value: i64) -> Responses {
        (1..=n)
            .map(|i| (format!("{prefix}_{i}"), json!(value)))
            .collect()
    }

    #[test]
    fn phq9_band_edges() {
        let cases = [
            (4, SeverityLevel::None),
            (5, SeverityLevel::Mild),
            (9, SeverityLevel::Mild),
            (10, SeverityLevel::Moderate),
            (15, SeverityLevel::ModeratelySevere),
            (20, SeverityLevel::Severe),
        ];
        for (total, expected) in cases {
            let mut r = Responses::new();
            let mut left = total;
            for i in 1..=8 {
                let v = left.min(3);
                r.insert(format!("phq9_{i}"), json!(v));
                left -= v;
            }
            let result = score_phq9(&r);
            assert_eq!(result.total_score, total);
            assert_eq!(result.severity, expected, "total {total}");
        }
    }

    #[test]
    fn phq9_item_nine_raises_alert_first() {
        let r = responses(json!({"phq9_1": 1, "phq9_9": 1}));
        let result = score_phq9(&r);
        assert_eq!(result.severity, SeverityLevel::None);
        assert!(result.recommendations[0].starts_with("ALERT: Suicidal ideation"));
        assert!(phq9_suicidal_ideation(&r));
    }

    #[test]
    fn missing_items_count_as_zero() {
        let result = score_phq9(&Responses::new());
        assert_eq!(result.total_score, 0);
        assert_eq!(result.interpretation, "Minimal or no depression");
    }

    #[test]
    fn gad7_bottom_band_is_minimal() {
        assert_eq!(score_gad7(&uniform("gad7", 7, 0)).severity, SeverityLevel::Minimal);
        let severe = score_gad7(&uniform("gad7", 7, 3));
        assert_eq!(severe.total_score, 21);
        assert_eq!(severe.severity, SeverityLevel::Severe);
        assert_eq!(severe.recommendations.len(), 3);
    }

    #[test]
    fn cssrs_highest_positive_item_wins() {
        let r = responses(json!({"cssrs_1": true, "cssrs_2": true, "cssrs_4": true}));
        let result = score_cssrs(&r);
        assert_eq!(result.total_score, 4);
        assert_eq!(result.severity, SeverityLevel::ModeratelySevere);
        let subs = result.subscores.unwrap();
        assert_eq!(subs["riskLevel"], 4);
        assert_eq!(subs["positiveIndicators"], 3);

        let behaviour = score_cssrs(&responses(json!({"cssrs_6": true})));
        assert_eq!(behaviour.severity, SeverityLevel::Severe);
        assert_eq!(behaviour.recommendations[0], "EMERGENCY INTERVENTION REQUIRED");
    }

    #[test]
    fn pcl5_subscores_partition_total() {
        let result = score_pcl5(&uniform("pcl5", 20, 2));
        assert_eq!(result.total_score, 40);
        assert_eq!(result.severity, SeverityLevel::Moderate);
        let subs = result.subscores.unwrap();
        assert_eq!(subs["intrusion"], 10);
        assert_eq!(subs["avoidance"], 4);
        assert_eq!(subs["negativeCognitions"], 14);
        assert_eq!(subs["arousal"], 12);
    }

    #[test]
    fn audit_thresholds() {
        assert_eq!(score_audit(&uniform("audit", 7, 1)).severity, SeverityLevel::None);
        assert_eq!(score_audit(&uniform("audit", 8, 1)).severity, SeverityLevel::Mild);
        assert_eq!(score_audit(&uniform("audit", 10, 2)).severity, SeverityLevel::Severe);
    }

    #[test]
    fn dast_item_three_is_reversed() {
        let result = score_dast(&responses(json!({"dast_3": false})));
        assert_eq!(result.total_score, 1);
        assert_eq!(result.severity, SeverityLevel::Mild);

        let unanswered = score_dast(&Responses::new());
        assert_eq!(unanswered.total_score, 0);

        let mut all_yes: Responses = (1..=10).map(|i| (format!("dast_{i}"), json!(true))).collect();
        all_yes.insert("dast_3".into(), json!(true));
        assert_eq!(score_dast(&all_yes).total_score, 9);
    }

    #[test]
    fn mdq_positive_screen_requires_all_three_criteria() {
        let mut r: Responses = (1..=8).map(|i| (format!("mdq_{i}"), json!(true))).collect();
        r.insert("mdq_concurrent".into(), json!(true));
        r.insert("mdq_impairment".into(), json!(2));
        let moderate = score_mdq(&r);
        assert_eq!(moderate.severity, SeverityLevel::Moderate);
        assert_eq!(moderate.subscores.as_ref().unwrap()["positiveScreen"], 1);

        r.insert("mdq_impairment".into(), json!(3));
        assert_eq!(score_mdq(&r).severity, SeverityLevel::Severe);

        r.insert("mdq_concurrent".into(), json!(false));
        let negative = score_mdq(&r);
        assert_eq!(negative.severity, SeverityLevel::Mild);
        assert_eq!(negative.total_score, 8);
    }

    #[test]
    fn ybocs_extreme_band() {
        let result = score_ybocs(&uniform("ybocs", 10, 4));
        assert_eq!(result.total_score, 40);
        assert_eq!(result.severity, SeverityLevel::Severe);
        assert_eq!(result.subscores.unwrap()["compulsions"], 20);
    }

    #[test]
    fn out_of_range_answers_are_rejected() {
        let negative = responses(json!({"phq9_1": 3, "phq9_2": 3, "phq9_3": 3, "phq9_4": -50}));
        let err = validate_responses(AssessmentType::Phq9, &negative).unwrap_err();
        assert!(err.contains("phq9_4"));

        let huge = responses(json!({"phq9_1": 2147483647, "phq9_2": 3}));
        assert!(validate_responses(AssessmentType::Phq9, &huge).is_err());

        let fractional = responses(json!({"gad7_1": 1.5}));
        assert!(validate_responses(AssessmentType::Gad7, &fractional).is_err());

        let maybe = responses(json!({"dast_1": "maybe"}));
        assert!(validate_responses(AssessmentType::Dast, &maybe).is_err());

        let intake = responses(json!({"intake_5": 0}));
        assert!(validate_responses(AssessmentType::GeneralIntake, &intake).is_err());
    }

    #[test]
    fn in_range_answers_pass_validation() {
        assert!(validate_responses(AssessmentType::Phq9, &uniform("phq9", 9, 3)).is_ok());
        assert!(validate_responses(AssessmentType::Ybocs, &uniform("ybocs", 10, 4)).is_ok());
        let mixed = responses(json!({
            "mdq_1": "yes", "mdq_2": true, "mdq_3": 0,
            "mdq_concurrent": "no", "mdq_impairment": 3,
            "phq9_1": 99, "comment": "unrelated keys are ignored",
        }));
        assert!(validate_responses(AssessmentType::Mdq, &mixed).is_ok());
        assert!(validate_responses(AssessmentType::Pss, &Responses::new()).is_ok());
    }

    #[test]
    fn extreme_values_score_without_overflow() {
        let huge = responses(json!({"phq9_1": 2147483647, "phq9_2": 3, "phq9_3": i64::MAX}));
        assert_eq!(score_phq9(&huge).total_score, i32::MAX);

        let reversed = responses(json!({"pss_4": i64::MIN}));
        assert_eq!(score_pss(&reversed).total_score, i32::MAX);
    }

    #[test]
    fn pss_reverses_positive_items() {
        // All zeros: reversed items contribute 4 each.
        let result = score_pss(&uniform("pss", 10, 0));
        assert_eq!(result.total_score, 16);
        assert_eq!(result.severity, SeverityLevel::Mild);
    }

    #[test]
    fn general_intake_defaults_rating_and_adds_followups() {
        let result = score_general_intake(&responses(json!({"intake_2": true, "intake_4": 1})));
        assert_eq!(result.total_score, 3);
        assert_eq!(result.severity, SeverityLevel::Mild);
        assert_eq!(
            result.recommendations,
            vec![
                "Comprehensive initial assessment",
                "Obtain prior treatment records",
                "Coordinate with primary care provider",
            ]
        );

        let poor = score_general_intake(&responses(json!({"intake_5": 1})));
        assert_eq!(poor.severity, SeverityLevel::ModeratelySevere);
    }

    #[test]
    fn catalogue_covers_phq9_gad7_and_cssrs() {
        let phq9 = questions_for(AssessmentType::Phq9);
        assert_eq!(phq9.len(), 9);
        assert_eq!(phq9[0].id, "phq9_1");
        assert_eq!(phq9[0].options[3].label, "Nearly every day");
        assert_eq!(questions_for(AssessmentType::Gad7).len(), 7);
        assert!(questions_for(AssessmentType::Audit).is_empty());

        let cssrs = cssrs_questions();
        assert_eq!(cssrs.len(), 6);
        let json = serde_json::to_value(&cssrs[0]).unwrap();
        assert_eq!(json["type"], "yes_no");
        assert!(json.get("options").is_none());
    }

    #[test]
    fn result_serializes_camel_case() {
        let json = serde_json::to_value(score_gad7(&Responses::new())).unwrap();
        assert_eq!(json["totalScore"], 0);
        assert_eq!(json["severity"], "minimal");
        assert!(json.get("subscores").is_none());
    }
}
