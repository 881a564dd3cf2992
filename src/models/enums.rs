use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// The serde representation is the stored string, so the wire vocabulary
/// and the column vocabulary never drift apart.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(SessionType {
    Individual => "individual",
    Group => "group",
    Couples => "couples",
    Family => "family",
});

str_enum!(SessionStatus {
    Scheduled => "scheduled",
    InProgress => "in_progress",
    Completed => "completed",
    Cancelled => "cancelled",
    NoShow => "no_show",
});

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::NoShow)
    }

    /// Lifecycle shared by therapy sessions and group sessions.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (Self::Scheduled, Self::InProgress)
                | (Self::Scheduled, Self::Cancelled)
                | (Self::Scheduled, Self::NoShow)
                | (Self::InProgress, Self::Completed)
                | (Self::InProgress, Self::Cancelled)
        )
    }
}

str_enum!(AssessmentType {
    Phq9 => "PHQ9",
    Gad7 => "GAD7",
    Pcl5 => "PCL5",
    Audit => "AUDIT",
    Dast => "DAST",
    Mdq => "MDQ",
    Ybocs => "YBOCS",
    Pss => "PSS",
    GeneralIntake => "general_intake",
});

str_enum!(SeverityLevel {
    None => "none",
    Minimal => "minimal",
    Mild => "mild",
    Moderate => "moderate",
    ModeratelySevere => "moderately_severe",
    Severe => "severe",
});

impl SeverityLevel {
    pub fn rank(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::Minimal => 1,
            Self::Mild => 2,
            Self::Moderate => 3,
            Self::ModeratelySevere => 4,
            Self::Severe => 5,
        }
    }
}

str_enum!(CrisisType {
    SuicidalIdeation => "suicidal_ideation",
    SelfHarm => "self_harm",
    PanicAttack => "panic_attack",
    PsychoticEpisode => "psychotic_episode",
    SubstanceOverdose => "substance_overdose",
    DomesticViolence => "domestic_violence",
    Trauma => "trauma",
    Other => "other",
});

str_enum!(CrisisSeverity {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

impl CrisisSeverity {
    pub fn rank(&self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
            Self::Critical => 3,
        }
    }
}

str_enum!(CrisisStatus {
    Active => "active",
    Monitoring => "monitoring",
    Resolved => "resolved",
    Escalated => "escalated",
});

impl CrisisStatus {
    /// Forward-only flow; escalation is the one re-entry point.
    pub fn can_transition_to(&self, next: CrisisStatus) -> bool {
        matches!(
            (self, next),
            (Self::Active, Self::Monitoring)
                | (Self::Active, Self::Resolved)
                | (Self::Active, Self::Escalated)
                | (Self::Monitoring, Self::Resolved)
                | (Self::Monitoring, Self::Escalated)
                | (Self::Escalated, Self::Monitoring)
                | (Self::Escalated, Self::Resolved)
        )
    }
}

str_enum!(ConsentType {
    Treatment => "treatment",
    Medication => "medication",
    InformationSharing => "information_sharing",
    InformationRelease => "information_release",
    Telehealth => "telehealth",
    Research => "research",
    EmergencyContact => "emergency_contact",
    CfrPart2 => "cfr_part2",
});

str_enum!(ConsentStatus {
    Pending => "pending",
    Active => "active",
    Revoked => "revoked",
    Expired => "expired",
});

str_enum!(GroupSessionType {
    Support => "support",
    Psychoeducation => "psychoeducation",
    SkillsTraining => "skills_training",
    Process => "process",
});

str_enum!(MedicationClass {
    Antidepressant => "antidepressant",
    Antianxiety => "antianxiety",
    Anxiolytic => "anxiolytic",
    Antipsychotic => "antipsychotic",
    MoodStabilizer => "mood_stabilizer",
    Stimulant => "stimulant",
    Sedative => "sedative",
    SedativeHypnotic => "sedative_hypnotic",
    Other => "other",
});

str_enum!(MedicationStatus {
    Active => "active",
    Completed => "completed",
    Discontinued => "discontinued",
    OnHold => "on_hold",
    Tapered => "tapered",
});

impl MedicationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Discontinued)
    }

    pub fn can_transition_to(&self, next: MedicationStatus) -> bool {
        matches!(
            (self, next),
            (Self::Active, Self::Completed)
                | (Self::Active, Self::Discontinued)
                | (Self::Active, Self::OnHold)
                | (Self::Active, Self::Tapered)
                | (Self::OnHold, Self::Active)
                | (Self::OnHold, Self::Discontinued)
                | (Self::Tapered, Self::Discontinued)
                | (Self::Tapered, Self::Completed)
        )
    }
}

str_enum!(NoteType {
    InitialAssessment => "initial_assessment",
    Progress => "progress",
    Discharge => "discharge",
    Crisis => "crisis",
    Consultation => "consultation",
    Group => "group",
    Soap => "SOAP",
    Dap => "DAP",
    Birp => "BIRP",
    Girp => "GIRP",
});

str_enum!(TreatmentGoalStatus {
    NotStarted => "not_started",
    InProgress => "in_progress",
    Achieved => "achieved",
    Modified => "modified",
    Discontinued => "discontinued",
});

str_enum!(PlanStatus {
    Active => "active",
    Completed => "completed",
    Discontinued => "discontinued",
});

str_enum!(MembershipStatus {
    Active => "active",
    Inactive => "inactive",
    Removed => "removed",
});

str_enum!(UserRole {
    Patient => "patient",
    Provider => "provider",
    Admin => "admin",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn assessment_type_keeps_wire_spelling() {
        for (variant, s) in [
            (AssessmentType::Phq9, "PHQ9"),
            (AssessmentType::Gad7, "GAD7"),
            (AssessmentType::Pcl5, "PCL5"),
            (AssessmentType::GeneralIntake, "general_intake"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(AssessmentType::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn serde_uses_stored_strings() {
        let json = serde_json::to_string(&SessionStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        let note: NoteType = serde_json::from_str("\"SOAP\"").unwrap();
        assert_eq!(note, NoteType::Soap);
        assert!(serde_json::from_str::<NoteType>("\"Soap\"").is_err());
    }

    #[test]
    fn session_lifecycle_is_forward_only() {
        use SessionStatus::*;
        assert!(Scheduled.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(Scheduled.can_transition_to(NoShow));
        assert!(!Scheduled.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(InProgress));
        assert!(!Cancelled.can_transition_to(Scheduled));
        assert!(Completed.is_terminal() && NoShow.is_terminal());
    }

    #[test]
    fn crisis_escalation_reenters_flow() {
        use CrisisStatus::*;
        assert!(Active.can_transition_to(Escalated));
        assert!(Monitoring.can_transition_to(Escalated));
        assert!(Escalated.can_transition_to(Resolved));
        assert!(!Monitoring.can_transition_to(Active));
        assert!(!Resolved.can_transition_to(Escalated));
        assert!(!Resolved.can_transition_to(Monitoring));
    }

    #[test]
    fn medication_terminal_states() {
        use MedicationStatus::*;
        assert!(OnHold.can_transition_to(Active));
        assert!(!Discontinued.can_transition_to(Active));
        assert!(!Completed.can_transition_to(OnHold));
        assert!(Discontinued.is_terminal());
    }

    #[test]
    fn severity_ranks_are_ordered() {
        let ranks: Vec<u8> = SeverityLevel::ALL.iter().map(|s| s.rank()).collect();
        assert!(ranks.windows(2).all(|w| w[0] < w[1]));
        assert!(CrisisSeverity::Critical.rank() > CrisisSeverity::High.rank());
    }

    #[test]
    fn invalid_enum_returns_error() {
        assert!(CrisisType::from_str("invalid").is_err());
        assert!(ConsentStatus::from_str("granted").is_err());
        assert!(UserRole::from_str("").is_err());
    }
}
