use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AssessmentError {
    #[error("training_days_per_week must be between 1 and 7, got {0}")]
    TrainingDays(u32),
    #[error("mesocycle_week must be at least 1")]
    MesocycleWeek,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    #[default]
    Strength,
    MuscleUps,
    Hypertrophy,
    Power,
}

impl Goal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Goal::Strength => "strength",
            Goal::MuscleUps => "muscle_ups",
            Goal::Hypertrophy => "hypertrophy",
            Goal::Power => "power",
        }
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for Goal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "strength" => Ok(Goal::Strength),
            "muscle_ups" => Ok(Goal::MuscleUps),
            "hypertrophy" => Ok(Goal::Hypertrophy),
            "power" => Ok(Goal::Power),
            other => Err(format!(
                "unknown goal '{}' (expected strength, muscle_ups, hypertrophy or power)",
                other
            )),
        }
    }
}

/// Athlete maxes (kg for weighted lifts, reps for bodyweight) and training parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Assessment {
    pub bodyweight_pullups_max: i64,
    pub weighted_pullups_max: i64,
    pub bodyweight_dips_max: i64,
    pub weighted_dips_max: i64,
    pub bodyweight_muscle_ups_max: i64,
    pub weighted_muscle_ups_max: i64,
    pub bodyweight_squats_max: i64,
    pub weighted_squats_max: i64,
    pub bodyweight_pushups_max: i64,
    pub training_days_per_week: u32,
    pub mesocycle_week: u32,
    pub primary_goal: Goal,
    pub athlete_description: String,
}

impl Default for Assessment {
    fn default() -> Self {
        Assessment {
            bodyweight_pullups_max: 0,
            weighted_pullups_max: 0,
            bodyweight_dips_max: 0,
            weighted_dips_max: 0,
            bodyweight_muscle_ups_max: 0,
            weighted_muscle_ups_max: 0,
            bodyweight_squats_max: 0,
            weighted_squats_max: 0,
            bodyweight_pushups_max: 0,
            training_days_per_week: 3,
            mesocycle_week: 1,
            primary_goal: Goal::Strength,
            athlete_description: String::new(),
        }
    }
}

impl Assessment {
    pub fn validate(&self) -> Result<(), AssessmentError> {
        if !(1..=7).contains(&self.training_days_per_week) {
            return Err(AssessmentError::TrainingDays(self.training_days_per_week));
        }
        if self.mesocycle_week == 0 {
            return Err(AssessmentError::MesocycleWeek);
        }
        Ok(())
    }

    pub fn days(&self) -> usize {
        self.training_days_per_week as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let a: Assessment = serde_json::from_str(r#"{"weighted_pullups_max": 40}"#).unwrap();
        assert_eq!(a.weighted_pullups_max, 40);
        assert_eq!(a.training_days_per_week, 3);
        assert_eq!(a.mesocycle_week, 1);
        assert_eq!(a.primary_goal, Goal::Strength);
        assert!(a.athlete_description.is_empty());
    }

    #[test]
    fn goal_wire_names() {
        let a: Assessment = serde_json::from_str(r#"{"primary_goal": "muscle_ups"}"#).unwrap();
        assert_eq!(a.primary_goal, Goal::MuscleUps);
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["primary_goal"], "muscle_ups");
    }

    #[test]
    fn goal_from_str() {
        assert_eq!("Muscle-Ups".parse::<Goal>(), Ok(Goal::MuscleUps));
        assert_eq!("power".parse::<Goal>(), Ok(Goal::Power));
        assert!("cardio".parse::<Goal>().is_err());
    }

    #[test]
    fn validation() {
        let mut a = Assessment::default();
        assert_eq!(a.validate(), Ok(()));
        a.training_days_per_week = 0;
        assert_eq!(a.validate(), Err(AssessmentError::TrainingDays(0)));
        a.training_days_per_week = 8;
        assert_eq!(a.validate(), Err(AssessmentError::TrainingDays(8)));
        a.training_days_per_week = 4;
        a.mesocycle_week = 0;
        assert_eq!(a.validate(), Err(AssessmentError::MesocycleWeek));
    }
}
