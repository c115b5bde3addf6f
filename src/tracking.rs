use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

/// Timestamp layout SQLite's `datetime('now')` produces.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TrackingError {
    #[error("exercise name required")]
    MissingName,
    #[error("rpe must be between 1 and 10, got {0}")]
    Rpe(u32),
    #[error("rir must be between 0 and 10, got {0}")]
    Rir(u32),
    #[error("invalid date '{0}' (expected YYYY-MM-DD)")]
    Date(String),
}

/// One logged set block for an exercise, as entered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExerciseEntry {
    pub exercise_name: String,
    pub weight: Option<f64>,
    pub reps: Option<u32>,
    pub sets: Option<u32>,
    pub rpe: Option<u32>,
    pub rir: Option<u32>,
    pub notes: String,
}

impl ExerciseEntry {
    pub fn validate(&self) -> Result<(), TrackingError> {
        if self.exercise_name.trim().is_empty() {
            return Err(TrackingError::MissingName);
        }
        if let Some(rpe) = self.rpe.filter(|r| !(1..=10).contains(r)) {
            return Err(TrackingError::Rpe(rpe));
        }
        if let Some(rir) = self.rir.filter(|r| *r > 10) {
            return Err(TrackingError::Rir(rir));
        }
        Ok(())
    }
}

/// A stored exercise record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExerciseRecord {
    pub date: String,
    pub weight: Option<f64>,
    pub reps: Option<u32>,
    pub sets: Option<u32>,
    pub rpe: Option<u32>,
    pub rir: Option<u32>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[default]
    Weight,
    /// weight × reps × sets
    Volume,
    MaxReps,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub date: String,
    pub value: f64,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Trend {
    pub percentage: f64,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chart {
    pub exercise_name: String,
    pub metric: Metric,
    pub points: Vec<ChartPoint>,
    pub trend: Option<Trend>,
}

/// Value of `metric` for one record. Missing or zero inputs yield no point.
fn metric_value(record: &ExerciseRecord, metric: Metric) -> Option<(f64, String)> {
    let nonzero_f = |v: Option<f64>| v.filter(|x| *x != 0.0);
    let nonzero_u = |v: Option<u32>| v.filter(|x| *x != 0);
    match metric {
        Metric::Weight => nonzero_f(record.weight).map(|w| (w, format!("{}kg", w))),
        Metric::Volume => {
            let w = nonzero_f(record.weight)?;
            let reps = nonzero_u(record.reps)?;
            let sets = nonzero_u(record.sets)?;
            let volume = w * reps as f64 * sets as f64;
            Some((volume, format!("{:.0}kg", volume)))
        }
        Metric::MaxReps => nonzero_u(record.reps).map(|r| (r as f64, format!("{} reps", r))),
    }
}

/// Chart series over records in ascending date order, with a first-to-last trend
/// once there are two points.
pub fn chart(exercise_name: &str, records: &[ExerciseRecord], metric: Metric) -> Chart {
    let points: Vec<ChartPoint> = records
        .iter()
        .filter_map(|r| {
            let (value, label) = metric_value(r, metric)?;
            Some(ChartPoint {
                date: r.date.chars().take(10).collect(),
                value,
                label,
            })
        })
        .collect();

    let trend = match (points.first(), points.last()) {
        (Some(first), Some(last)) if points.len() >= 2 => Some(trend(first.value, last.value)),
        _ => None,
    };

    Chart {
        exercise_name: exercise_name.to_string(),
        metric,
        points,
        trend,
    }
}

fn trend(first: f64, last: f64) -> Trend {
    let pct = if first > 0.0 {
        (last - first) / first * 100.0
    } else {
        0.0
    };
    let direction = if pct > 0.0 {
        Direction::Up
    } else if pct < 0.0 {
        Direction::Down
    } else {
        Direction::Stable
    };
    Trend {
        percentage: (pct * 100.0).round() / 100.0,
        direction,
    }
}

/// Lower bound for a "last N days" query, in the store's timestamp layout.
pub fn since(now: NaiveDateTime, days_back: u32) -> String {
    (now - chrono::Duration::days(days_back as i64))
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

/// `YYYY-MM-DD` from the command line → midnight timestamp.
pub fn parse_day(s: &str) -> Result<String, TrackingError> {
    let day = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| TrackingError::Date(s.to_string()))?;
    Ok(format!("{} 00:00:00", day.format("%Y-%m-%d")))
}
