pub mod fallback;
pub mod headings;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Day number → day content, ordered by day.
///
/// Serializes as a JSON object keyed by the day number as a string, e.g.
/// `{"1": "Day 1: ...", "2": "Day 2: ..."}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeeklyProgram(BTreeMap<u32, String>);

impl WeeklyProgram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, day: u32, content: String) -> Option<String> {
        self.0.insert(day, content)
    }

    pub fn get(&self, day: u32) -> Option<&str> {
        self.0.get(&day).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn days(&self) -> impl Iterator<Item = (u32, &str)> {
        self.0.iter().map(|(d, c)| (*d, c.as_str()))
    }

    /// Placeholder stored when the model server refused to generate.
    pub fn unavailable(days: usize) -> Self {
        let mut program = Self::new();
        for day in 1..=days as u32 {
            program.insert(
                day,
                format!("Day {}: Error generating program - model server unavailable", day),
            );
        }
        program
    }
}

/// How a program was cut into days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Split on the named heading pattern.
    Heading(&'static str),
    /// No pattern had enough headings; lines were dealt out evenly.
    LineSplit,
    /// Model server refused to generate; see [`WeeklyProgram::unavailable`].
    Placeholder,
}

impl Strategy {
    pub fn label(&self) -> &'static str {
        match self {
            Strategy::Heading(pattern) => pattern,
            Strategy::LineSplit => "line_split",
            Strategy::Placeholder => "placeholder",
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Strategy::LineSplit)
    }
}

/// Two-pass segmentation: heading patterns in declared order, then line split.
pub fn segment(raw: &str, expected_days: usize) -> WeeklyProgram {
    segment_with_strategy(raw, expected_days).0
}

pub fn segment_with_strategy(raw: &str, expected_days: usize) -> (WeeklyProgram, Strategy) {
    match headings::split_on_headings(raw, expected_days) {
        Some((program, pattern)) => (program, Strategy::Heading(pattern)),
        None => (fallback::split_by_lines(raw, expected_days), Strategy::LineSplit),
    }
}

// ── Tests ──
