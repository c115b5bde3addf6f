use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

use super::WeeklyProgram;

/// Day-heading patterns, most specific first. All are matched case-insensitively,
/// so the upper-case variants only differ by where they sit in the order.
/// Day numbers are ASCII digits only; anything else never counts as a heading.
pub const PATTERNS: &[&str] = &[
    r"Day ([0-9]+):",
    r"Day ([0-9]+)\n",
    r"Day ([0-9]+)",
    r"DAY ([0-9]+):",
    r"DAY ([0-9]+)",
];

static HEADING_RES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    PATTERNS
        .iter()
        .map(|p| {
            let re = RegexBuilder::new(p).case_insensitive(true).build().unwrap();
            (*p, re)
        })
        .collect()
});

/// A recognised heading: where it starts and the day number written in it.
#[derive(Debug, Clone, Copy)]
struct Heading {
    start: usize,
    day: Option<u32>,
}

/// Split on the first pattern that finds at least `expected_days` headings.
///
/// Returns `None` when no pattern qualifies. A pattern whose leading headings
/// repeat a day number (or carry 0 / an overflowing number) would produce fewer
/// than `expected_days` entries, so it is skipped like an insufficient one.
pub fn split_on_headings(text: &str, expected_days: usize) -> Option<(WeeklyProgram, &'static str)> {
    for (pattern, re) in HEADING_RES.iter() {
        let headings = find_headings(re, text);
        if headings.len() < expected_days {
            continue;
        }
        if let Some(program) = cut_segments(text, &headings, expected_days) {
            return Some((program, *pattern));
        }
    }
    None
}

fn find_headings(re: &Regex, text: &str) -> Vec<Heading> {
    re.captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let day = caps
                .get(1)
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .filter(|d| *d > 0);
            Some(Heading {
                start: whole.start(),
                day,
            })
        })
        .collect()
}

/// Segment `i` runs from heading `i` to heading `i + 1` (counting every heading,
/// not just the first `take`), or to the end of the text.
fn cut_segments(text: &str, headings: &[Heading], take: usize) -> Option<WeeklyProgram> {
    let mut days: BTreeMap<u32, String> = BTreeMap::new();

    for (i, heading) in headings.iter().take(take).enumerate() {
        let day = heading.day?;
        let end = headings.get(i + 1).map(|h| h.start).unwrap_or(text.len());
        let content = text[heading.start..end].trim().to_string();
        if days.insert(day, content).is_some() {
            return None;
        }
    }

    let mut program = WeeklyProgram::new();
    for (day, content) in days {
        program.insert(day, content);
    }
    Some(program)
}
