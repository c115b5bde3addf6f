use super::WeeklyProgram;

/// Deal the text's lines out evenly, giving the remainder to the last day.
///
/// Each day gets a synthesized `Day <d>:` heading line in front of its lines.
pub fn split_by_lines(text: &str, expected_days: usize) -> WeeklyProgram {
    let mut program = WeeklyProgram::new();
    if expected_days == 0 {
        return program;
    }

    let lines: Vec<&str> = text.trim().lines().collect();
    let per_day = (lines.len() / expected_days).max(1);

    for day in 1..=expected_days {
        let start = ((day - 1) * per_day).min(lines.len());
        let end = if day < expected_days {
            (day * per_day).min(lines.len())
        } else {
            lines.len()
        };

        let mut content = format!("Day {}:", day);
        if start < end {
            content.push('\n');
            content.push_str(&lines[start..end].join("\n"));
        }
        program.insert(day as u32, content);
    }

    program
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bodies(program: &WeeklyProgram) -> Vec<Vec<String>> {
        program
            .days()
            .map(|(_, c)| c.lines().skip(1).map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn remainder_goes_to_last_day() {
        let program = split_by_lines("1\n2\n3\n4\n5\n6\n7", 3);
        assert_eq!(
            bodies(&program),
            vec![vec!["1", "2"], vec!["3", "4"], vec!["5", "6", "7"]]
        );
    }

    #[test]
    fn fewer_lines_than_days() {
        let program = split_by_lines("only\ntwo", 4);
        assert_eq!(program.get(1), Some("Day 1:\nonly"));
        assert_eq!(program.get(2), Some("Day 2:\ntwo"));
        assert_eq!(program.get(3), Some("Day 3:"));
        assert_eq!(program.get(4), Some("Day 4:"));
    }

    #[test]
    fn outer_whitespace_dropped_inner_blank_lines_kept() {
        let program = split_by_lines("\n\n a\n\nb \n\n", 1);
        assert_eq!(program.get(1), Some("Day 1:\na\n\nb"));
    }

    #[test]
    fn crlf_lines() {
        let program = split_by_lines("a\r\nb", 2);
        assert_eq!(program.get(1), Some("Day 1:\na"));
        assert_eq!(program.get(2), Some("Day 2:\nb"));
    }

    #[test]
    fn whitespace_only_input() {
        let program = split_by_lines(" \n\t\n", 2);
        assert_eq!(program.get(1), Some("Day 1:"));
        assert_eq!(program.get(2), Some("Day 2:"));
    }
}
