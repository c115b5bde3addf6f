use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};

use crate::assessment::Assessment;
use crate::parser::{Strategy, WeeklyProgram};
use crate::tracking::{ExerciseEntry, ExerciseRecord};

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS generations (
            id              INTEGER PRIMARY KEY,
            raw_text        TEXT NOT NULL,
            assessment_data TEXT NOT NULL,
            model_type      TEXT,
            rejected        BOOLEAN NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS programs (
            id              INTEGER PRIMARY KEY,
            generation_id   INTEGER NOT NULL UNIQUE REFERENCES generations(id),
            program_data    TEXT NOT NULL,
            assessment_data TEXT NOT NULL,
            goal            TEXT NOT NULL,
            training_days   INTEGER NOT NULL,
            mesocycle_week  INTEGER NOT NULL,
            strategy        TEXT NOT NULL,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_programs_goal ON programs(goal);

        CREATE TABLE IF NOT EXISTS workout_logs (
            id              INTEGER PRIMARY KEY,
            program_id      INTEGER NOT NULL REFERENCES programs(id),
            day_number      INTEGER NOT NULL,
            notes           TEXT,
            completed_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS exercise_records (
            id              INTEGER PRIMARY KEY,
            exercise_name   TEXT NOT NULL,
            weight          REAL,
            reps            INTEGER,
            sets            INTEGER,
            rpe             INTEGER,
            rir             INTEGER,
            notes           TEXT,
            date            TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_exercise_records_name_date
            ON exercise_records(exercise_name, date);

        CREATE TABLE IF NOT EXISTS main_exercises (
            id              INTEGER PRIMARY KEY,
            exercise_name   TEXT NOT NULL UNIQUE,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;
    Ok(())
}

// ── Generations ──

pub struct GenerationRow {
    pub id: i64,
    pub raw_text: String,
    pub assessment: Assessment,
    pub rejected: bool,
}

pub fn insert_generation(
    conn: &Connection,
    raw_text: &str,
    assessment: &Assessment,
    model_type: Option<&str>,
    rejected: bool,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO generations (raw_text, assessment_data, model_type, rejected)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![raw_text, serde_json::to_string(assessment)?, model_type, rejected],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Generations that have no program row yet.
pub fn fetch_unprocessed(conn: &Connection, limit: Option<usize>) -> Result<Vec<GenerationRow>> {
    let base = "SELECT g.id, g.raw_text, g.assessment_data, g.rejected FROM generations g
                LEFT JOIN programs p ON p.generation_id = g.id
                WHERE p.id IS NULL ORDER BY g.id";
    query_generations(conn, base, limit)
}

pub fn fetch_generations(conn: &Connection, limit: Option<usize>) -> Result<Vec<GenerationRow>> {
    query_generations(
        conn,
        "SELECT id, raw_text, assessment_data, rejected FROM generations ORDER BY id",
        limit,
    )
}

fn query_generations(conn: &Connection, base: &str, limit: Option<usize>) -> Result<Vec<GenerationRow>> {
    let sql = match limit {
        Some(n) => format!("{} LIMIT {}", base, n),
        None => base.to_string(),
    };
    let mut stmt = conn.prepare(&sql)?;
    let raw = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, bool>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|(id, raw_text, assessment_json, rejected)| {
            let assessment = serde_json::from_str(&assessment_json)
                .with_context(|| format!("Bad assessment_data on generation {}", id))?;
            Ok(GenerationRow {
                id,
                raw_text,
                assessment,
                rejected,
            })
        })
        .collect()
}

// ── Programs ──

pub struct ProgramRow {
    pub generation_id: i64,
    pub program: WeeklyProgram,
    pub assessment: Assessment,
    pub strategy: Strategy,
}

/// Insert or replace the program derived from a generation.
pub fn save_program(conn: &Connection, row: &ProgramRow) -> Result<i64> {
    let id = conn.query_row(
        "INSERT INTO programs
            (generation_id, program_data, assessment_data, goal, training_days, mesocycle_week, strategy)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(generation_id) DO UPDATE SET
            program_data = excluded.program_data,
            assessment_data = excluded.assessment_data,
            goal = excluded.goal,
            training_days = excluded.training_days,
            mesocycle_week = excluded.mesocycle_week,
            strategy = excluded.strategy
         RETURNING id",
        rusqlite::params![
            row.generation_id,
            serde_json::to_string(&row.program)?,
            serde_json::to_string(&row.assessment)?,
            row.assessment.primary_goal.as_str(),
            row.assessment.training_days_per_week,
            row.assessment.mesocycle_week,
            row.strategy.label(),
        ],
        |r| r.get(0),
    )?;
    Ok(id)
}

pub fn save_programs(conn: &Connection, rows: &[ProgramRow]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    for row in rows {
        save_program(&tx, row)?;
    }
    tx.commit()?;
    Ok(rows.len())
}

pub struct StoredProgram {
    pub id: i64,
    pub generation_id: i64,
    pub program: WeeklyProgram,
    pub assessment: Assessment,
    pub strategy: String,
    pub created_at: String,
}

const PROGRAM_COLUMNS: &str =
    "id, generation_id, program_data, assessment_data, strategy, created_at";

fn stored_from_row(row: &rusqlite::Row) -> rusqlite::Result<(i64, i64, String, String, String, String)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn decode_stored(
    (id, generation_id, program_json, assessment_json, strategy, created_at): (i64, i64, String, String, String, String),
) -> Result<StoredProgram> {
    Ok(StoredProgram {
        id,
        generation_id,
        program: serde_json::from_str(&program_json)
            .with_context(|| format!("Bad program_data on program {}", id))?,
        assessment: serde_json::from_str(&assessment_json)
            .with_context(|| format!("Bad assessment_data on program {}", id))?,
        strategy,
        created_at,
    })
}

/// Most recent first.
pub fn fetch_programs(conn: &Connection, limit: usize) -> Result<Vec<StoredProgram>> {
    let sql = format!(
        "SELECT {} FROM programs ORDER BY created_at DESC, id DESC LIMIT ?1",
        PROGRAM_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([limit as i64], stored_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(decode_stored).collect()
}

pub fn fetch_program(conn: &Connection, id: i64) -> Result<Option<StoredProgram>> {
    let sql = format!("SELECT {} FROM programs WHERE id = ?1", PROGRAM_COLUMNS);
    let row = conn.query_row(&sql, [id], stored_from_row).optional()?;
    row.map(decode_stored).transpose()
}

// ── Training log ──

pub fn insert_workout_log(conn: &Connection, program_id: i64, day: u32, notes: Option<&str>) -> Result<i64> {
    conn.execute(
        "INSERT INTO workout_logs (program_id, day_number, notes) VALUES (?1, ?2, ?3)",
        rusqlite::params![program_id, day, notes],
    )
    .with_context(|| format!("Failed to log day {} of program {}", day, program_id))?;
    Ok(conn.last_insert_rowid())
}

#[derive(Debug, serde::Serialize)]
pub struct WorkoutLog {
    pub id: i64,
    pub program_id: i64,
    pub day_number: u32,
    pub notes: Option<String>,
    pub completed_at: String,
}

/// Most recent first.
pub fn fetch_workout_logs(conn: &Connection, limit: usize) -> Result<Vec<WorkoutLog>> {
    let mut stmt = conn.prepare(
        "SELECT id, program_id, day_number, notes, completed_at FROM workout_logs
         ORDER BY completed_at DESC, id DESC LIMIT ?1",
    )?;
    let logs = stmt
        .query_map([limit as i64], |r| {
            Ok(WorkoutLog {
                id: r.get(0)?,
                program_id: r.get(1)?,
                day_number: r.get(2)?,
                notes: r.get(3)?,
                completed_at: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(logs)
}

/// `date` defaults to now.
pub fn insert_exercise_record(conn: &Connection, entry: &ExerciseEntry, date: Option<&str>) -> Result<i64> {
    let notes = Some(entry.notes.as_str()).filter(|n| !n.is_empty());
    conn.execute(
        "INSERT INTO exercise_records (exercise_name, weight, reps, sets, rpe, rir, notes, date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, COALESCE(?8, datetime('now')))",
        rusqlite::params![
            entry.exercise_name.trim(),
            entry.weight,
            entry.reps,
            entry.sets,
            entry.rpe,
            entry.rir,
            notes,
            date,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

const RECORD_COLUMNS: &str = "date, weight, reps, sets, rpe, rir, notes";

fn record_from_row(r: &rusqlite::Row) -> rusqlite::Result<ExerciseRecord> {
    Ok(ExerciseRecord {
        date: r.get(0)?,
        weight: r.get(1)?,
        reps: r.get(2)?,
        sets: r.get(3)?,
        rpe: r.get(4)?,
        rir: r.get(5)?,
        notes: r.get(6)?,
    })
}

/// Records for one exercise on or after `since`, oldest first.
pub fn fetch_progress(conn: &Connection, exercise: &str, since: &str) -> Result<Vec<ExerciseRecord>> {
    let sql = format!(
        "SELECT {} FROM exercise_records WHERE exercise_name = ?1 AND date >= ?2
         ORDER BY date ASC, id ASC",
        RECORD_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let records = stmt
        .query_map(rusqlite::params![exercise, since], record_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

/// Latest `limit` records for one exercise, newest first.
pub fn fetch_recent_records(conn: &Connection, exercise: &str, limit: usize) -> Result<Vec<ExerciseRecord>> {
    let sql = format!(
        "SELECT {} FROM exercise_records WHERE exercise_name = ?1
         ORDER BY date DESC, id DESC LIMIT ?2",
        RECORD_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let records = stmt
        .query_map(rusqlite::params![exercise, limit as i64], record_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

/// `false` if the exercise was already on the list.
pub fn add_main_exercise(conn: &Connection, exercise: &str) -> Result<bool> {
    let n = conn.execute(
        "INSERT OR IGNORE INTO main_exercises (exercise_name) VALUES (?1)",
        [exercise.trim()],
    )?;
    Ok(n > 0)
}

/// In the order they were added.
pub fn fetch_main_exercises(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT exercise_name FROM main_exercises ORDER BY created_at, id")?;
    let names = stmt
        .query_map([], |r| r.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(names)
}

// ── Stats ──

pub struct Stats {
    pub generations: usize,
    pub rejected: usize,
    pub programs: usize,
    pub unprocessed: usize,
    pub line_split: usize,
    pub workouts_logged: usize,
    pub exercise_records: usize,
    pub avg_days_per_week: Option<f64>,
    pub favorite_goal: Option<String>,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let count = |sql: &str| -> Result<usize> {
        let n: i64 = conn.query_row(sql, [], |r| r.get(0))?;
        Ok(n as usize)
    };
    let avg_days_per_week: Option<f64> =
        conn.query_row("SELECT AVG(training_days) FROM programs", [], |r| r.get(0))?;
    let favorite_goal: Option<String> = conn
        .query_row(
            "SELECT goal FROM programs GROUP BY goal ORDER BY COUNT(*) DESC, goal LIMIT 1",
            [],
            |r| r.get(0),
        )
        .optional()?;

    Ok(Stats {
        generations: count("SELECT COUNT(*) FROM generations")?,
        rejected: count("SELECT COUNT(*) FROM generations WHERE rejected = 1")?,
        programs: count("SELECT COUNT(*) FROM programs")?,
        unprocessed: count(
            "SELECT COUNT(*) FROM generations g LEFT JOIN programs p ON p.generation_id = g.id
             WHERE p.id IS NULL",
        )?,
        line_split: count("SELECT COUNT(*) FROM programs WHERE strategy = 'line_split'")?,
        workouts_logged: count("SELECT COUNT(*) FROM workout_logs")?,
        exercise_records: count("SELECT COUNT(*) FROM exercise_records")?,
        avg_days_per_week: avg_days_per_week.map(|a| (a * 10.0).round() / 10.0),
        favorite_goal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::Goal;
    use crate::parser;

    fn memory() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn store(conn: &Connection, text: &str, assessment: &Assessment) -> i64 {
        let gen_id = insert_generation(conn, text, assessment, Some("Base model"), false).unwrap();
        let (program, strategy) = parser::segment_with_strategy(text, assessment.days());
        save_program(
            conn,
            &ProgramRow {
                generation_id: gen_id,
                program,
                assessment: assessment.clone(),
                strategy,
            },
        )
        .unwrap()
    }

    #[test]
    fn program_round_trips_through_store() {
        let conn = memory();
        let a = Assessment {
            training_days_per_week: 2,
            ..Default::default()
        };
        let id = store(&conn, "Day 1: rows\nDay 2: dips", &a);
        let p = fetch_program(&conn, id).unwrap().unwrap();
        assert_eq!(p.program.get(1), Some("Day 1: rows"));
        assert_eq!(p.assessment, a);
        assert_eq!(p.strategy, r"Day ([0-9]+):");
        assert!(fetch_program(&conn, id + 1).unwrap().is_none());
    }

    #[test]
    fn unprocessed_until_saved() {
        let conn = memory();
        let a = Assessment::default();
        let gen_id = insert_generation(&conn, "just text", &a, None, false).unwrap();
        let pending = fetch_unprocessed(&conn, None).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, gen_id);
        assert_eq!(pending[0].raw_text, "just text");

        let (program, strategy) = parser::segment_with_strategy(&pending[0].raw_text, 3);
        save_programs(
            &conn,
            &[ProgramRow {
                generation_id: gen_id,
                program,
                assessment: a,
                strategy,
            }],
        )
        .unwrap();
        assert!(fetch_unprocessed(&conn, None).unwrap().is_empty());
        assert_eq!(fetch_generations(&conn, Some(5)).unwrap().len(), 1);
    }

    #[test]
    fn save_program_upserts_by_generation() {
        let conn = memory();
        let a = Assessment {
            training_days_per_week: 1,
            ..Default::default()
        };
        let first = store(&conn, "Day 1: a", &a);
        let gen_id = fetch_program(&conn, first).unwrap().unwrap().generation_id;
        let again = save_program(
            &conn,
            &ProgramRow {
                generation_id: gen_id,
                program: parser::segment("Day 1: b", 1),
                assessment: a,
                strategy: Strategy::LineSplit,
            },
        )
        .unwrap();
        assert_eq!(first, again);
        let p = fetch_program(&conn, first).unwrap().unwrap();
        assert_eq!(p.program.get(1), Some("Day 1: b"));
        assert_eq!(p.strategy, "line_split");
    }

    #[test]
    fn stats() {
        let conn = memory();
        let empty = get_stats(&conn).unwrap();
        assert_eq!(empty.programs, 0);
        assert!(empty.avg_days_per_week.is_none());
        assert!(empty.favorite_goal.is_none());

        let power = Assessment {
            training_days_per_week: 4,
            primary_goal: Goal::Power,
            ..Default::default()
        };
        store(&conn, "Day 1: a\nDay 2: b\nDay 3: c\nDay 4: d", &power);
        store(&conn, "no headings", &power);
        store(&conn, "Day 1: a\nDay 2: b\nDay 3: c", &Assessment::default());
        insert_generation(&conn, "", &power, None, true).unwrap();

        let s = get_stats(&conn).unwrap();
        assert_eq!(s.generations, 4);
        assert_eq!(s.rejected, 1);
        assert_eq!(s.programs, 3);
        assert_eq!(s.unprocessed, 1);
        assert_eq!(s.line_split, 1);
        assert_eq!(s.avg_days_per_week, Some(3.7));
        assert_eq!(s.favorite_goal.as_deref(), Some("power"));
        assert_eq!(fetch_programs(&conn, 2).unwrap().len(), 2);
        assert_eq!(s.workouts_logged, 0);
    }

    fn entry(name: &str, weight: f64, reps: u32) -> ExerciseEntry {
        ExerciseEntry {
            exercise_name: name.to_string(),
            weight: Some(weight),
            reps: Some(reps),
            sets: Some(3),
            ..Default::default()
        }
    }

    #[test]
    fn workout_log_needs_existing_program() {
        let conn = memory();
        let a = Assessment {
            training_days_per_week: 2,
            ..Default::default()
        };
        let program_id = store(&conn, "Day 1: rows\nDay 2: dips", &a);
        insert_workout_log(&conn, program_id, 1, Some("felt strong")).unwrap();
        insert_workout_log(&conn, program_id, 2, None).unwrap();
        assert!(insert_workout_log(&conn, program_id + 10, 1, None).is_err());

        let logs = fetch_workout_logs(&conn, 10).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].day_number, 2);
        assert_eq!(logs[1].notes.as_deref(), Some("felt strong"));
        assert_eq!(get_stats(&conn).unwrap().workouts_logged, 2);
    }

    #[test]
    fn progress_window_oldest_first() {
        let conn = memory();
        insert_exercise_record(&conn, &entry("Weighted dips", 30.0, 6), Some("2025-01-05 00:00:00")).unwrap();
        insert_exercise_record(&conn, &entry("Weighted dips", 35.0, 5), Some("2025-03-01 00:00:00")).unwrap();
        insert_exercise_record(&conn, &entry("Weighted dips", 32.5, 6), Some("2025-02-10 00:00:00")).unwrap();
        insert_exercise_record(&conn, &entry("Squats", 100.0, 5), Some("2025-02-11 00:00:00")).unwrap();

        let records = fetch_progress(&conn, "Weighted dips", "2025-02-01 00:00:00").unwrap();
        let weights: Vec<Option<f64>> = records.iter().map(|r| r.weight).collect();
        assert_eq!(weights, vec![Some(32.5), Some(35.0)]);
        assert_eq!(records[0].date, "2025-02-10 00:00:00");
        assert!(records[0].notes.is_none());

        let recent = fetch_recent_records(&conn, "Weighted dips", 2).unwrap();
        assert_eq!(recent[0].weight, Some(35.0));
        assert_eq!(recent.len(), 2);
        assert_eq!(get_stats(&conn).unwrap().exercise_records, 4);
    }

    #[test]
    fn exercise_record_defaults_to_now() {
        let conn = memory();
        let mut e = entry("Muscle-ups", 0.0, 3);
        e.notes = "strict".into();
        insert_exercise_record(&conn, &e, None).unwrap();
        let records = fetch_progress(&conn, "Muscle-ups", "2000-01-01 00:00:00").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].date.len(), 19);
        assert_eq!(records[0].notes.as_deref(), Some("strict"));
    }

    #[test]
    fn main_exercises_ignore_duplicates() {
        let conn = memory();
        assert!(add_main_exercise(&conn, "Weighted pull-ups").unwrap());
        assert!(add_main_exercise(&conn, "Weighted dips").unwrap());
        assert!(!add_main_exercise(&conn, "Weighted pull-ups ").unwrap());
        assert_eq!(
            fetch_main_exercises(&conn).unwrap(),
            vec!["Weighted pull-ups".to_string(), "Weighted dips".to_string()]
        );
    }
}
