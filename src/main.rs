mod assessment;
mod db;
mod model;
mod parser;
mod settings;
mod tracking;

use std::borrow::Cow;
use std::io::Read;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{info, warn};

use assessment::{Assessment, Goal};
use model::{GenerationOutcome, ModelClient};
use parser::{Strategy, WeeklyProgram};
use settings::Settings;
use tracking::{ExerciseEntry, Metric};

#[derive(Parser)]
#[command(name = "program_parser", about = "Generate and segment weekly training programs")]
struct Cli {
    /// Model server base URL (overrides PROGRAM_MODEL_URL)
    #[arg(long, global = true)]
    model_url: Option<String>,
    /// SQLite database path (overrides PROGRAM_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split raw program text into days and print it as JSON
    Segment {
        /// Number of training days to cut the text into
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
        days: u32,
        /// Text file to read (default: stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Ask the model server for a program, segment it and store it
    Generate {
        /// Assessment JSON file
        #[arg(short, long)]
        assessment: Option<PathBuf>,
        /// Training days per week
        #[arg(short, long)]
        days: Option<u32>,
        /// strength, muscle_ups, hypertrophy or power
        #[arg(short, long)]
        goal: Option<Goal>,
        /// Current week in the mesocycle
        #[arg(short, long)]
        week: Option<u32>,
        /// Free-text athlete description passed to the model
        #[arg(long)]
        description: Option<String>,
    },
    /// Re-segment stored generations
    Process {
        /// Max generations to process
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Include generations that already have a program
        #[arg(long)]
        all: bool,
    },
    /// Stored programs table
    Programs {
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
    /// Print one stored program as JSON
    Show { id: i64 },
    /// Model server health and model info
    Status,
    /// Store statistics
    Stats,
    /// Record a completed day of a stored program
    LogWorkout {
        /// Stored program id
        #[arg(short, long)]
        program: i64,
        /// Day number within that program
        #[arg(short, long)]
        day: u32,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Recently completed workouts
    Workouts {
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
    /// Record one exercise: load, reps, sets and effort
    LogExercise {
        exercise: String,
        /// Load in kg
        #[arg(short, long)]
        weight: Option<f64>,
        #[arg(short, long)]
        reps: Option<u32>,
        #[arg(short, long)]
        sets: Option<u32>,
        /// Rate of perceived exertion, 1-10
        #[arg(long)]
        rpe: Option<u32>,
        /// Reps in reserve
        #[arg(long)]
        rir: Option<u32>,
        #[arg(long)]
        notes: Option<String>,
        /// YYYY-MM-DD (default: now)
        #[arg(long)]
        date: Option<String>,
    },
    /// Exercises tracked on the dashboard
    MainExercise {
        #[command(subcommand)]
        action: MainExerciseAction,
    },
    /// Records and trend for one exercise
    Progress {
        exercise: String,
        /// How far back to look
        #[arg(long, default_value = "90")]
        days: u32,
        #[arg(short, long, value_enum, default_value_t = Metric::Weight)]
        metric: Metric,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Latest records for every main exercise
    Dashboard {
        #[arg(short = 'n', long, default_value = "10")]
        recent: usize,
    },
}

#[derive(Subcommand)]
enum MainExerciseAction {
    Add { exercise: String },
    List,
}

#[derive(Serialize)]
struct ProgressResponse<'a> {
    exercise_name: &'a str,
    total_sessions: usize,
    records: &'a [tracking::ExerciseRecord],
    chart: &'a tracking::Chart,
}

/// Shape returned to API consumers for a generated program.
#[derive(Serialize)]
struct ProgramResponse<'a> {
    id: String,
    weekly_program: &'a WeeklyProgram,
    assessment: &'a Assessment,
    created_at: String,
    generated_with_llm: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load()?;
    if let Some(url) = cli.model_url {
        settings.model_url = url.trim_end_matches('/').to_string();
    }
    if let Some(path) = cli.db {
        settings.db_path = path;
    }

    let result = match cli.command {
        Commands::Segment { days, input } => {
            let text = read_input(input.as_deref())?;
            let (program, strategy) = parser::segment_with_strategy(&text, days as usize);
            log_strategy(strategy);
            println!("{}", serde_json::to_string_pretty(&program)?);
            Ok(())
        }
        Commands::Generate {
            assessment,
            days,
            goal,
            week,
            description,
        } => {
            let mut a = match assessment {
                Some(path) => {
                    let raw = std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read {:?}", path))?;
                    serde_json::from_str(&raw)
                        .with_context(|| format!("Invalid assessment JSON in {:?}", path))?
                }
                None => Assessment::default(),
            };
            if let Some(d) = days {
                a.training_days_per_week = d;
            }
            if let Some(g) = goal {
                a.primary_goal = g;
            }
            if let Some(w) = week {
                a.mesocycle_week = w;
            }
            if let Some(desc) = description {
                a.athlete_description = desc;
            }
            a.validate()?;
            generate(&settings, &a).await
        }
        Commands::Process { limit, all } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let rows = if all {
                db::fetch_generations(&conn, limit)?
            } else {
                db::fetch_unprocessed(&conn, limit)?
            };
            if rows.is_empty() {
                println!("No generations to process. Run 'generate' first.");
                return Ok(());
            }
            println!("Processing {} generations...", rows.len());
            let started = Instant::now();
            let counts = process_generations(&conn, &rows)?;
            counts.print();
            println!("Processed in {}", elapsed_label(started.elapsed()));
            Ok(())
        }
        Commands::Programs { limit } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let rows = db::fetch_programs(&conn, limit)?;
            if rows.is_empty() {
                println!("No programs stored.");
                return Ok(());
            }

            println!(
                "{:>4} | {:<19} | {:<11} | {:>4} | {:>4} | {:<14} | {:<30}",
                "#", "Created", "Goal", "Days", "Week", "Strategy", "Day 1"
            );
            println!("{}", "-".repeat(104));
            for r in &rows {
                let first = r
                    .program
                    .days()
                    .next()
                    .map(|(_, c)| c.lines().next().unwrap_or("").to_string())
                    .unwrap_or_default();
                println!(
                    "{:>4} | {:<19} | {:<11} | {:>4} | {:>4} | {:<14} | {:<30}",
                    r.id,
                    clip(&r.created_at, 19),
                    r.assessment.primary_goal,
                    r.program.len(),
                    r.assessment.mesocycle_week,
                    clip(&r.strategy, 14),
                    clip(&first, 30)
                );
            }
            println!("\n{} programs", rows.len());
            Ok(())
        }
        Commands::Show { id } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let Some(p) = db::fetch_program(&conn, id)? else {
                bail!("No program with id {}", id);
            };
            info!("Program {} (generation {}, {})", p.id, p.generation_id, p.strategy);
            let resp = ProgramResponse {
                id: p.id.to_string(),
                weekly_program: &p.program,
                assessment: &p.assessment,
                created_at: p.created_at.clone(),
                generated_with_llm: p.strategy != Strategy::Placeholder.label(),
            };
            println!("{}", serde_json::to_string_pretty(&resp)?);
            Ok(())
        }
        Commands::Status => {
            let client = ModelClient::new(&settings.model_url, settings.timeout());
            let ready = client.health().await;
            println!("Model server: {}", client.base_url());
            println!("Ready:        {}", ready);
            if ready {
                let s = client.model_status().await?;
                println!("Loaded:       {}", s.model_loaded);
                if let Some(t) = s.model_type {
                    println!("Model type:   {}", t);
                }
                if let Some(ft) = s.is_fine_tuned {
                    println!("Fine-tuned:   {}", ft);
                }
                if let Some(d) = s.device {
                    println!("Device:       {}", d);
                }
                if let Some(e) = s.error {
                    println!("Error:        {}", e);
                }
            }
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Generations: {}", s.generations);
            println!("Rejected:    {}", s.rejected);
            println!("Programs:    {}", s.programs);
            println!("Unprocessed: {}", s.unprocessed);
            println!("Line split:  {}", s.line_split);
            println!(
                "Avg days:    {}",
                s.avg_days_per_week
                    .map(|a| format!("{:.1}", a))
                    .unwrap_or_else(|| "-".into())
            );
            println!("Top goal:    {}", s.favorite_goal.as_deref().unwrap_or("-"));
            println!("Workouts:    {}", s.workouts_logged);
            println!("Exercises:   {}", s.exercise_records);
            Ok(())
        }
        Commands::LogWorkout { program, day, notes } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let Some(p) = db::fetch_program(&conn, program)? else {
                bail!("No program with id {}", program);
            };
            if p.program.get(day).is_none() {
                let days: Vec<String> = p.program.days().map(|(d, _)| d.to_string()).collect();
                bail!("Program {} has no day {} (days: {})", program, day, days.join(", "));
            }
            let id = db::insert_workout_log(&conn, program, day, notes.as_deref())?;
            info!("Workout {} logged for program {} day {}", id, program, day);
            println!("Logged day {} of program {}", day, program);
            Ok(())
        }
        Commands::Workouts { limit } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let logs = db::fetch_workout_logs(&conn, limit)?;
            if logs.is_empty() {
                println!("No workouts logged.");
                return Ok(());
            }
            println!("{:<19} | {:>7} | {:>3} | {:<40}", "Completed", "Program", "Day", "Notes");
            println!("{}", "-".repeat(78));
            for l in &logs {
                println!(
                    "{:<19} | {:>7} | {:>3} | {:<40}",
                    clip(&l.completed_at, 19),
                    l.program_id,
                    l.day_number,
                    clip(l.notes.as_deref().unwrap_or(""), 40)
                );
            }
            Ok(())
        }
        Commands::LogExercise {
            exercise,
            weight,
            reps,
            sets,
            rpe,
            rir,
            notes,
            date,
        } => {
            let entry = ExerciseEntry {
                exercise_name: exercise,
                weight,
                reps,
                sets,
                rpe,
                rir,
                notes: notes.unwrap_or_default(),
            };
            entry.validate()?;
            let date = date.as_deref().map(tracking::parse_day).transpose()?;
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let id = db::insert_exercise_record(&conn, &entry, date.as_deref())?;
            info!(record = id, "Logged {}", entry.exercise_name.trim());
            println!("Logged {}", entry.exercise_name.trim());
            Ok(())
        }
        Commands::MainExercise { action } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            match action {
                MainExerciseAction::Add { exercise } => {
                    if exercise.trim().is_empty() {
                        bail!("Exercise name required");
                    }
                    if db::add_main_exercise(&conn, &exercise)? {
                        println!("Added {} to main exercises", exercise.trim());
                    } else {
                        println!("{} is already a main exercise", exercise.trim());
                    }
                }
                MainExerciseAction::List => {
                    let names = db::fetch_main_exercises(&conn)?;
                    if names.is_empty() {
                        println!("No main exercises. Add one with 'main-exercise add <name>'.");
                    }
                    for name in names {
                        println!("{}", name);
                    }
                }
            }
            Ok(())
        }
        Commands::Progress {
            exercise,
            days,
            metric,
            json,
        } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let since = tracking::since(chrono::Utc::now().naive_utc(), days);
            let records = db::fetch_progress(&conn, &exercise, &since)?;
            let chart = tracking::chart(&exercise, &records, metric);
            if json {
                let resp = ProgressResponse {
                    exercise_name: &exercise,
                    total_sessions: records.len(),
                    records: &records,
                    chart: &chart,
                };
                println!("{}", serde_json::to_string_pretty(&resp)?);
                return Ok(());
            }
            if chart.points.is_empty() {
                println!("No {} records for {} in the last {} days.", metric_name(metric), exercise, days);
                return Ok(());
            }
            println!("{:<10} | {:>10} | {:<12}", "Date", "Value", "Label");
            println!("{}", "-".repeat(38));
            for pt in &chart.points {
                println!("{:<10} | {:>10.1} | {:<12}", pt.date, pt.value, pt.label);
            }
            println!("\n{} sessions in the last {} days", records.len(), days);
            if let Some(t) = chart.trend {
                println!("Trend: {:+.2}% ({:?})", t.percentage, t.direction);
            }
            Ok(())
        }
        Commands::Dashboard { recent } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let names = db::fetch_main_exercises(&conn)?;
            if names.is_empty() {
                println!("No main exercises. Add one with 'main-exercise add <name>'.");
                return Ok(());
            }
            for name in &names {
                let records = db::fetch_recent_records(&conn, name, recent)?;
                println!("{} ({} recent)", name, records.len());
                for r in &records {
                    println!(
                        "  {:<10}  {:>7}  {:>4} x {:<3} {}",
                        r.date.get(..10).unwrap_or(r.date.as_str()),
                        r.weight.map(|w| format!("{}kg", w)).unwrap_or_else(|| "-".into()),
                        r.sets.map(|v| v.to_string()).unwrap_or_else(|| "-".into()),
                        r.reps.map(|v| v.to_string()).unwrap_or_else(|| "-".into()),
                        r.rpe.map(|v| format!("@{}", v)).unwrap_or_default(),
                    );
                }
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", elapsed_label(elapsed));
    }

    result
}

async fn generate(settings: &Settings, assessment: &Assessment) -> Result<()> {
    let client = ModelClient::new(&settings.model_url, settings.timeout());
    if !client.health().await {
        bail!(
            "Model server at {} is not responding. Start the model server first.",
            client.base_url()
        );
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    spinner.set_message(format!(
        "Generating {}-day {} program...",
        assessment.training_days_per_week, assessment.primary_goal
    ));
    spinner.enable_steady_tick(Duration::from_millis(120));
    let outcome = client.generate(assessment).await;
    spinner.finish_and_clear();

    let conn = db::connect(&settings.db_path)?;
    db::init_schema(&conn)?;
    let (program_id, program, strategy) = record_outcome(&conn, assessment, &outcome?)?;

    let resp = ProgramResponse {
        id: program_id.to_string(),
        weekly_program: &program,
        assessment,
        created_at: chrono::Local::now().to_rfc3339(),
        generated_with_llm: strategy != Strategy::Placeholder,
    };
    println!("{}", serde_json::to_string_pretty(&resp)?);
    Ok(())
}

/// Days for a generation: the segmented text, or the placeholder when the
/// server refused.
fn program_for_outcome(outcome: &GenerationOutcome, days: usize) -> (WeeklyProgram, Strategy) {
    match outcome {
        GenerationOutcome::Generated(g) => parser::segment_with_strategy(&g.weekly_program, days),
        GenerationOutcome::Rejected { .. } => (WeeklyProgram::unavailable(days), Strategy::Placeholder),
    }
}

/// Store the generation and its program. Returns the program id.
fn record_outcome(
    conn: &rusqlite::Connection,
    assessment: &Assessment,
    outcome: &GenerationOutcome,
) -> Result<(i64, WeeklyProgram, Strategy)> {
    let generation_id = match outcome {
        GenerationOutcome::Generated(g) => {
            info!(
                model_type = g.model_type.as_deref().unwrap_or("unknown"),
                generated_at = g.generated_at.as_deref().unwrap_or("-"),
                "Received {} chars of program text",
                g.weekly_program.len()
            );
            db::insert_generation(conn, &g.weekly_program, assessment, g.model_type.as_deref(), false)?
        }
        GenerationOutcome::Rejected { status, body } => {
            warn!("Generation rejected ({}), storing placeholder program", status);
            db::insert_generation(conn, body, assessment, None, true)?
        }
    };

    let (program, strategy) = program_for_outcome(outcome, assessment.days());
    if strategy != Strategy::Placeholder {
        log_strategy(strategy);
    }
    let program_id = db::save_program(
        conn,
        &db::ProgramRow {
            generation_id,
            program: program.clone(),
            assessment: assessment.clone(),
            strategy,
        },
    )?;
    info!("Program {} saved with {} days", program_id, program.len());
    Ok((program_id, program, strategy))
}

struct ProcessCounts {
    programs: usize,
    by_heading: usize,
    line_split: usize,
    placeholders: usize,
}

impl ProcessCounts {
    fn print(&self) {
        println!(
            "Saved {} programs ({} by heading, {} line split, {} placeholders).",
            self.programs, self.by_heading, self.line_split, self.placeholders,
        );
    }
}

fn process_generations(
    conn: &rusqlite::Connection,
    rows: &[db::GenerationRow],
) -> Result<ProcessCounts> {
    use rayon::prelude::*;

    let pb = ProgressBar::new(rows.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let mut counts = ProcessCounts {
        programs: 0,
        by_heading: 0,
        line_split: 0,
        placeholders: 0,
    };

    for chunk in rows.chunks(500) {
        let programs: Vec<db::ProgramRow> = chunk.par_iter().map(resegment).collect();
        for p in &programs {
            match p.strategy {
                Strategy::Heading(_) => counts.by_heading += 1,
                Strategy::LineSplit => counts.line_split += 1,
                Strategy::Placeholder => counts.placeholders += 1,
            }
        }
        counts.programs += db::save_programs(conn, &programs)?;
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    Ok(counts)
}

fn resegment(row: &db::GenerationRow) -> db::ProgramRow {
    let days = row.assessment.days();
    let (program, strategy) = if row.rejected {
        (WeeklyProgram::unavailable(days), Strategy::Placeholder)
    } else {
        parser::segment_with_strategy(&row.raw_text, days)
    };
    db::ProgramRow {
        generation_id: row.id,
        program,
        assessment: row.assessment.clone(),
        strategy,
    }
}

fn log_strategy(strategy: Strategy) {
    if strategy.is_fallback() {
        warn!("No day headings found, dividing text equally among days");
    } else {
        info!("Parsed using separator: {}", strategy.label());
    }
}

fn read_input(path: Option<&std::path::Path>) -> Result<String> {
    match path {
        Some(p) => std::fs::read_to_string(p).with_context(|| format!("Failed to read {:?}", p)),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}

fn metric_name(metric: Metric) -> &'static str {
    match metric {
        Metric::Weight => "weight",
        Metric::Volume => "volume",
        Metric::MaxReps => "max reps",
    }
}

/// Fit `s` into a table column of `width` chars; a cut ends in `…`.
fn clip(s: &str, width: usize) -> Cow<'_, str> {
    if s.chars().nth(width).is_none() {
        return Cow::Borrowed(s);
    }
    let keep = width.saturating_sub(1);
    let cut = s.char_indices().nth(keep).map_or(s.len(), |(i, _)| i);
    Cow::Owned(format!("{}…", &s[..cut]))
}

fn elapsed_label(d: Duration) -> String {
    let secs = d.as_secs();
    match (secs / 3600, secs / 60 % 60) {
        (0, 0) => format!("{:.1}s", d.as_secs_f64()),
        (0, m) => format!("{}m{:02}s", m, secs % 60),
        (h, m) => format!("{}h{:02}m", h, m),
    }
}
