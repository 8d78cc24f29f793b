//! Command-line interface for audionote.
//!
//! Provides commands for processing pending transcripts, checking how a
//! single transcript would be matched, inspecting the calendar and the
//! vault, and showing the resolved configuration.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::adapters::{LlmNoteGenerator, PromptTemplates};
use crate::config::{self, ResolvedConfig};
use crate::core::{load_calendar, Processor, ProcessorSettings, RunOptions, RunSummary};
use crate::domain::{Assignment, CourseLedger, MatchResult};
use crate::schedule::{self, CourseMatcher};
use crate::vault::Vault;

/// audionote - Lecture transcripts to course notes
#[derive(Parser, Debug)]
#[command(name = "audionote")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process every pending transcript into the vault
    Process {
        /// Skip transcripts that fail instead of stopping
        #[arg(long)]
        keep_going: bool,

        /// Show planned assignments without generating or writing anything
        #[arg(long)]
        dry_run: bool,

        /// Maximum number of transcripts to process
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show how a transcript name would be matched and numbered
    Match {
        /// Transcript file name (starts with YYYYMMDD-HHMMSS)
        identifier: String,

        /// Print the match and assignment as JSON
        #[arg(long)]
        json: bool,
    },

    /// List calendar sessions
    Calendar {
        /// Only sessions whose course contains this text
        #[arg(short, long)]
        course: Option<String>,

        /// Maximum number of sessions to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// List courses in the vault with their last sequence number
    Courses,

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let cfg = config::config()?;

        match self.command {
            Commands::Process {
                keep_going,
                dry_run,
                limit,
            } => {
                let options = RunOptions {
                    keep_going,
                    dry_run,
                    limit,
                };
                process(cfg, &options).await
            }
            Commands::Match { identifier, json } => show_match(cfg, &identifier, json),
            Commands::Calendar { course, limit } => list_calendar(cfg, course.as_deref(), limit),
            Commands::Courses => list_courses(cfg),
            Commands::Config => {
                show_config(cfg);
                Ok(())
            }
        }
    }
}

/// Process pending transcripts
async fn process(cfg: &ResolvedConfig, options: &RunOptions) -> Result<()> {
    let generator = LlmNoteGenerator::new(cfg.llm.clone(), PromptTemplates::from(&cfg.prompts))?;
    if cfg.llm.api_token.is_none() && !options.dry_run {
        tracing::warn!("No LLM_API_TOKEN set; requests are sent without authorization");
    }

    let processor = Processor::new(ProcessorSettings::from(cfg), Box::new(generator));
    let summary = processor.run(options).await?;

    print_summary(&summary, options.dry_run);

    if !summary.is_clean() {
        anyhow::bail!("{} transcript(s) skipped", summary.skipped.len());
    }
    Ok(())
}

fn print_summary(summary: &RunSummary, dry_run: bool) {
    if summary.processed.is_empty() && summary.skipped.is_empty() {
        println!("No transcripts to process");
        return;
    }

    let verb = if dry_run { "Planned" } else { "Processed" };
    println!("{} {} transcript(s)", verb, summary.processed.len());
    println!();
    println!("{:<40} {:<10} {:<30} {:<10}", "SOURCE", "MATCH", "COURSE", "PREFIX");
    println!("{}", "-".repeat(92));
    for done in &summary.processed {
        println!(
            "{:<40} {:<10} {:<30} {:<10}",
            done.source,
            done.confidence.to_string(),
            done.assignment.course_name,
            done.assignment.file_prefix()
        );
        match &done.note_path {
            Some(note) => println!("  note:       {}", note.display()),
            None => println!("  transcript: {}", done.transcript_path.display()),
        }
    }

    if !summary.skipped.is_empty() {
        println!();
        println!("Skipped (left in place):");
        for (file, reason) in &summary.skipped {
            println!("  {}: {}", file, reason);
        }
    }
}

#[derive(Serialize)]
struct MatchReport<'a> {
    anchor: String,
    #[serde(rename = "match")]
    result: &'a MatchResult,
    assignment: Option<Assignment>,
}

/// Show the match and assignment for a single identifier
fn show_match(cfg: &ResolvedConfig, identifier: &str, json: bool) -> Result<()> {
    let anchor = schedule::extract(identifier)?;
    let index = load_calendar(&cfg.calendar_path, &cfg.schedule)?;
    let matcher = CourseMatcher::new(chrono::Duration::minutes(
        cfg.schedule.match_tolerance_minutes,
    ));
    let result = matcher.match_course(anchor, &index);

    // Preview only: the ledger is seeded from the vault and then dropped
    let assignment = if result.is_match() {
        let mut ledger = CourseLedger::new();
        Vault::new(cfg.vault_path.clone())
            .seed_ledger(&mut ledger, &result.course_name)
            .with_context(|| format!("Failed to read course state for {}", result.course_name))?;
        Some(schedule::assign(&result, &mut ledger, cfg.schedule.semester_start)?)
    } else {
        None
    };

    if json {
        let report = MatchReport {
            anchor: anchor.to_string(),
            result: &result,
            assignment: assignment.clone(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Anchor:     {}", anchor);
        println!("Confidence: {}", result.confidence);
    }

    let (event, assignment) = match (&result.matched_event, assignment) {
        (Some(event), Some(assignment)) => (event, assignment),
        _ => {
            if !json {
                println!("Course:     (none)");
            }
            return Err(schedule::NoMatchError {
                detail: format!("anchor {}", anchor),
            }
            .into());
        }
    };

    if !json {
        println!("Course:     {}", assignment.course_name);
        println!(
            "Event:      {} - {}",
            event.begin.format("%Y-%m-%d %H:%M"),
            event.end.format("%H:%M")
        );
        println!("Week:       {}", assignment.week_number);
        println!("Sequence:   {} (next)", assignment.sequence_number);
        println!("Prefix:     {}", assignment.file_prefix());
    }

    Ok(())
}

/// List calendar sessions, optionally filtered by course
fn list_calendar(cfg: &ResolvedConfig, course: Option<&str>, limit: usize) -> Result<()> {
    let index = load_calendar(&cfg.calendar_path, &cfg.schedule)?;

    let needle = course.map(str::to_lowercase);
    let events: Vec<_> = index
        .events()
        .iter()
        .filter(|e| match &needle {
            Some(n) => e.course_name.to_lowercase().contains(n.as_str()),
            None => true,
        })
        .take(limit)
        .collect();

    if events.is_empty() {
        println!("No sessions found");
        return Ok(());
    }

    println!("{:<18} {:<7} {:<5} {}", "BEGIN", "END", "WEEK", "COURSE");
    println!("{}", "-".repeat(70));
    for event in events {
        println!(
            "{:<18} {:<7} {:<5} {}",
            event.begin.format("%Y-%m-%d %H:%M").to_string(),
            event.end.format("%H:%M").to_string(),
            schedule::week_number(event.date(), cfg.schedule.semester_start),
            event.course_name
        );
    }

    Ok(())
}

/// List vault courses with their last sequence number
fn list_courses(cfg: &ResolvedConfig) -> Result<()> {
    let courses = Vault::new(cfg.vault_path.clone()).scan_courses()?;

    if courses.is_empty() {
        println!("No courses in {}", cfg.vault_path.display());
        return Ok(());
    }

    println!("{:<40} {:>8}", "COURSE", "LAST SEQ");
    println!("{}", "-".repeat(49));
    for (course, last) in courses {
        println!("{:<40} {:>8}", course, last);
    }

    Ok(())
}

/// Show resolved configuration
fn show_config(cfg: &ResolvedConfig) {
    println!("audionote configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Transcripts: {}", cfg.transcript_dir.display());
    println!("  Processed:   {}", cfg.processed_dir.display());
    println!("  Vault:       {}", cfg.vault_path.display());
    println!("  Calendar:    {}", cfg.calendar_path.display());
    println!(
        "  Log file:    {}",
        cfg.log_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(stderr only)".to_string())
    );
    println!();
    println!("Semester:");
    println!("  Start:           {}", cfg.schedule.semester_start);
    println!("  UTC offset:      {}", cfg.schedule.utc_offset);
    println!("  Match tolerance: {} min", cfg.schedule.match_tolerance_minutes);
    println!();
    println!("LLM:");
    println!("  API base:    {}", cfg.llm.api_base);
    println!("  API token:   {}", redact(cfg.llm.api_token.as_deref()));
    println!("  Model:       {}", cfg.llm.model);
    println!("  Max tokens:  {}", cfg.llm.max_tokens);
    println!("  Temperature: {}", cfg.llm.temperature);
    println!(
        "  Retries:     {} attempt(s), {}s apart",
        cfg.llm.retry_count, cfg.llm.retry_delay_seconds
    );
    println!("  Timeout:     {}s", cfg.llm.timeout_seconds);
    println!();
    println!("Prompts:");
    println!("  System:   {}", cfg.prompts.system.display());
    println!("  General:  {}", cfg.prompts.general.display());
    println!("  Clinical: {}", cfg.prompts.clinical.display());
    if cfg.prompts.clinical_courses.is_empty() {
        println!("  Clinical courses: (none)");
    } else {
        println!("  Clinical courses: {}", cfg.prompts.clinical_courses.join(", "));
    }
    println!();
    println!("Log level: {}", cfg.log_level);
}

fn redact(token: Option<&str>) -> String {
    match token {
        None => "(not set)".to_string(),
        Some(t) if t.chars().count() <= 8 => "****".to_string(),
        Some(t) => format!("{}****", t.chars().take(4).collect::<String>()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact() {
        assert_eq!(redact(None), "(not set)");
        assert_eq!(redact(Some("short")), "****");
        assert_eq!(redact(Some("sk-abcdefghijkl")), "sk-a****");
    }

    #[test]
    fn test_parse_process_flags() {
        let cli = Cli::try_parse_from(["audionote", "process", "--keep-going", "--limit", "3"]).unwrap();
        match cli.command {
            Commands::Process {
                keep_going,
                dry_run,
                limit,
            } => {
                assert!(keep_going);
                assert!(!dry_run);
                assert_eq!(limit, Some(3));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_match() {
        let cli = Cli::try_parse_from(["audionote", "match", "20250929-090500.txt", "--json"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Match { identifier, json: true } if identifier == "20250929-090500.txt"
        ));
    }
}
