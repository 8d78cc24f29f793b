//! Batch processor: turns every pending transcript into a course note.
//!
//! Per transcript: anchor timestamp, course match, week and sequence,
//! note generation, then the vault writes and archiving of the source.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Duration;
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::{NoteGenerator, NoteRequest};
use crate::config::{ResolvedConfig, ScheduleSettings};
use crate::domain::{Assignment, Confidence, CourseLedger};
use crate::schedule::{self, CalendarIndex, CalendarOptions, CourseMatcher};
use crate::vault::Vault;

use super::lock::VaultLock;

/// Paths and schedule a processor works with
#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    pub transcript_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub vault_path: PathBuf,
    pub calendar_path: PathBuf,
    pub schedule: ScheduleSettings,
}

impl From<&ResolvedConfig> for ProcessorSettings {
    fn from(config: &ResolvedConfig) -> Self {
        Self {
            transcript_dir: config.transcript_dir.clone(),
            processed_dir: config.processed_dir.clone(),
            vault_path: config.vault_path.clone(),
            calendar_path: config.calendar_path.clone(),
            schedule: config.schedule.clone(),
        }
    }
}

/// Options for a single run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Skip failed transcripts instead of aborting the run
    pub keep_going: bool,

    /// Stop after assignment; no generation and no writes
    pub dry_run: bool,

    /// Process at most this many transcripts
    pub limit: Option<usize>,
}

/// One transcript that went (or would go) into the vault
#[derive(Debug, Clone)]
pub struct ProcessedTranscript {
    /// Source file name
    pub source: String,
    pub assignment: Assignment,
    pub confidence: Confidence,

    /// Transcript copy location (planned in a dry run)
    pub transcript_path: PathBuf,

    /// Written note; `None` in a dry run
    pub note_path: Option<PathBuf>,
}

/// Outcome of a run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub processed: Vec<ProcessedTranscript>,

    /// Transcripts left in place, with the reason
    pub skipped: Vec<(String, String)>,
}

impl RunSummary {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Batch processor over a transcript directory
pub struct Processor {
    settings: ProcessorSettings,
    generator: Box<dyn NoteGenerator>,
    vault: Vault,
}

impl Processor {
    pub fn new(settings: ProcessorSettings, generator: Box<dyn NoteGenerator>) -> Self {
        let vault = Vault::new(settings.vault_path.clone());
        Self {
            settings,
            generator,
            vault,
        }
    }

    pub fn vault(&self) -> &Vault {
        &self.vault
    }

    /// Process pending transcripts.
    ///
    /// Fails on the first transcript error unless `keep_going` is set. A
    /// transcript that fails before anything is written to the vault gives
    /// its sequence number back.
    #[instrument(skip(self), fields(generator = self.generator.name()))]
    pub async fn run(&self, options: &RunOptions) -> Result<RunSummary> {
        let index = load_calendar(&self.settings.calendar_path, &self.settings.schedule)?;
        info!(events = index.len(), "Loaded calendar");

        let mut pending = list_transcripts(&self.settings.transcript_dir).await?;
        if let Some(limit) = options.limit {
            pending.truncate(limit);
        }

        let mut summary = RunSummary::default();
        if pending.is_empty() {
            info!(dir = %self.settings.transcript_dir.display(), "No transcripts to process");
            return Ok(summary);
        }
        info!(count = pending.len(), dry_run = options.dry_run, "Processing transcripts");

        let _lock = if options.dry_run {
            None
        } else {
            Some(VaultLock::acquire(self.vault.root())?)
        };

        let matcher = CourseMatcher::new(Duration::minutes(
            self.settings.schedule.match_tolerance_minutes,
        ));
        let mut ledger = CourseLedger::new();

        for path in pending {
            let name = file_name(&path);
            match self
                .process_one(&path, &name, &index, &matcher, &mut ledger, options.dry_run)
                .await
            {
                Ok(done) => summary.processed.push(done),
                Err(e) if options.keep_going => {
                    warn!(file = %name, "Skipping transcript: {:#}", e);
                    summary.skipped.push((name, format!("{:#}", e)));
                }
                Err(e) => {
                    error!(file = %name, "Aborting run: {:#}", e);
                    return Err(e.context(format!("Failed to process {}", name)));
                }
            }
        }

        info!(
            processed = summary.processed.len(),
            skipped = summary.skipped.len(),
            "Run finished"
        );
        Ok(summary)
    }

    async fn process_one(
        &self,
        path: &Path,
        name: &str,
        index: &CalendarIndex,
        matcher: &CourseMatcher,
        ledger: &mut CourseLedger,
        dry_run: bool,
    ) -> Result<ProcessedTranscript> {
        let anchor = schedule::extract(name)?;
        let result = matcher.match_course(anchor, index);
        debug!(file = %name, %anchor, confidence = %result.confidence, course = %result.course_name, "Matched");

        if result.is_match() {
            self.vault.seed_ledger(ledger, &result.course_name)?;
        }
        let before = ledger.get(&result.course_name).cloned();
        let assignment = schedule::assign(&result, ledger, self.settings.schedule.semester_start)?;
        let transcript_path = self.vault.transcript_path(&assignment);

        if dry_run {
            info!(file = %name, course = %assignment.course_name, prefix = %assignment.file_prefix(), "Planned");
            return Ok(ProcessedTranscript {
                source: name.to_string(),
                assignment,
                confidence: result.confidence,
                transcript_path,
                note_path: None,
            });
        }

        // Nothing has reached the vault yet, so a failure here gives the
        // sequence number back
        let (request, note) = match self.generate(path, anchor.date().to_string(), &assignment).await {
            Ok(generated) => generated,
            Err(e) => {
                if let Some(state) = before {
                    ledger.seed(state);
                }
                return Err(e);
            }
        };

        // From here on the number stays consumed even on error
        let note_path = self.store(path, &request, &note).await?;
        info!(
            file = %name,
            course = %assignment.course_name,
            note = %note_path.display(),
            "Note saved"
        );

        Ok(ProcessedTranscript {
            source: name.to_string(),
            assignment,
            confidence: result.confidence,
            transcript_path,
            note_path: Some(note_path),
        })
    }

    /// Read the transcript and generate its note
    async fn generate(
        &self,
        source: &Path,
        date: String,
        assignment: &Assignment,
    ) -> Result<(NoteRequest, String)> {
        let transcript = fs::read_to_string(source)
            .await
            .with_context(|| format!("Failed to read transcript: {}", source.display()))?;
        if transcript.trim().is_empty() {
            anyhow::bail!("Transcript is empty");
        }

        let request = NoteRequest {
            assignment: assignment.clone(),
            date,
            transcript_filename: crate::vault::transcript_file_name(assignment),
            transcript,
        };
        let note = self.generator.generate(&request).await?;
        Ok((request, note))
    }

    /// Write transcript copy and note, then archive the source
    async fn store(&self, source: &Path, request: &NoteRequest, note: &str) -> Result<PathBuf> {
        let assignment = &request.assignment;
        self.vault.save_transcript(assignment, &request.transcript).await?;
        let note_path = self.vault.save_note(assignment, note).await?;

        let archived = archive(source, &self.settings.processed_dir)
            .await
            .with_context(|| format!("Note saved to {} but archiving failed", note_path.display()))?;
        debug!(to = %archived.display(), "Archived source transcript");

        Ok(note_path)
    }
}

/// Load the calendar for a schedule
pub fn load_calendar(path: &Path, schedule: &ScheduleSettings) -> Result<CalendarIndex> {
    let options = CalendarOptions::new(schedule.utc_offset, schedule.semester_start);
    CalendarIndex::load(path, options)
        .with_context(|| format!("Failed to load calendar: {}", path.display()))
}

/// `*.txt` files directly in `dir`, sorted by name
pub async fn list_transcripts(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        warn!(dir = %dir.display(), "Transcript directory does not exist");
        return Ok(Vec::new());
    }

    let mut entries = fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to read transcript directory: {}", dir.display()))?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_txt = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("txt"))
            .unwrap_or(false);
        if is_txt && entry.file_type().await?.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Move `source` into `dir`, adding `-N` before the extension on collision
pub async fn archive(source: &Path, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    let target = unique_target(dir, source);
    if fs::rename(source, &target).await.is_err() {
        // Different filesystem
        fs::copy(source, &target)
            .await
            .with_context(|| format!("Failed to copy {} to {}", source.display(), target.display()))?;
        fs::remove_file(source)
            .await
            .with_context(|| format!("Failed to remove {}", source.display()))?;
    }

    Ok(target)
}

fn unique_target(dir: &Path, source: &Path) -> PathBuf {
    let name = file_name(source);
    let candidate = dir.join(&name);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), format!(".{}", ext)),
        _ => (name.clone(), String::new()),
    };

    let mut n = 1u32;
    loop {
        let candidate = dir.join(format!("{}-{}{}", stem, n, ext));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_list_transcripts_sorted_txt_only() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("b.txt"), "").unwrap();
        std::fs::write(temp.path().join("a.TXT"), "").unwrap();
        std::fs::write(temp.path().join("c.md"), "").unwrap();
        std::fs::create_dir_all(temp.path().join("dir.txt")).unwrap();

        let files = list_transcripts(temp.path()).await.unwrap();
        let names: Vec<_> = files.iter().map(|p| file_name(p)).collect();
        assert_eq!(names, vec!["a.TXT", "b.txt"]);

        assert!(list_transcripts(&temp.path().join("missing")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_archive_adds_suffix_on_collision() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("processed");

        for expected in ["x.txt", "x-1.txt", "x-2.txt"] {
            let src = temp.path().join("x.txt");
            std::fs::write(&src, "words").unwrap();
            let moved = archive(&src, &dest).await.unwrap();
            assert_eq!(moved, dest.join(expected));
            assert!(!src.exists());
        }
    }

    #[test]
    fn test_unique_target_without_extension() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("notes"), "").unwrap();
        assert_eq!(
            unique_target(temp.path(), Path::new("/in/notes")),
            temp.path().join("notes-1")
        );
    }

    #[test]
    fn test_run_summary_is_clean() {
        let mut summary = RunSummary::default();
        assert!(summary.is_clean());
        summary.skipped.push(("a.txt".into(), "boom".into()));
        assert!(!summary.is_clean());
    }
}
