//! Reading course state from, and writing notes into, the vault.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{debug, warn};

use crate::domain::{Assignment, CourseLedger, CourseState};

use super::naming::{
    course_dir_name, note_file_name, parse_sequence, parse_topic, transcript_file_name, TopicSource,
};

/// Subdirectory of a course directory holding transcript copies
pub const TRANSCRIPTS_DIR: &str = "Transcripts";

/// A knowledge-base vault laid out as one directory per course
#[derive(Debug, Clone)]
pub struct Vault {
    root: PathBuf,
}

impl Vault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<vault>/<sanitized course>`
    pub fn course_dir(&self, course_name: &str) -> PathBuf {
        self.root.join(course_dir_name(course_name))
    }

    pub fn transcripts_dir(&self, course_name: &str) -> PathBuf {
        self.course_dir(course_name).join(TRANSCRIPTS_DIR)
    }

    /// Where the transcript copy for an assignment is stored
    pub fn transcript_path(&self, assignment: &Assignment) -> PathBuf {
        self.transcripts_dir(&assignment.course_name)
            .join(transcript_file_name(assignment))
    }

    /// Last sequence number used for a course (0 when it has no notes yet)
    pub fn course_state(&self, course_name: &str) -> Result<CourseState> {
        let dir = self.course_dir(course_name);
        let last = max_sequence(&dir)?;
        debug!(course = %course_name, last_sequence = last, "Scanned course notes");
        Ok(CourseState::new(course_name, last))
    }

    /// Seed `ledger` for a course from disk unless it is already known
    pub fn seed_ledger(&self, ledger: &mut CourseLedger, course_name: &str) -> Result<()> {
        if !ledger.contains(course_name) {
            ledger.seed(self.course_state(course_name)?);
        }
        Ok(())
    }

    /// State of every course directory currently in the vault
    pub fn scan_courses(&self) -> Result<Vec<(String, u32)>> {
        let mut courses = Vec::new();

        if !self.root.exists() {
            return Ok(courses);
        }

        let entries = std::fs::read_dir(&self.root)
            .with_context(|| format!("Failed to read vault: {}", self.root.display()))?;
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            courses.push((name, max_sequence(&entry.path())?));
        }

        courses.sort();
        Ok(courses)
    }

    /// Write the transcript copy for an assignment
    pub async fn save_transcript(&self, assignment: &Assignment, text: &str) -> Result<PathBuf> {
        let dir = self.transcripts_dir(&assignment.course_name);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

        let path = self.transcript_path(assignment);
        fs::write(&path, text)
            .await
            .with_context(|| format!("Failed to write transcript: {}", path.display()))?;

        Ok(path)
    }

    /// Write a generated note, named after its topic.
    ///
    /// The file is written to a temporary file in the same directory and then
    /// renamed into place, so a partially written note never appears.
    pub async fn save_note(&self, assignment: &Assignment, markdown: &str) -> Result<PathBuf> {
        let dir = self.course_dir(&assignment.course_name);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

        let (topic, source) = parse_topic(markdown);
        match source {
            TopicSource::Frontmatter => debug!(topic = %topic, "Topic from frontmatter"),
            TopicSource::Heading => warn!(topic = %topic, "No frontmatter topic, using first heading"),
            TopicSource::Fallback => warn!("Could not determine note topic, using 'Untitled'"),
        }

        let path = dir.join(note_file_name(assignment, &topic));
        let contents = markdown.to_string();
        let target = path.clone();

        tokio::task::spawn_blocking(move || write_atomic(&dir, &target, &contents))
            .await
            .context("Note writer task failed")??;

        Ok(path)
    }
}

/// Largest note sequence number in `dir` (0 if none or missing)
fn max_sequence(dir: &Path) -> Result<u32> {
    if !dir.exists() {
        return Ok(0);
    }

    // Course names may contain glob metacharacters
    let pattern = format!("{}/*.md", glob::Pattern::escape(&dir.to_string_lossy()));

    let mut last = 0;
    for entry in glob::glob(&pattern).context("Invalid vault glob pattern")? {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                warn!("Skipping unreadable vault entry: {}", e);
                continue;
            }
        };
        if let Some(seq) = path.file_name().and_then(|n| n.to_str()).and_then(parse_sequence) {
            last = last.max(seq);
        }
    }

    Ok(last)
}

fn write_atomic(dir: &Path, target: &Path, contents: &str) -> Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    tmp.write_all(contents.as_bytes())
        .context("Failed to write note contents")?;
    tmp.flush().context("Failed to flush note contents")?;
    tmp.persist(target)
        .with_context(|| format!("Failed to move note into place: {}", target.display()))?;
    Ok(())
}
