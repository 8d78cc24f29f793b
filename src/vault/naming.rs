//! File naming rules for the vault.
//!
//! Notes: `{seq:03}-W{week:02}-{topic}.md` in the course directory.
//! Transcripts: `{seq:03}-W{week:02}-{course}-Transcript.md` in
//! `Transcripts/` under the course directory.

use serde::Deserialize;

use crate::domain::Assignment;

/// Longest sanitized name, in characters
const MAX_NAME_CHARS: usize = 120;

/// Suffix that marks transcript copies
pub const TRANSCRIPT_SUFFIX: &str = "-Transcript.md";

/// Make a string safe to use as a file or directory name.
///
/// Reserved characters become spaces, whitespace runs collapse, and the
/// result is capped at 120 characters. Empty results become `fallback`.
pub fn sanitize(name: &str, fallback: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => ' ',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect();

    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let capped: String = collapsed.chars().take(MAX_NAME_CHARS).collect();
    let capped = capped.trim_end();

    if capped.is_empty() {
        fallback.to_string()
    } else {
        capped.to_string()
    }
}

/// Directory name for a course
pub fn course_dir_name(course_name: &str) -> String {
    sanitize(course_name, "Course")
}

pub fn note_file_name(assignment: &Assignment, topic: &str) -> String {
    format!("{}-{}.md", assignment.file_prefix(), sanitize(topic, "Untitled"))
}

pub fn transcript_file_name(assignment: &Assignment) -> String {
    format!(
        "{}-{}{}",
        assignment.file_prefix(),
        course_dir_name(&assignment.course_name),
        TRANSCRIPT_SUFFIX
    )
}

/// Leading sequence number of a note file name.
///
/// Requires at least three leading digits followed by `-` and an `.md`
/// extension; transcript copies never count.
pub fn parse_sequence(file_name: &str) -> Option<u32> {
    let lower = file_name.to_ascii_lowercase();
    if !lower.ends_with(".md") || lower.ends_with(&TRANSCRIPT_SUFFIX.to_ascii_lowercase()) {
        return None;
    }

    let digits: String = file_name.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() < 3 || file_name[digits.len()..].chars().next() != Some('-') {
        return None;
    }
    digits.parse().ok()
}

#[derive(Debug, Deserialize)]
struct Frontmatter {
    topic: Option<serde_yaml::Value>,
}

/// Where a note's topic came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicSource {
    Frontmatter,
    Heading,
    Fallback,
}

/// Topic of a generated note.
///
/// Looks at YAML frontmatter `topic:` first (a leading ```` ```yaml ````
/// fence counts as frontmatter), then the first `# ` heading.
pub fn parse_topic(markdown: &str) -> (String, TopicSource) {
    if let Some(yaml) = frontmatter_block(markdown) {
        if let Ok(front) = serde_yaml::from_str::<Frontmatter>(&yaml) {
            let topic = match front.topic {
                Some(serde_yaml::Value::String(s)) => s,
                Some(serde_yaml::Value::Number(n)) => n.to_string(),
                _ => String::new(),
            };
            let topic = topic.trim().trim_matches(|c| c == '"' || c == '\'').trim();
            if !topic.is_empty() {
                return (sanitize(topic, "Untitled"), TopicSource::Frontmatter);
            }
        }
    }

    for line in markdown.lines() {
        if let Some(heading) = line.trim().strip_prefix("# ") {
            let heading = heading.trim();
            if !heading.is_empty() {
                return (sanitize(heading, "Untitled"), TopicSource::Heading);
            }
        }
    }

    ("Untitled".to_string(), TopicSource::Fallback)
}

/// YAML text of a leading `---` block or ```` ```yaml ```` fence
fn frontmatter_block(markdown: &str) -> Option<String> {
    let trimmed = markdown.trim_start();
    let mut lines = trimmed.lines();
    let first = lines.next()?.trim();

    let closing = match first {
        "---" => "---",
        "```yaml" | "```yml" => "```",
        _ => return None,
    };

    let mut body = Vec::new();
    for line in lines {
        if line.trim() == closing {
            return Some(body.join("\n"));
        }
        body.push(line);
    }
    None
}
