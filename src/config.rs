//! Configuration for audionote.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (TRANSCRIPT_DIR, OBSIDIAN_VAULT_PATH, ...)
//! 2. Config file (.audionote/config.yaml)
//! 3. Defaults (relative to the working directory)
//!
//! Config file discovery:
//! - Searches current directory and parents for .audionote/config.yaml
//! - Relative paths are resolved against the project root (the directory
//!   containing .audionote/), or AUDIONOTE_HOME when set

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use serde::Deserialize;

use crate::schedule::DEFAULT_TOLERANCE_MINUTES;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const DEFAULT_SEMESTER_START: &str = "2025-09-15";
const DEFAULT_UTC_OFFSET: &str = "+08:00";

/// Largest accepted nearest-session tolerance (one day)
const MAX_TOLERANCE_MINUTES: i64 = 24 * 60;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub semester: SemesterConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
    #[serde(default)]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Incoming transcripts (*.txt)
    pub transcripts: Option<String>,
    /// Where processed source transcripts are archived
    pub processed: Option<String>,
    /// Knowledge-base vault root
    pub vault: Option<String>,
    /// iCalendar class schedule
    pub calendar: Option<String>,
    /// Optional log file (in addition to stderr)
    pub log_file: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SemesterConfig {
    /// First day of week 1 (YYYY-MM-DD)
    pub start: Option<String>,
    /// Offset of the schedule's local time, e.g. "+08:00"
    pub utc_offset: Option<String>,
    /// Nearest-boundary tolerance for course matching
    pub match_tolerance_minutes: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LlmConfig {
    pub api_base: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub retry_count: Option<u32>,
    pub retry_delay_seconds: Option<u64>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromptsConfig {
    pub system: Option<String>,
    pub general: Option<String>,
    pub clinical: Option<String>,
    #[serde(default)]
    pub clinical_courses: Vec<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub transcript_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub vault_path: PathBuf,
    pub calendar_path: PathBuf,
    pub log_file: Option<PathBuf>,
    pub log_level: String,
    pub schedule: ScheduleSettings,
    pub llm: LlmSettings,
    pub prompts: PromptSettings,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSettings {
    pub semester_start: NaiveDate,
    pub utc_offset: FixedOffset,
    pub match_tolerance_minutes: i64,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            semester_start: NaiveDate::from_ymd_opt(2025, 9, 15).unwrap_or_default(),
            utc_offset: parse_utc_offset(DEFAULT_UTC_OFFSET).unwrap_or_else(|| Utc.fix()),
            match_tolerance_minutes: DEFAULT_TOLERANCE_MINUTES,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_base: String,
    pub api_token: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub retry_count: u32,
    pub retry_delay_seconds: u64,
    pub timeout_seconds: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_token: None,
            model: "gpt-4o-mini".to_string(),
            max_tokens: 20_000,
            temperature: 0.2,
            retry_count: 3,
            retry_delay_seconds: 5,
            timeout_seconds: 600,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PromptSettings {
    pub system: PathBuf,
    pub general: PathBuf,
    pub clinical: PathBuf,
    pub clinical_courses: Vec<String>,
}

/// Parse a UTC offset like "+08:00", "-0530" or "Z"
pub fn parse_utc_offset(value: &str) -> Option<FixedOffset> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }

    let (sign, rest) = match value.as_bytes().first()? {
        b'+' => (1, &value[1..]),
        b'-' => (-1, &value[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Find config file by searching current directory and parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(".audionote").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`; `~/` expands to home
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    if let Some(rest) = path_str.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }

    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path_str.strip_prefix("./").unwrap_or(path_str))
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let cwd = std::env::current_dir().context("Failed to determine working directory")?;
    let config_file = find_config_file(&cwd);

    let file = match config_file {
        Some(ref path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };

    resolve(
        file,
        config_file,
        &cwd,
        &|key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty()),
    )
}

/// Merge file settings, environment lookups and defaults
fn resolve(
    file: ConfigFile,
    config_file: Option<PathBuf>,
    cwd: &Path,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig> {
    // Project root is the parent of .audionote/
    let project_root = config_file
        .as_deref()
        .and_then(Path::parent)
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| cwd.to_path_buf());
    let base = env("AUDIONOTE_HOME")
        .map(PathBuf::from)
        .unwrap_or(project_root);

    let path = |env_key: &str, from_file: &Option<String>, default: &str| -> PathBuf {
        match env(env_key) {
            Some(value) => resolve_path(cwd, &value),
            None => resolve_path(&base, from_file.as_deref().unwrap_or(default)),
        }
    };

    let paths = &file.paths;
    let transcript_dir = path("TRANSCRIPT_DIR", &paths.transcripts, "transcripts");
    let processed_dir = path(
        "PROCESSED_TRANSCRIPT_DIR",
        &paths.processed,
        "transcripts/processed",
    );
    let vault_path = path("OBSIDIAN_VAULT_PATH", &paths.vault, "obsidian_vault");
    let calendar_path = path("ICS_FILE_PATH", &paths.calendar, "schedule.ics");
    let log_file = match env("LOG_FILE_PATH") {
        Some(value) => Some(resolve_path(cwd, &value)),
        None => paths.log_file.as_deref().map(|p| resolve_path(&base, p)),
    };

    let start_str = env("SEMESTER_START_DATE")
        .or_else(|| file.semester.start.clone())
        .unwrap_or_else(|| DEFAULT_SEMESTER_START.to_string());
    let semester_start = NaiveDate::parse_from_str(start_str.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid semester start date '{}' (expected YYYY-MM-DD)", start_str))?;

    let offset_str = file
        .semester
        .utc_offset
        .clone()
        .unwrap_or_else(|| DEFAULT_UTC_OFFSET.to_string());
    let utc_offset = parse_utc_offset(&offset_str)
        .with_context(|| format!("Invalid utc_offset '{}' (expected e.g. +08:00)", offset_str))?;

    let match_tolerance_minutes = file
        .semester
        .match_tolerance_minutes
        .unwrap_or(DEFAULT_TOLERANCE_MINUTES);
    if !(0..=MAX_TOLERANCE_MINUTES).contains(&match_tolerance_minutes) {
        anyhow::bail!(
            "match_tolerance_minutes must be between 0 and {}, got {}",
            MAX_TOLERANCE_MINUTES,
            match_tolerance_minutes
        );
    }

    let defaults = LlmSettings::default();
    let llm = LlmSettings {
        api_base: file.llm.api_base.clone().unwrap_or(defaults.api_base),
        api_token: env("LLM_API_TOKEN").or_else(|| env("OPENAI_API_KEY")),
        model: file.llm.model.clone().unwrap_or(defaults.model),
        max_tokens: file.llm.max_tokens.unwrap_or(defaults.max_tokens),
        temperature: file.llm.temperature.unwrap_or(defaults.temperature),
        retry_count: file.llm.retry_count.unwrap_or(defaults.retry_count).max(1),
        retry_delay_seconds: file
            .llm
            .retry_delay_seconds
            .unwrap_or(defaults.retry_delay_seconds),
        timeout_seconds: file.llm.timeout_seconds.unwrap_or(defaults.timeout_seconds),
    };

    let prompts = PromptSettings {
        system: resolve_path(&base, file.prompts.system.as_deref().unwrap_or("prompts/system_prompt.txt")),
        general: resolve_path(
            &base,
            file.prompts.general.as_deref().unwrap_or("prompts/general_template.txt"),
        ),
        clinical: resolve_path(
            &base,
            file.prompts.clinical.as_deref().unwrap_or("prompts/clinical_template.txt"),
        ),
        clinical_courses: file
            .prompts
            .clinical_courses
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect(),
    };

    let log_level = env("LOG_LEVEL")
        .or(file.log_level)
        .unwrap_or_else(|| "info".to_string())
        .to_ascii_lowercase();

    Ok(ResolvedConfig {
        transcript_dir,
        processed_dir,
        vault_path,
        calendar_path,
        log_file,
        log_level,
        schedule: ScheduleSettings {
            semester_start,
            utc_offset,
            match_tolerance_minutes,
        },
        llm,
        prompts,
        config_file,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}
