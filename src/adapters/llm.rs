//! OpenAI-compatible chat-completions note generator.
//!
//! Sends a system prompt plus a course template filled with the transcript
//! and its assignment. Clinical courses (from config) get their own template;
//! missing template files fall back to the general template, then to a
//! one-line built-in instruction.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::config::{LlmSettings, PromptSettings};
use crate::core::RetryPolicy;

use super::{NoteGenerator, NoteRequest};

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";
const BUILTIN_TEMPLATE: &str =
    "Organise the following lecture transcript into a structured Markdown study note.";

/// Prompt files and the courses that use the clinical template
#[derive(Debug, Clone)]
pub struct PromptTemplates {
    pub system: PathBuf,
    pub general: PathBuf,
    pub clinical: PathBuf,
    pub clinical_courses: Vec<String>,
}

impl From<&PromptSettings> for PromptTemplates {
    fn from(settings: &PromptSettings) -> Self {
        Self {
            system: settings.system.clone(),
            general: settings.general.clone(),
            clinical: settings.clinical.clone(),
            clinical_courses: settings.clinical_courses.clone(),
        }
    }
}

/// A template chosen for one course
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedTemplate {
    pub name: &'static str,
    pub content: String,
}

impl PromptTemplates {
    /// Whether a course should use the clinical template.
    ///
    /// Matches on equality or substring in either direction.
    pub fn is_clinical(&self, course_name: &str) -> bool {
        let course = course_name.trim();
        !course.is_empty()
            && self
                .clinical_courses
                .iter()
                .any(|c| c == course || c.contains(course) || course.contains(c.as_str()))
    }

    pub fn system_prompt(&self) -> String {
        read_nonempty(&self.system).unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string())
    }

    pub fn select(&self, course_name: &str) -> SelectedTemplate {
        if self.is_clinical(course_name) {
            if let Some(content) = read_nonempty(&self.clinical) {
                return SelectedTemplate {
                    name: "clinical",
                    content,
                };
            }
            warn!(path = %self.clinical.display(), "Clinical template missing, falling back to general");
        }

        match read_nonempty(&self.general) {
            Some(content) => SelectedTemplate {
                name: "general",
                content,
            },
            None => {
                warn!(path = %self.general.display(), "General template missing, using built-in instruction");
                SelectedTemplate {
                    name: "builtin",
                    content: BUILTIN_TEMPLATE.to_string(),
                }
            }
        }
    }
}

fn read_nonempty(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .filter(|s| !s.trim().is_empty())
}

/// Fill `{placeholders}` in a template.
///
/// When the template has no `{transcript_text}` slot, the metadata and the
/// transcript are appended after it instead.
pub fn render_prompt(template: &str, request: &NoteRequest) -> String {
    let a = &request.assignment;
    let fields = [
        ("{course_name}", a.course_name.clone()),
        ("{week_num}", a.week_number.to_string()),
        ("{date}", request.date.clone()),
        ("{sequence}", a.sequence_number.to_string()),
        ("{transcript_filename}", request.transcript_filename.clone()),
    ];

    let has_transcript_slot = template.contains("{transcript_text}");

    // The transcript goes in last so its own braces are never substituted
    let mut rendered = template.to_string();
    for (key, value) in &fields {
        rendered = rendered.replace(key, value);
    }

    if has_transcript_slot {
        return rendered.replace("{transcript_text}", &request.transcript);
    }

    format!(
        "{rendered}\n\n[METADATA_FOR_CONTEXT_ONLY]\nCourse Name: {}\nDate: {}\nWeek: {}\nSequence: {}\nTranscript File Name: {}\n\n[TRANSCRIPT]\n{}\n",
        a.course_name,
        request.date,
        a.week_number,
        a.sequence_number,
        request.transcript_filename,
        request.transcript,
    )
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Note generator backed by an OpenAI-compatible HTTP API
pub struct LlmNoteGenerator {
    settings: LlmSettings,
    templates: PromptTemplates,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl LlmNoteGenerator {
    pub fn new(settings: LlmSettings, templates: PromptTemplates) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .context("Failed to build HTTP client")?;
        let retry = RetryPolicy::from_settings(&settings);

        Ok(Self {
            settings,
            templates,
            retry,
            client,
        })
    }

    /// Override the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.settings.api_base.trim_end_matches('/'))
    }

    /// One chat-completions call; empty content is an error
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.settings.model,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        let mut request = self.client.post(self.endpoint()).json(&body);
        if let Some(token) = &self.settings.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.context("Failed to reach LLM endpoint")?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("LLM API error {}: {}", status, text.trim());
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("Failed to parse LLM response")?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            anyhow::bail!("LLM returned empty content");
        }

        Ok(content)
    }
}

#[async_trait]
impl NoteGenerator for LlmNoteGenerator {
    fn name(&self) -> &str {
        "llm"
    }

    async fn generate(&self, request: &NoteRequest) -> Result<String> {
        let system = self.templates.system_prompt();
        let template = self.templates.select(&request.assignment.course_name);
        let user = render_prompt(&template.content, request);

        debug!(
            model = %self.settings.model,
            template = template.name,
            max_tokens = self.settings.max_tokens,
            attempts = self.retry.max_attempts,
            "Generating note"
        );

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.complete(&system, &user).await {
                Ok(content) => return Ok(content),
                Err(e) if self.retry.should_retry(attempt) => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        "LLM call failed, retrying in {:?}: {:#}",
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(attempt, "LLM call failed: {:#}", e);
                    return Err(e.context(format!("Note generation failed after {} attempt(s)", attempt)));
                }
            }
        }
    }
}
