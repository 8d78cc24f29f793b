//! Adapter interfaces for external systems.
//!
//! The only external collaborator is the note generator: a language model
//! that turns a transcript plus its assignment into a Markdown note.

pub mod llm;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::Assignment;

pub use llm::{LlmNoteGenerator, PromptTemplates};

/// Everything a note generator gets to see about one transcript
#[derive(Debug, Clone)]
pub struct NoteRequest {
    pub assignment: Assignment,

    /// Recording date (YYYY-MM-DD)
    pub date: String,

    /// File name the transcript copy is stored under
    pub transcript_filename: String,

    pub transcript: String,
}

/// Trait for note generators
#[async_trait]
pub trait NoteGenerator: Send + Sync {
    /// Human-readable generator name
    fn name(&self) -> &str;

    /// Produce the Markdown note for a transcript
    async fn generate(&self, request: &NoteRequest) -> Result<String>;
}
