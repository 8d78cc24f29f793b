//! Run orchestration.
//!
//! This module contains:
//! - Processor: Batch loop over pending transcripts
//! - VaultLock: Advisory lock held while a run writes the vault
//! - RetryPolicy: Attempt and delay rules for the note generator

pub mod lock;
pub mod processor;
pub mod retry;

// Re-export commonly used types
pub use lock::{VaultLock, LOCK_FILE};
pub use processor::{
    archive, list_transcripts, load_calendar, ProcessedTranscript, Processor, ProcessorSettings,
    RunOptions, RunSummary,
};
pub use retry::RetryPolicy;
