//! Knowledge-base vault placement.
//!
//! # Layout
//!
//! ```text
//! <vault>/
//! └── <course>/
//!     ├── 001-W01-<topic>.md                  # generated notes
//!     ├── 002-W01-<topic>.md
//!     └── Transcripts/
//!         └── 001-W01-<course>-Transcript.md  # source text copies
//! ```
//!
//! Sequence numbers are recovered from note filenames at the start of each
//! run; nothing else is persisted.

pub mod naming;
pub mod store;

pub use naming::{
    note_file_name, parse_sequence, parse_topic, sanitize, transcript_file_name, TopicSource,
};
pub use store::{Vault, TRANSCRIPTS_DIR};
