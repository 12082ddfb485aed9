//! Konspekt Core Library
//!
//! Turns a recorded lecture into a transcript, a structured study guide and
//! detailed notes, and keeps a local history of completed runs.

pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod format;
pub mod gemini;
pub mod history;
pub mod ingest;
pub mod markdown;
pub mod mock;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod schema;
pub mod types;

// Re-export commonly used items at crate root
pub use client::{GenerationBackend, parse_structured, strip_code_fence};
pub use config::Config;
pub use error::{KonspektError, Result};
pub use export::{ExportRenderer, TextExporter};
pub use format::{format_history_line, format_section, format_section_body};
pub use gemini::GeminiClient;
pub use history::{FileStore, HistoryStore, KeyValueStore, MemoryStore};
pub use ingest::ingest;
pub use pipeline::{Orchestrator, PipelineError, PipelineSnapshot, PipelineStage};
pub use schema::{SchemaDescriptor, study_guide_schema};
pub use types::{EncodedMedia, GlossaryEntry, HistoryEntry, Section, StudyMaterials};
