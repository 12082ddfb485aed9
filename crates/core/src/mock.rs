//! Scripted backend for exercising the pipeline without network access.
//!
//! Responses are queued per call shape and consumed in order; every call is
//! recorded so tests can assert on prompts and call counts.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;

use crate::{
    client::{GenerationBackend, parse_structured},
    error::{KonspektError, Result},
    schema::SchemaDescriptor,
    types::EncodedMedia,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Transcribe {
        filename: String,
        content_type: String,
        bytes: usize,
    },
    Structured {
        prompt: String,
    },
    Text {
        prompt: String,
    },
}

#[derive(Default)]
pub struct ScriptedBackend {
    transcripts: Mutex<VecDeque<Result<String>>>,
    structured: Mutex<VecDeque<Result<String>>>,
    notes: Mutex<VecDeque<Result<String>>>,
    calls: Mutex<Vec<BackendCall>>,
    gate: Option<Arc<Notify>>,
    structured_gate: Option<Arc<Notify>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one full successful run.
    pub fn succeeding(transcript: &str, structured_json: &str, notes: &str) -> Self {
        Self::new()
            .then_transcript(transcript)
            .then_structured(structured_json)
            .then_notes(notes)
    }

    /// Block every transcription until `gate` is notified.
    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Block every structured call until `gate` is notified.
    pub fn with_structured_gate(mut self, gate: Arc<Notify>) -> Self {
        self.structured_gate = Some(gate);
        self
    }

    pub fn then_transcript(self, text: impl Into<String>) -> Self {
        push(&self.transcripts, Ok(text.into()));
        self
    }

    pub fn then_transcript_err(self, err: KonspektError) -> Self {
        push(&self.transcripts, Err(err));
        self
    }

    /// Queue raw structured output; it goes through the same fence stripping
    /// and parsing as a real backend response.
    pub fn then_structured(self, raw: impl Into<String>) -> Self {
        push(&self.structured, Ok(raw.into()));
        self
    }

    pub fn then_structured_err(self, err: KonspektError) -> Self {
        push(&self.structured, Err(err));
        self
    }

    pub fn then_notes(self, text: impl Into<String>) -> Self {
        push(&self.notes, Ok(text.into()));
        self
    }

    pub fn then_notes_err(self, err: KonspektError) -> Self {
        push(&self.notes, Err(err));
        self
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().expect("ScriptedBackend poisoned").clone()
    }

    pub fn count(&self, matches: impl Fn(&BackendCall) -> bool) -> usize {
        self.calls().iter().filter(|call| matches(call)).count()
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().expect("ScriptedBackend poisoned").push(call);
    }
}

fn push(queue: &Mutex<VecDeque<Result<String>>>, value: Result<String>) {
    queue.lock().expect("ScriptedBackend poisoned").push_back(value);
}

fn pop(queue: &Mutex<VecDeque<Result<String>>>, what: &str) -> Result<String> {
    queue
        .lock()
        .expect("ScriptedBackend poisoned")
        .pop_front()
        .unwrap_or_else(|| {
            Err(KonspektError::Remote {
                cause: format!("no scripted {what} response"),
            })
        })
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn transcribe(&self, media: &EncodedMedia, _instructions: &str) -> Result<String> {
        self.record(BackendCall::Transcribe {
            filename: media.filename.clone(),
            content_type: media.content_type.clone(),
            bytes: media.payload.len(),
        });
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        pop(&self.transcripts, "transcript")
    }

    async fn generate_structured(&self, prompt: &str, _schema: &SchemaDescriptor) -> Result<Value> {
        self.record(BackendCall::Structured {
            prompt: prompt.to_string(),
        });
        if let Some(gate) = &self.structured_gate {
            gate.notified().await;
        }
        let raw = pop(&self.structured, "structured")?;
        parse_structured(&raw)
    }

    async fn generate_text(&self, prompt: &str) -> Result<String> {
        self.record(BackendCall::Text {
            prompt: prompt.to_string(),
        });
        pop(&self.notes, "notes")
    }
}
