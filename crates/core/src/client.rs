use async_trait::async_trait;
use serde_json::Value;

use crate::{
    error::{KonspektError, Result},
    schema::SchemaDescriptor,
    types::EncodedMedia,
};

/// Remote text-generation capability used by the pipeline.
///
/// Implementations report transport and backend failures as
/// [`KonspektError::Remote`]; `generate_structured` additionally reports
/// unparseable output as [`KonspektError::MalformedResponse`].
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn transcribe(&self, media: &EncodedMedia, instructions: &str) -> Result<String>;

    async fn generate_structured(&self, prompt: &str, schema: &SchemaDescriptor) -> Result<Value>;

    async fn generate_text(&self, prompt: &str) -> Result<String>;
}

const FENCE: &str = "```";
const JSON_FENCE: &str = "```json";

/// Remove one surrounding fenced code block, tagged `json` or untagged.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let body = if let Some(rest) = trimmed.strip_prefix(JSON_FENCE) {
        rest
    } else if let Some(rest) = trimmed.strip_prefix(FENCE) {
        rest
    } else {
        return trimmed;
    };

    body.strip_suffix(FENCE).unwrap_or(body).trim()
}

/// Parse a structured backend response into JSON
pub fn parse_structured(text: &str) -> Result<Value> {
    serde_json::from_str(strip_code_fence(text)).map_err(|e| KonspektError::MalformedResponse {
        reason: e.to_string(),
    })
}
