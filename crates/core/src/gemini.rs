use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde_json::{Value, json};

use crate::{
    client::{GenerationBackend, parse_structured},
    config::Config,
    error::{KonspektError, Result},
    schema::SchemaDescriptor,
    types::EncodedMedia,
};

/// Gemini `generateContent` backend
pub struct GeminiClient {
    http: reqwest::Client,
    api_base: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.require_api_key()?.to_string();
        Ok(Self {
            http: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }

    async fn generate(&self, parts: Vec<Value>, generation_config: Option<Value>) -> Result<String> {
        let mut body = json!({
            "contents": [{ "role": "user", "parts": parts }],
        });
        if let Some(generation_config) = generation_config {
            body["generationConfig"] = generation_config;
        }

        tracing::debug!(model = %self.model, "sending generateContent request");

        let response = self
            .http
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(KonspektError::Remote {
                cause: format!("Backend returned {status}: {}", body.trim()),
            });
        }

        let response = response.json::<Value>().await?;
        extract_text(&response)
    }
}

/// Concatenate the text parts of the first candidate
fn extract_text(response: &Value) -> Result<String> {
    let parts = response["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| KonspektError::Remote {
            cause: format!("Invalid API response structure: {response}"),
        })?;

    Ok(parts
        .iter()
        .filter_map(|part| part["text"].as_str())
        .collect::<Vec<_>>()
        .concat())
}

#[async_trait]
impl GenerationBackend for GeminiClient {
    async fn transcribe(&self, media: &EncodedMedia, instructions: &str) -> Result<String> {
        let parts = vec![
            json!({
                "inline_data": {
                    "mime_type": media.content_type,
                    "data": BASE64.encode(&media.payload),
                }
            }),
            json!({ "text": instructions }),
        ];
        self.generate(parts, None).await
    }

    async fn generate_structured(&self, prompt: &str, schema: &SchemaDescriptor) -> Result<Value> {
        let generation_config = json!({
            "responseMimeType": "application/json",
            "responseSchema": schema.to_json(),
        });
        let text = self
            .generate(vec![json!({ "text": prompt })], Some(generation_config))
            .await?;
        parse_structured(&text)
    }

    async fn generate_text(&self, prompt: &str) -> Result<String> {
        self.generate(vec![json!({ "text": prompt })], None).await
    }
}
