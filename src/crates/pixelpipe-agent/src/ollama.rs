//! Vision collaborator backed by a local Ollama server.
//!
//! One client serves both [`Classifier`] and [`Extractor`]. Each call reads
//! the artifact from disk, base64-encodes it and posts it to `/api/chat`
//! together with a JSON schema in `format`, so the model is constrained to
//! answer with exactly the expected structure:
//!
//! ```text
//! POST {ollama_url}/api/chat
//! {
//!   "model": "qwen3-vl:8b",
//!   "messages": [{"role": "user", "content": "Analyze this image and classify it.", "images": ["<b64>"]}],
//!   "stream": false,
//!   "format": {"type": "object", "properties": {"category": {"enum": ["EVENT", ...]}}, ...},
//!   "options": {"temperature": 0.0}
//! }
//! ```

use crate::collaborators::{Classifier, Extractor};
use crate::config::AgentConfig;
use crate::error::CollaboratorError;
use crate::state::{Classification, ExtractedData};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const CLASSIFY_PROMPT: &str = "Analyze this image and classify it.";

/// Ollama client for screenshot classification and extraction.
#[derive(Debug, Clone)]
pub struct OllamaVision {
    config: AgentConfig,
    client: Client,
}

impl OllamaVision {
    pub fn new(config: AgentConfig) -> Result<Self, CollaboratorError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                CollaboratorError::Transport(format!("Failed to create HTTP client: {e}"))
            })?;
        Ok(Self { config, client })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Check if the Ollama server is running.
    pub async fn check_health(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url());
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn base_url(&self) -> &str {
        self.config.ollama_url.trim_end_matches('/')
    }

    fn request(&self, prompt: &str, image: String, schema: Value) -> ChatRequest {
        ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
                images: vec![image],
            }],
            stream: false,
            format: schema,
            options: ChatOptions {
                temperature: self.config.temperature,
            },
        }
    }

    /// Send a chat request and return the assistant's message text.
    async fn chat(&self, request: &ChatRequest) -> Result<String, CollaboratorError> {
        let url = format!("{}/api/chat", self.base_url());
        tracing::debug!(model = %request.model, url = %url, "Sending vision request");

        let response = self.client.post(&url).json(request).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Model(format!(
                "Ollama API error {status}: {body}"
            )));
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::InvalidResponse(e.to_string()))?;
        tracing::debug!(
            model = %reply.model,
            eval_count = ?reply.eval_count,
            "Vision response received"
        );
        Ok(reply.message.content)
    }
}

#[async_trait]
impl Classifier for OllamaVision {
    async fn classify(&self, artifact_ref: &str) -> Result<Classification, CollaboratorError> {
        let image = encode_artifact(artifact_ref).await?;
        let request = self.request(CLASSIFY_PROMPT, image, router_schema());
        let content = self.chat(&request).await?;
        parse_classification(&content)
    }
}

#[async_trait]
impl Extractor for OllamaVision {
    async fn extract(
        &self,
        artifact_ref: &str,
        classification: Classification,
    ) -> Result<ExtractedData, CollaboratorError> {
        let (prompt, schema) = extraction_request(classification).ok_or_else(|| {
            CollaboratorError::InvalidResponse(format!("no extraction schema for {classification}"))
        })?;
        let image = encode_artifact(artifact_ref).await?;
        let request = self.request(prompt, image, schema);
        let content = self.chat(&request).await?;
        parse_extraction(&content, classification)
    }
}

/// Read an artifact and base64-encode it.
pub async fn encode_artifact(path: &str) -> Result<String, CollaboratorError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| CollaboratorError::Artifact {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
    Ok(STANDARD.encode(bytes))
}

fn router_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "category": {
                "type": "string",
                "enum": ["EVENT", "RECEIPT", "CODE", "UNKNOWN"],
                "description": "The specific type of the image. EVENT=Calendar/Dates. RECEIPT=Shopping/Bills. CODE=Programming Errors."
            }
        },
        "required": ["category"]
    })
}

fn string_field(description: &str) -> Value {
    json!({"type": "string", "description": description})
}

fn extraction_request(classification: Classification) -> Option<(&'static str, Value)> {
    let request = match classification {
        Classification::Event => (
            "Extract event details from this image.",
            json!({
                "type": "object",
                "properties": {
                    "title": string_field("Title of the event or meeting"),
                    "date": string_field("Date (YYYY-MM-DD)"),
                    "time": string_field("Time (HH:MM AM/PM)"),
                    "attendees": {
                        "type": ["string", "null"],
                        "description": "Names of people mentioned, if any"
                    }
                },
                "required": ["title", "date", "time", "attendees"]
            }),
        ),
        Classification::Receipt => (
            "Extract receipt details from this image.",
            json!({
                "type": "object",
                "properties": {
                    "merchant": string_field("Name of the store/vendor"),
                    "total": string_field("Total amount with currency"),
                    "date": string_field("Date of purchase"),
                    "items": string_field("Comma-separated list of top items")
                },
                "required": ["merchant", "total", "date", "items"]
            }),
        ),
        Classification::Code => (
            "Analyze the code error and suggest a fix.",
            json!({
                "type": "object",
                "properties": {
                    "language": string_field("Programming language (Python, JS, etc.)"),
                    "error_msg": string_field("The specific error message text"),
                    "suggested_fix": string_field("A brief 1-sentence potential solution")
                },
                "required": ["language", "error_msg", "suggested_fix"]
            }),
        ),
        Classification::Unknown => return None,
    };
    Some(request)
}

#[derive(Deserialize)]
struct RouterAnswer {
    category: String,
}

fn parse_classification(content: &str) -> Result<Classification, CollaboratorError> {
    let answer: RouterAnswer = serde_json::from_str(content)
        .map_err(|e| CollaboratorError::InvalidResponse(format!("router answer: {e}")))?;
    answer
        .category
        .parse()
        .map_err(CollaboratorError::InvalidResponse)
}

fn parse_extraction(
    content: &str,
    classification: Classification,
) -> Result<ExtractedData, CollaboratorError> {
    let invalid = |e: serde_json::Error| {
        CollaboratorError::InvalidResponse(format!("{classification} extraction: {e}"))
    };
    let data = match classification {
        Classification::Event => {
            ExtractedData::Event(serde_json::from_str(content).map_err(invalid)?)
        }
        Classification::Receipt => {
            ExtractedData::Receipt(serde_json::from_str(content).map_err(invalid)?)
        }
        Classification::Code => {
            ExtractedData::Code(serde_json::from_str(content).map_err(invalid)?)
        }
        Classification::Unknown => {
            return Err(CollaboratorError::InvalidResponse(
                "no extraction schema for UNKNOWN".to_string(),
            ))
        }
    };
    Ok(data)
}

// Ollama API types
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    format: Value,
    options: ChatOptions,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: String,
    message: ChatMessage,
    #[serde(default)]
    eval_count: Option<u64>,
}
