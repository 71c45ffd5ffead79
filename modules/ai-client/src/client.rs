use anyhow::{anyhow, Result};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use tracing::{debug, warn};

use crate::extract::{recover_json, StructuredOutput};
use crate::types::{ChatRequest, ChatResponse, ToolDefinitionWire, WireMessage};

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

/// Messages-API client bound to one model.
///
/// Cheap to clone; the underlying HTTP client pool is shared.
#[derive(Clone)]
pub struct LlmClient {
    api_key: String,
    model: String,
    http: reqwest::Client,
    base_url: String,
}

impl LlmClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            http: reqwest::Client::new(),
            base_url: DEFAULT_API_URL.to_string(),
        }
    }

    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| anyhow!("ANTHROPIC_API_KEY environment variable not set"))?;
        Ok(Self::new(api_key, model))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(&self.api_key)?);
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/messages", self.base_url);

        debug!(model = %request.model, "chat request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow!("LLM API error ({status}): {error_text}"));
        }

        Ok(response.json().await?)
    }

    /// Plain text completion.
    pub async fn chat_completion(
        &self,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Result<String> {
        let request = ChatRequest::new(&self.model)
            .system(system)
            .message(WireMessage::user(user))
            .temperature(0.0);

        let response = self.chat(&request).await?;
        response.text().ok_or_else(|| anyhow!("no text in response"))
    }

    /// Structured extraction: the model is forced to answer through a tool
    /// whose input schema is derived from `T`. If it answers with prose
    /// instead, an embedded JSON object is recovered from the text as a
    /// fallback before the call fails.
    pub async fn extract<T: StructuredOutput>(
        &self,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Result<T> {
        let tool_name = "structured_response";
        let request = ChatRequest::new(&self.model)
            .system(system)
            .message(WireMessage::user(user))
            .temperature(0.3)
            .tool(ToolDefinitionWire {
                name: tool_name.to_string(),
                description: "Report the structured result of the task.".to_string(),
                input_schema: T::output_schema(),
            })
            .force_tool(tool_name);

        let response = self.chat(&request).await?;

        if let Some(input) = response.tool_input() {
            return serde_json::from_value(input.clone())
                .map_err(|e| anyhow!("structured output did not match schema: {e}"));
        }

        // Some models ignore tool_choice and answer in text anyway.
        if let Some(text) = response.text() {
            warn!(model = %self.model, "no tool call in response, recovering JSON from text");
            return recover_json(&text);
        }

        Err(anyhow!("no structured output in response"))
    }
}
