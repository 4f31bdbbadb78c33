use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{build_draft_prompt, Draft, DraftError, DraftRequest, Drafter, SYSTEM_PROMPT};

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const TOOL_NAME: &str = "submit_minutes";

/// Configuration for the Anthropic API client
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// API key (from ANTHROPIC_API_KEY env var)
    pub api_key: String,
    /// Model to use (e.g., "claude-sonnet-4-20250514")
    pub model: String,
    /// Temperature (0-1, lower = more deterministic)
    pub temperature: f64,
    /// Maximum tokens in response
    pub max_tokens: u32,
}

impl AnthropicConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .context("ANTHROPIC_API_KEY environment variable not set")?;
        let model = std::env::var("ANTHROPIC_MODEL")
            .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string());

        Ok(Self::new(api_key, model))
    }

    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            temperature: 0.3,
            max_tokens: 4096,
        }
    }
}

/// Drafts minutes through the Anthropic Messages API using tool use
/// for structured output
pub struct AnthropicClient {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicClient {
    pub fn new(config: AnthropicConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn tool() -> Tool {
        Tool {
            name: TOOL_NAME.to_string(),
            description: "Submit the updated minutes for the agenda item".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "text": {
                        "type": "string",
                        "description": "Complete updated minutes for this agenda item, in Markdown"
                    },
                    "resolved_goals": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "condition": {"type": "string"},
                                "result": {"type": "string"}
                            },
                            "required": ["condition", "result"]
                        }
                    }
                },
                "required": ["text", "resolved_goals"]
            }),
        }
    }

    /// Send a prompt and parse the forced tool call into a draft
    pub async fn send_with_tool(&self, system: &str, user: &str) -> Result<Draft, DraftError> {
        let request = AnthropicToolRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: Some(self.config.temperature),
            system: Some(system.to_string()),
            messages: vec![Message {
                role: "user".to_string(),
                content: user.to_string(),
            }],
            tools: vec![Self::tool()],
            tool_choice: Some(ToolChoice {
                choice_type: "tool".to_string(),
                name: TOOL_NAME.to_string(),
            }),
        };

        let response = self
            .client
            .post(MESSAGES_URL)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| DraftError::Transient(format!("request to Anthropic API failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("Anthropic API error: {} - {}", status, body);
            return Err(if is_retryable_status(status) {
                DraftError::Transient(message)
            } else {
                DraftError::Permanent(message)
            });
        }

        let response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| DraftError::Transient(format!("unreadable Anthropic response: {}", e)))?;

        parse_tool_draft(&response)
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
        // Anthropic signals overload with 529
        || status.as_u16() == 529
}

fn parse_tool_draft(response: &AnthropicResponse) -> Result<Draft, DraftError> {
    let input = response
        .content
        .iter()
        .find(|c| c.content_type == "tool_use" && c.name.as_deref() == Some(TOOL_NAME))
        .and_then(|c| c.input.clone())
        .ok_or_else(|| DraftError::Transient("no tool_use block in response".to_string()))?;

    serde_json::from_value(input)
        .map_err(|e| DraftError::Transient(format!("tool input is not a draft: {}", e)))
}

#[async_trait]
impl Drafter for AnthropicClient {
    async fn draft(&self, request: &DraftRequest) -> Result<Draft, DraftError> {
        let prompt = build_draft_prompt(request);
        debug!(
            item = %request.item_title,
            segments = request.segments.len(),
            "Sending drafting request"
        );
        self.send_with_tool(SYSTEM_PROMPT, &prompt).await
    }

    fn drafter_id(&self) -> &str {
        "anthropic"
    }
}

#[derive(Debug, Serialize)]
struct AnthropicToolRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
    tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct Tool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ToolChoice {
    #[serde(rename = "type")]
    choice_type: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    input: Option<serde_json::Value>,
}
