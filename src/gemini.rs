//! Gemini API client
//!
//! Generation via `generateContent` with function-calling support, and
//! query embedding via `text-embedding-004`. Uses a long-lived
//! reqwest::Client for connection pooling. Tool use happens entirely inside
//! this client; the webhook core only registers the tools.

use crate::error::ChatError;
use crate::tools::ToolRegistry;
use crate::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{error, info, warn};

const GENERATE_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";
const EMBED_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/text-embedding-004:embedContent";

/// Upper bound on tool-call rounds within one generation.
const MAX_TOOL_ROUNDS: usize = 4;

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    generate_url: String,
    embed_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()
            .map_err(|e| ChatError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            generate_url: GENERATE_URL.to_string(),
            embed_url: EMBED_URL.to_string(),
        })
    }

    /// Generate a reply for the composed prompt.
    ///
    /// The registered tools are offered to the model as function
    /// declarations; any function calls it makes are resolved here, bounded
    /// to a few rounds, before the final text is returned.
    pub async fn generate(&self, prompt: &str, tools: &ToolRegistry) -> Result<String> {
        let declarations = build_declarations(tools);
        let mut contents = vec![GeminiContent {
            role: Some("user".to_string()),
            parts: vec![GeminiPart::text(prompt)],
        }];

        for round in 0..MAX_TOOL_ROUNDS {
            let candidate = self.generate_once(&contents, &declarations).await?;

            let Some(call) = candidate.parts.iter().find_map(|p| p.function_call.clone())
            else {
                let answer = candidate
                    .parts
                    .iter()
                    .find_map(|p| p.text.clone())
                    .ok_or_else(|| {
                        ChatError::Generation("Empty response from Gemini".to_string())
                    })?;
                info!(rounds = round, "Gemini response received");
                return Ok(answer);
            };

            info!(tool = %call.name, round, "Model requested a tool call");

            let query = call
                .args
                .get("query")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();

            let tool_output = match tools.get(&call.name) {
                Some(tool) => match tool.invoke(&query).await {
                    Ok(output) => json!({ "result": output }),
                    Err(e) => {
                        warn!(tool = %call.name, "Tool invocation failed: {}", e);
                        json!({ "error": e.to_string() })
                    }
                },
                None => {
                    warn!(tool = %call.name, "Model requested an unregistered tool");
                    json!({ "error": format!("unknown tool: {}", call.name) })
                }
            };

            contents.push(GeminiContent {
                role: Some("model".to_string()),
                parts: candidate.parts.clone(),
            });
            contents.push(GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart::function_response(&call.name, tool_output)],
            });
        }

        Err(ChatError::Generation(format!(
            "Tool-call rounds exceeded ({})",
            MAX_TOOL_ROUNDS
        )))
    }

    async fn generate_once(
        &self,
        contents: &[GeminiContent],
        declarations: &[FunctionDeclaration],
    ) -> Result<GeminiContent> {
        let request = GenerateRequest {
            contents: contents.to_vec(),
            tools: if declarations.is_empty() {
                None
            } else {
                Some(vec![ToolDeclarations {
                    function_declarations: declarations.to_vec(),
                }])
            },
            generation_config: GenerationConfig {
                temperature: 0.3,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 1024,
            },
        };

        let url = format!("{}?key={}", self.generate_url, self.api_key);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                ChatError::Generation(format!("Gemini API error: {}", e))
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Gemini API error response: {}", error_text);
            return Err(ChatError::Generation(format!(
                "Gemini API error: {}",
                error_text
            )));
        }

        let body: GenerateResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            ChatError::Generation(format!("Gemini parse error: {}", e))
        })?;

        body.candidates
            .into_iter()
            .next()
            .map(|c| c.content)
            .ok_or_else(|| ChatError::Generation("No response from Gemini API".to_string()))
    }

    /// Embed a text query with `text-embedding-004`.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}?key={}", self.embed_url, self.api_key);
        let request = json!({
            "model": "models/text-embedding-004",
            "content": { "parts": [{ "text": text }] }
        });

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Embedding request failed: {}", e);
                ChatError::Retrieval(format!("Embedding API error: {}", e))
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ChatError::Retrieval(format!(
                "Embedding API error: {}",
                error_text
            )));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Retrieval(format!("Embedding parse error: {}", e)))?;

        Ok(body.embedding.values)
    }
}

fn build_declarations(tools: &ToolRegistry) -> Vec<FunctionDeclaration> {
    tools
        .iter()
        .map(|tool| FunctionDeclaration {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The query or text input for the tool"
                    }
                },
                "required": ["query"]
            }),
        })
        .collect()
}

// =============================
// Wire Types
// =============================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolDeclarations>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

impl GeminiPart {
    fn text(value: &str) -> Self {
        Self {
            text: Some(value.to_string()),
            function_call: None,
            function_response: None,
        }
    }

    fn function_response(name: &str, response: Value) -> Self {
        Self {
            text: None,
            function_call: None,
            function_response: Some(FunctionResponse {
                name: name.to_string(),
                response,
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolDeclarations {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Clone, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: GeminiContent,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}
