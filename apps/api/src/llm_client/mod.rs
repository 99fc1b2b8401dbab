/// LLM Client: the single point of entry for all Claude API calls.
///
/// No other module calls the Anthropic API directly. Callers go through
/// `CompletionBackend` so the analysis flow can be driven by a scripted
/// backend in tests.
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// First model tried for every completion.
pub const PRIMARY_MODEL: &str = "claude-sonnet-4-5";
/// Tried once when the primary call fails for any reason.
pub const FALLBACK_MODEL: &str = "claude-haiku-4-5";
const MAX_TOKENS: u32 = 4096;
const REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("no JSON object found in model output")]
    NoJsonObject,

    #[error("all models failed (primary: {primary}; fallback: {fallback})")]
    AllModelsFailed { primary: String, fallback: String },
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// Text generation by model name.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, model: &str, prompt: &str, system: &str) -> Result<String, LlmError>;
}

/// Model output together with the model that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub model: String,
}

/// Wraps the Anthropic Messages API.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
}

impl LlmClient {
    pub fn new(api_key: String) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, api_key })
    }

    /// One call to the Claude API, returning the full response object.
    /// Failures are returned as-is; model fallback happens in
    /// `complete_with_fallback`.
    pub async fn call(&self, model: &str, prompt: &str, system: &str) -> Result<LlmResponse, LlmError> {
        let request_body = AnthropicRequest {
            model,
            max_tokens: MAX_TOKENS,
            system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            warn!("LLM API returned {status} for {model}: {message}");
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let llm_response: LlmResponse = response.json().await?;

        debug!(
            "LLM call succeeded: model={model}, input_tokens={}, output_tokens={}",
            llm_response.usage.input_tokens, llm_response.usage.output_tokens
        );

        Ok(llm_response)
    }
}

#[async_trait]
impl CompletionBackend for LlmClient {
    async fn complete(&self, model: &str, prompt: &str, system: &str) -> Result<String, LlmError> {
        let response = self.call(model, prompt, system).await?;
        response
            .text()
            .map(str::to_string)
            .ok_or(LlmError::EmptyContent)
    }
}

/// Tries `PRIMARY_MODEL`, then `FALLBACK_MODEL` once. No further retries.
pub async fn complete_with_fallback(
    backend: &dyn CompletionBackend,
    prompt: &str,
    system: &str,
) -> Result<Completion, LlmError> {
    let primary_err = match backend.complete(PRIMARY_MODEL, prompt, system).await {
        Ok(text) => {
            return Ok(Completion {
                text,
                model: PRIMARY_MODEL.to_string(),
            })
        }
        Err(e) => e,
    };

    warn!("{PRIMARY_MODEL} failed ({primary_err}), falling back to {FALLBACK_MODEL}");

    match backend.complete(FALLBACK_MODEL, prompt, system).await {
        Ok(text) => Ok(Completion {
            text,
            model: FALLBACK_MODEL.to_string(),
        }),
        Err(fallback_err) => Err(LlmError::AllModelsFailed {
            primary: primary_err.to_string(),
            fallback: fallback_err.to_string(),
        }),
    }
}

/// Parses model output as a JSON value.
///
/// Markdown fences are stripped first. If the text still isn't valid JSON,
/// the first balanced `{...}` span is parsed instead, which recovers objects
/// wrapped in prose.
pub fn parse_json_response(text: &str) -> Result<Value, LlmError> {
    let stripped = strip_json_fences(text);
    if let Ok(value) = serde_json::from_str::<Value>(stripped) {
        return Ok(value);
    }
    let candidate = first_json_object(stripped).ok_or(LlmError::NoJsonObject)?;
    serde_json::from_str(candidate).map_err(LlmError::Parse)
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

/// Returns the first brace-balanced `{...}` slice. Braces inside string
/// literals (including escaped quotes) are ignored.
fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedCompletion;
    use serde_json::json;

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_parse_recovers_object_wrapped_in_prose() {
        let text = "Here is your analysis:\n{\"summary\": \"ok\", \"categories\": []}\nGood luck!";
        let value = parse_json_response(text).unwrap();
        assert_eq!(value, json!({"summary": "ok", "categories": []}));
    }

    #[test]
    fn test_first_object_ignores_braces_in_strings() {
        let text = r#"note {"a": "closing } brace and \"quoted {\"", "b": {"c": 1}} trailing }"#;
        let object = first_json_object(text).unwrap();
        let value: Value = serde_json::from_str(object).unwrap();
        assert_eq!(value["b"]["c"], 1);
    }

    #[test]
    fn test_parse_fails_without_object() {
        assert!(matches!(
            parse_json_response("I cannot help with that."),
            Err(LlmError::NoJsonObject)
        ));
        assert!(parse_json_response("{\"unterminated\": ").is_err());
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let backend = ScriptedCompletion::replying("{}");
        let completion = complete_with_fallback(&backend, "p", "s").await.unwrap();
        assert_eq!(completion.model, PRIMARY_MODEL);
        assert_eq!(backend.models(), vec![PRIMARY_MODEL]);
    }

    #[tokio::test]
    async fn test_fallback_used_once_after_primary_failure() {
        let backend = ScriptedCompletion::new(vec![
            Err(LlmError::Api { status: 529, message: "overloaded".into() }),
            Ok("{}".into()),
        ]);
        let completion = complete_with_fallback(&backend, "p", "s").await.unwrap();
        assert_eq!(completion.model, FALLBACK_MODEL);
        assert_eq!(
            backend.models(),
            vec![PRIMARY_MODEL, FALLBACK_MODEL]
        );
    }

    #[tokio::test]
    async fn test_both_models_failing_reports_both() {
        let backend = ScriptedCompletion::new(vec![
            Err(LlmError::Api { status: 500, message: "boom".into() }),
            Err(LlmError::EmptyContent),
        ]);
        let err = complete_with_fallback(&backend, "p", "s").await.unwrap_err();
        match err {
            LlmError::AllModelsFailed { primary, fallback } => {
                assert!(primary.contains("boom"));
                assert!(fallback.contains("empty"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(backend.models().len(), 2);
    }
}
