//! LLM backend clients.
//!
//! Enum dispatch over the two supported API shapes, because async trait
//! methods are not dyn-compatible. Both backends speak JSON over HTTP via
//! `reqwest`; the runner does not care which model sits behind the URL,
//! it sends a rendered prompt and expects a text body containing JSON.

use serde_json::Value;

use crate::config::{BackendType, LlmBackendConfig};
use crate::error::RunnerError;
use crate::prompt::RenderedPrompt;

/// Sampling temperature for agent reasoning calls.
const TEMPERATURE: f64 = 0.7;

/// Completion budget per reasoning call.
const MAX_TOKENS: u32 = 600;

/// An LLM backend that turns a rendered prompt into response text.
pub enum LlmBackend {
    /// `OpenAI`-compatible chat completions endpoint.
    OpenAi(HttpBackend),
    /// Anthropic Messages endpoint.
    Anthropic(HttpBackend),
}

impl LlmBackend {
    /// Build a backend from configuration.
    pub fn from_config(config: &LlmBackendConfig) -> Self {
        let inner = HttpBackend::new(config);
        match config.backend_type {
            BackendType::OpenAi => Self::OpenAi(inner),
            BackendType::Anthropic => Self::Anthropic(inner),
        }
    }

    /// Human-readable backend name for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::OpenAi(_) => "openai-compatible",
            Self::Anthropic(_) => "anthropic",
        }
    }

    /// Send a prompt and return the raw response text.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::RateLimited`] on a 429 status,
    /// [`RunnerError::LlmBackend`] for any other transport or extraction
    /// failure.
    pub async fn complete(&self, prompt: &RenderedPrompt) -> Result<String, RunnerError> {
        match self {
            Self::OpenAi(http) => {
                let url = format!("{}/chat/completions", http.api_url);
                let body = serde_json::json!({
                    "model": http.model,
                    "messages": [
                        {"role": "system", "content": prompt.system},
                        {"role": "user", "content": prompt.user}
                    ],
                    "temperature": TEMPERATURE,
                    "max_tokens": MAX_TOKENS,
                    "response_format": {"type": "json_object"}
                });
                let headers = [(
                    "Authorization".to_owned(),
                    format!("Bearer {}", http.api_key),
                )];
                let json = http.post_json(&url, &headers, &body).await?;
                pick_text(&json, &["choices", "0", "message", "content"])
            }
            Self::Anthropic(http) => {
                let url = format!("{}/messages", http.api_url);
                let body = serde_json::json!({
                    "model": http.model,
                    "max_tokens": MAX_TOKENS,
                    "system": prompt.system,
                    "messages": [
                        {"role": "user", "content": prompt.user}
                    ]
                });
                let headers = [
                    ("x-api-key".to_owned(), http.api_key.clone()),
                    ("anthropic-version".to_owned(), "2023-06-01".to_owned()),
                ];
                let json = http.post_json(&url, &headers, &body).await?;
                pick_text(&json, &["content", "0", "text"])
            }
        }
    }
}

/// Shared HTTP plumbing for both API shapes.
pub struct HttpBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl HttpBackend {
    fn new(config: &LlmBackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    /// POST a JSON body with the given headers and parse a JSON response.
    async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &Value,
    ) -> Result<Value, RunnerError> {
        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "application/json");
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .json(body)
            .send()
            .await
            .map_err(|e| RunnerError::LlmBackend(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(RunnerError::RateLimited);
        }
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(RunnerError::LlmBackend(format!(
                "{url} returned {status}: {error_body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| RunnerError::LlmBackend(format!("response from {url} not JSON: {e}")))
    }
}

/// Walk a JSON value by a path of object keys and array indexes and
/// return the string found there.
fn pick_text(json: &Value, path: &[&str]) -> Result<String, RunnerError> {
    let mut cursor = json;
    for segment in path {
        cursor = match segment.parse::<usize>() {
            Ok(index) => cursor.get(index),
            Err(_) => cursor.get(segment),
        }
        .ok_or_else(|| {
            RunnerError::LlmBackend(format!(
                "response missing {path}",
                path = path.join(".")
            ))
        })?;
    }
    cursor
        .as_str()
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            RunnerError::LlmBackend(format!("{path} is not a string", path = path.join(".")))
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn pick_text_walks_openai_shape() {
        let json = serde_json::json!({
            "choices": [{
                "message": {"content": "{\"description\": \"rested\"}"}
            }]
        });
        let text = pick_text(&json, &["choices", "0", "message", "content"]).unwrap();
        assert!(text.contains("rested"));
    }

    #[test]
    fn pick_text_walks_anthropic_shape() {
        let json = serde_json::json!({
            "content": [{"type": "text", "text": "{\"content\": \"a full day\"}"}]
        });
        let text = pick_text(&json, &["content", "0", "text"]).unwrap();
        assert!(text.contains("full day"));
    }

    #[test]
    fn pick_text_reports_missing_fields() {
        let json = serde_json::json!({"error": {"type": "overloaded"}});
        let result = pick_text(&json, &["choices", "0", "message", "content"]);
        assert!(result.is_err());
    }

    #[test]
    fn backend_names_follow_config() {
        let config = LlmBackendConfig {
            backend_type: BackendType::OpenAi,
            api_url: "http://localhost:11434/v1".to_owned(),
            api_key: "unused".to_owned(),
            model: "test".to_owned(),
        };
        assert_eq!(LlmBackend::from_config(&config).name(), "openai-compatible");

        let config = LlmBackendConfig {
            backend_type: BackendType::Anthropic,
            ..config
        };
        assert_eq!(LlmBackend::from_config(&config).name(), "anthropic");
    }
}
