//! Model-assisted main content selection.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::WebsiteConfig;
use crate::error::{ExtractError, ExtractResult};

/// Longest content sent to the model, in characters.
const MAX_PROMPT_CONTENT_CHARS: usize = 100_000;

/// Second pass over scraped text that drops leftover boilerplate.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentSelector: Send + Sync {
    /// `title` is empty when the page has none. Returns `None` when the
    /// selector has nothing better to offer.
    async fn select_content(&self, title: &str, content: &str) -> ExtractResult<Option<String>>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

/// Gemini `generateContent` backed selector.
pub struct GeminiContentSelector {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiContentSelector {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: std::time::Duration,
    ) -> ExtractResult<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// `None` when no API key is configured.
    pub fn from_config(config: &WebsiteConfig) -> ExtractResult<Option<Self>> {
        config
            .gemini_api_key
            .as_ref()
            .map(|key| {
                Self::new(
                    key.clone(),
                    config.gemini_model.clone(),
                    config.gemini_base_url.clone(),
                    config.timeout * 2,
                )
            })
            .transpose()
    }

    fn build_prompt(title: &str, content: &str) -> String {
        let content: String = content.chars().take(MAX_PROMPT_CONTENT_CHARS).collect();
        format!(
            "Below is text scraped from a web page{}. Return only the main article or body \
             content, verbatim, with navigation, cookie notices, advertisements, share buttons, \
             and related-link lists removed. Do not summarize or add commentary. If there is no \
             main content, return an empty response.\n\n---\n{}",
            if title.is_empty() {
                String::new()
            } else {
                format!(" titled \"{}\"", title)
            },
            content
        )
    }
}

#[async_trait]
impl ContentSelector for GeminiContentSelector {
    async fn select_content(&self, title: &str, content: &str) -> ExtractResult<Option<String>> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Self::build_prompt(title, content),
                }],
            }],
            generation_config: GenerationConfig { temperature: 0.0 },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ExtractError::selection(format!("Gemini request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::selection(format!(
                "Gemini returned {}: {}",
                status, body
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ExtractError::selection(format!("Failed to parse Gemini response: {}", e)))?;

        let text = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .map(|p| p.text)
            .collect::<String>();

        let text = strip_code_fence(text.trim());
        debug!(chars = text.len(), model = %self.model, "Gemini content selection finished");

        Ok((!text.is_empty()).then(|| text.to_string()))
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop an optional language tag on the fence line
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn selector(server: &MockServer) -> GeminiContentSelector {
        GeminiContentSelector::new("test-key", "gemini-test", server.uri(), Duration::from_secs(5)).unwrap()
    }

    fn reply(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": text}]}}]
        })
    }

    #[tokio::test]
    async fn test_returns_model_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-test:generateContent"))
            .and(query_param("key", "test-key"))
            .and(body_string_contains("Cookie banner"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("The article body.")))
            .expect(1)
            .mount(&server)
            .await;

        let result = selector(&server)
            .select_content("News", "Cookie banner\nThe article body.")
            .await
            .unwrap();
        assert_eq!(result.as_deref(), Some("The article body."));
    }

    #[tokio::test]
    async fn test_empty_reply_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"candidates": []})))
            .mount(&server)
            .await;

        let result = selector(&server).select_content("", "text").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_error_status_is_selection_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota"))
            .mount(&server)
            .await;

        let err = selector(&server).select_content("", "text").await.unwrap_err();
        assert!(matches!(err, ExtractError::Selection(msg) if msg.contains("429")));
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```text\nBody here\n```"), "Body here");
        assert_eq!(strip_code_fence("```\nBody\n```"), "Body");
        assert_eq!(strip_code_fence("Plain"), "Plain");
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = WebsiteConfig::default();
        assert!(GeminiContentSelector::from_config(&config).unwrap().is_none());

        let config = WebsiteConfig {
            gemini_api_key: Some("k".to_string()),
            ..Default::default()
        };
        assert!(GeminiContentSelector::from_config(&config).unwrap().is_some());
    }
}
