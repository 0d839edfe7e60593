//! Gemini provider implementation.
//!
//! Talks to the Generative Language REST API: `models` (paged listing),
//! `models/{name}` (metadata lookup, used to instantiate a model) and
//! `models/{name}:generateContent`. The key travels in the `x-goog-api-key`
//! header so it never shows up in URLs or request logs.

use super::{ProviderError, TextProvider};
use crate::models::{ModelCandidate, ModelHandle, Prompt};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Gemini API base URL.
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

const API_KEY_HEADER: &str = "x-goog-api-key";
const GENERATE_CONTENT_METHOD: &str = "generateContent";
const LIST_PAGE_SIZE: &str = "1000";
/// Upper bound on listing pages, in case the API keeps handing out tokens.
const MAX_LIST_PAGES: usize = 20;

/// Gemini provider configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<Secret<String>>,
    pub base_url: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: Option<Secret<String>>) -> Self {
        Self {
            api_key,
            base_url: GEMINI_API_BASE.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Gemini text provider.
pub struct GeminiTextProvider {
    config: GeminiConfig,
    client: Client,
}

impl GeminiTextProvider {
    pub fn new(config: GeminiConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.config
            .api_key
            .as_ref()
            .map(|key| key.expose_secret().as_str())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ProviderError::NotConfigured("Gemini API key not configured".to_string()))
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Send an authenticated request and decode a JSON body, classifying failures.
    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ProviderError> {
        let response = request
            .header(API_KEY_HEADER, self.api_key()?)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();

            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(ProviderError::RateLimited);
            }

            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: api_error_message(&error_text),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }
}

/// Pull `error.message` out of a Google API error body, falling back to the raw text.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

#[async_trait]
impl TextProvider for GeminiTextProvider {
    fn is_configured(&self) -> bool {
        self.api_key().is_ok()
    }

    async fn list_models(&self) -> Result<Vec<ModelCandidate>, ProviderError> {
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let mut request = self
                .client
                .get(self.api_url("models"))
                .query(&[("pageSize", LIST_PAGE_SIZE)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let page: ListModelsResponse = self.send_json(request).await?;
            models.extend(page.models.iter().map(ModelInfo::to_candidate));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => {
                    tracing::debug!(count = models.len(), "Listed Gemini models");
                    return Ok(models);
                }
            }
        }

        tracing::warn!(
            count = models.len(),
            max_pages = MAX_LIST_PAGES,
            "Model listing still paginating, using what was collected"
        );
        Ok(models)
    }

    async fn load_model(&self, name: &str) -> Result<ModelHandle, ProviderError> {
        let handle = ModelHandle::new(name);
        let info: ModelInfo = self
            .send_json(self.client.get(self.api_url(&format!("models/{}", handle.name))))
            .await?;

        if !info.supports_generation() {
            return Err(ProviderError::UnsupportedModel(handle.name));
        }

        Ok(match info.display_name {
            Some(display_name) => handle.with_display_name(display_name),
            None => handle,
        })
    }

    async fn generate(
        &self,
        model: &ModelHandle,
        prompt: &Prompt,
    ) -> Result<String, ProviderError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![ContentPart::Text {
                    text: prompt.to_string(),
                }],
            }],
        };

        let url = self.api_url(&format!(
            "models/{}:{}",
            model.name, GENERATE_CONTENT_METHOD
        ));

        tracing::debug!(
            model = %model.name,
            prompt_len = prompt.len(),
            "Sending request to Gemini API"
        );

        let response: GenerateContentResponse =
            self.send_json(self.client.post(&url).json(&request)).await?;

        if let Some(reason) = response
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            tracing::warn!(model = %model.name, block_reason = reason, "Prompt blocked");
            return Err(ProviderError::ContentFiltered);
        }

        let candidate = response
            .candidates
            .first()
            .ok_or_else(|| ProviderError::EmptyResponse(model.name.clone()))?;

        if candidate.finish_reason.as_deref() == Some("SAFETY") {
            return Err(ProviderError::ContentFiltered);
        }

        let text: String = candidate
            .content
            .iter()
            .flat_map(|c| c.parts.iter())
            .filter_map(|p| match p {
                ContentPart::Text { text } => Some(text.as_str()),
                ContentPart::Other(_) => None,
            })
            .collect();

        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse(model.name.clone()));
        }

        if let Some(usage) = &response.usage_metadata {
            tracing::debug!(
                model = %model.name,
                input_tokens = usage.prompt_token_count.unwrap_or(0),
                output_tokens = usage.candidates_token_count.unwrap_or(0),
                "Gemini generation complete"
            );
        }

        Ok(text)
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        let _: ListModelsResponse = self
            .send_json(
                self.client
                    .get(self.api_url("models"))
                    .query(&[("pageSize", "1")]),
            )
            .await?;
        Ok(())
    }
}

// ============================================================================
// Gemini API Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelInfo {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

impl ModelInfo {
    fn supports_generation(&self) -> bool {
        self.supported_generation_methods
            .iter()
            .any(|m| m == GENERATE_CONTENT_METHOD)
    }

    fn to_candidate(&self) -> ModelCandidate {
        ModelCandidate::new(&self.name, self.supports_generation())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum ContentPart {
    Text { text: String },
    Other(serde_json::Value),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<i32>,
    candidates_token_count: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_blank_key_is_not_configured() {
        let provider = GeminiTextProvider::new(GeminiConfig::new(None)).unwrap();
        assert!(!provider.is_configured());

        let provider =
            GeminiTextProvider::new(GeminiConfig::new(Some(Secret::new("  ".to_string()))))
                .unwrap();
        assert!(!provider.is_configured());

        let provider =
            GeminiTextProvider::new(GeminiConfig::new(Some(Secret::new("k".to_string()))))
                .unwrap();
        assert!(provider.is_configured());
    }

    #[test]
    fn api_error_message_prefers_structured_body() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}}"#;
        assert_eq!(api_error_message(body), "API key not valid");
        assert_eq!(api_error_message(" upstream exploded "), "upstream exploded");
    }

    #[test]
    fn model_info_detects_generation_capability() {
        let info: ModelInfo = serde_json::from_str(
            r#"{"name": "models/embedding-001", "supportedGenerationMethods": ["embedContent"]}"#,
        )
        .unwrap();
        assert_eq!(
            info.to_candidate(),
            ModelCandidate {
                name: "embedding-001".to_string(),
                supports_generation: false
            }
        );
    }

    #[test]
    fn base_url_trailing_slash_is_ignored() {
        let mut config = GeminiConfig::new(None);
        config.base_url = "http://localhost:1234/v1beta/".to_string();
        let provider = GeminiTextProvider::new(config).unwrap();
        assert_eq!(provider.api_url("models"), "http://localhost:1234/v1beta/models");
    }
}
