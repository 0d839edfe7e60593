//! Question answering pipeline.
//!
//! `ChatService::ask` runs the stages in a fixed order and stops at the first
//! failure: validate, check the credential, build the prompt, resolve a model,
//! generate once.

use super::metrics;
use super::providers::{ProviderError, TextProvider};
use super::resolver::{ModelResolver, NoModelAvailable};
use crate::models::{build_prompt, PortfolioContext, PromptStyle, Question, QuestionError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use service_core::error::ErrorResponse;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

const SERVICE_PROBLEM_PREFIX: &str = "Sorry, there was a problem contacting the AI service";

#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub prompt_style: PromptStyle,
    /// Zero means no limit.
    pub max_question_chars: usize,
    /// Upper bound on a single generation call.
    pub generation_timeout: Duration,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            prompt_style: PromptStyle::Guided,
            max_question_chars: 0,
            generation_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("No question provided")]
    InvalidRequest,

    #[error("Question is too long (maximum {max} characters)")]
    QuestionTooLong { max: usize },

    #[error("API key not configured")]
    NotConfigured,

    #[error(transparent)]
    NoModelAvailable(#[from] NoModelAvailable),

    #[error("{0}")]
    Generation(#[from] ProviderError),

    #[error("model did not answer within {0:?}")]
    Timeout(Duration),
}

impl From<QuestionError> for ChatError {
    fn from(err: QuestionError) -> Self {
        match err {
            QuestionError::Blank => ChatError::InvalidRequest,
            QuestionError::TooLong { max, .. } => ChatError::QuestionTooLong { max },
        }
    }
}

impl ChatError {
    pub fn status(&self) -> StatusCode {
        match self {
            ChatError::InvalidRequest | ChatError::QuestionTooLong { .. } => StatusCode::BAD_REQUEST,
            ChatError::NotConfigured
            | ChatError::NoModelAvailable(_)
            | ChatError::Generation(_)
            | ChatError::Timeout(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Label for the `chat_requests_total` counter.
    pub fn outcome(&self) -> &'static str {
        match self {
            ChatError::InvalidRequest | ChatError::QuestionTooLong { .. } => "invalid_request",
            ChatError::NotConfigured => "not_configured",
            ChatError::NoModelAvailable(_) => "no_model_available",
            ChatError::Generation(_) => "generation_error",
            ChatError::Timeout(_) => "timeout",
        }
    }

    /// Message shown to the caller. Downstream failures share one prefix.
    pub fn public_message(&self) -> String {
        match self {
            ChatError::InvalidRequest
            | ChatError::QuestionTooLong { .. }
            | ChatError::NotConfigured => self.to_string(),
            ChatError::NoModelAvailable(_) | ChatError::Generation(_) | ChatError::Timeout(_) => {
                format!("{}: {}", SERVICE_PROBLEM_PREFIX, self)
            }
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        ErrorResponse::new(self.public_message()).into_response_with(self.status())
    }
}

pub struct ChatService {
    provider: Arc<dyn TextProvider>,
    resolver: ModelResolver,
    context: PortfolioContext,
    settings: ChatSettings,
}

impl ChatService {
    pub fn new(
        provider: Arc<dyn TextProvider>,
        resolver: ModelResolver,
        context: PortfolioContext,
        settings: ChatSettings,
    ) -> Self {
        Self {
            provider,
            resolver,
            context,
            settings,
        }
    }

    pub fn provider(&self) -> &Arc<dyn TextProvider> {
        &self.provider
    }

    pub fn context(&self) -> &PortfolioContext {
        &self.context
    }

    /// Validate raw input and answer it, recording the outcome.
    pub async fn ask(&self, raw_question: Option<&str>) -> Result<String, ChatError> {
        let result = match Question::parse(raw_question, self.settings.max_question_chars) {
            Ok(question) => self.answer(&question).await,
            Err(e) => Err(e.into()),
        };

        match &result {
            Ok(_) => metrics::record_chat_outcome("answered"),
            Err(e) => metrics::record_chat_outcome(e.outcome()),
        }
        result
    }

    /// Answer an already validated question.
    pub async fn answer(&self, question: &Question) -> Result<String, ChatError> {
        if !self.provider.is_configured() {
            tracing::error!("Chat request rejected: provider API key not configured");
            return Err(ChatError::NotConfigured);
        }

        let prompt = build_prompt(&self.context, question, self.settings.prompt_style);

        let (model, source) = self
            .resolver
            .resolve(self.provider.as_ref())
            .await
            .map_err(|e| {
                tracing::error!(tried = ?e.tried, last_error = ?e.last_error, "No model available");
                e
            })?;
        metrics::record_model_resolution(source.as_str());

        let started = Instant::now();
        let outcome = tokio::time::timeout(
            self.settings.generation_timeout,
            self.provider.generate(&model, &prompt),
        )
        .await;
        let elapsed = started.elapsed();
        metrics::record_provider_latency(&model.name, elapsed.as_secs_f64());

        let text = match outcome {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                tracing::error!(model = %model.name, error = %e, "Generation failed");
                self.resolver.invalidate().await;
                return Err(ChatError::Generation(e));
            }
            Err(_) => {
                tracing::error!(
                    model = %model.name,
                    timeout = ?self.settings.generation_timeout,
                    "Generation timed out"
                );
                self.resolver.invalidate().await;
                return Err(ChatError::Timeout(self.settings.generation_timeout));
            }
        };

        let answer = text.trim();
        if answer.is_empty() {
            self.resolver.invalidate().await;
            return Err(ChatError::Generation(ProviderError::EmptyResponse(
                model.name.clone(),
            )));
        }

        tracing::info!(
            model = %model.name,
            source = source.as_str(),
            answer_len = answer.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Answered chat question"
        );

        Ok(answer.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::mock::MockTextProvider;
    use crate::services::resolver::ResolverSettings;

    fn service(provider: Arc<MockTextProvider>, settings: ChatSettings) -> ChatService {
        ChatService::new(
            provider,
            ModelResolver::new(ResolverSettings {
                cache_ttl: Duration::ZERO,
                ..ResolverSettings::default()
            }),
            PortfolioContext::new("About Alexis."),
            settings,
        )
    }

    #[tokio::test]
    async fn answers_are_trimmed() {
        let provider = Arc::new(MockTextProvider::new("  Alexis builds UIs.\n"));
        let chat = service(provider.clone(), ChatSettings::default());

        let answer = chat.ask(Some("What does Alexis do?")).await.unwrap();

        assert_eq!(answer, "Alexis builds UIs.");
        let generations = provider.generations();
        assert_eq!(generations.len(), 1);
        assert_eq!(generations[0].0, "gemini-1.5-flash");
        assert_eq!(
            generations[0].1,
            "About Alexis.\n\nUser question: What does Alexis do?\n\nAssistant response:"
        );
    }

    #[tokio::test]
    async fn blank_question_makes_no_provider_calls() {
        let provider = Arc::new(MockTextProvider::new("unused"));
        let chat = service(provider.clone(), ChatSettings::default());

        let err = chat.ask(Some("   ")).await.unwrap_err();

        assert!(matches!(err, ChatError::InvalidRequest));
        assert_eq!(provider.total_calls(), 0);
    }

    #[tokio::test]
    async fn too_long_question_is_rejected() {
        let provider = Arc::new(MockTextProvider::new("unused"));
        let settings = ChatSettings {
            max_question_chars: 5,
            ..ChatSettings::default()
        };
        let chat = service(provider.clone(), settings);

        let err = chat.ask(Some("far too long")).await.unwrap_err();

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(), "Question is too long (maximum 5 characters)");
        assert_eq!(provider.total_calls(), 0);
    }

    #[tokio::test]
    async fn default_settings_accept_long_questions() {
        let provider = Arc::new(MockTextProvider::new("Long answer."));
        let chat = service(provider.clone(), ChatSettings::default());

        let answer = chat.ask(Some(&"a".repeat(2001))).await.unwrap();

        assert_eq!(answer, "Long answer.");
        assert_eq!(provider.generations().len(), 1);
    }

    #[tokio::test]
    async fn missing_credential_makes_no_provider_calls() {
        let provider = Arc::new(MockTextProvider::new("unused").unconfigured());
        let chat = service(provider.clone(), ChatSettings::default());

        let err = chat.ask(Some("Skills?")).await.unwrap_err();

        assert!(matches!(err, ChatError::NotConfigured));
        assert_eq!(err.public_message(), "API key not configured");
        assert_eq!(provider.total_calls(), 0);
    }

    #[tokio::test]
    async fn generation_error_is_not_retried() {
        let provider = Arc::new(
            MockTextProvider::new("unused")
                .with_generation_error(ProviderError::Network("connection reset".to_string())),
        );
        let chat = service(provider.clone(), ChatSettings::default());

        let err = chat.ask(Some("Skills?")).await.unwrap_err();

        assert_eq!(
            err.public_message(),
            "Sorry, there was a problem contacting the AI service: Network error: connection reset"
        );
        assert_eq!(provider.generations().len(), 1);
    }

    #[tokio::test]
    async fn whitespace_only_answer_is_a_generation_error() {
        let provider = Arc::new(MockTextProvider::new(" \n "));
        let chat = service(provider, ChatSettings::default());

        let err = chat.ask(Some("Skills?")).await.unwrap_err();

        assert!(matches!(
            err,
            ChatError::Generation(ProviderError::EmptyResponse(_))
        ));
    }

    #[tokio::test]
    async fn slow_generation_times_out() {
        let provider = Arc::new(MockTextProvider::new("late").with_delay(Duration::from_secs(5)));
        let settings = ChatSettings {
            generation_timeout: Duration::from_millis(50),
            ..ChatSettings::default()
        };
        let chat = service(provider, settings);

        let err = chat.ask(Some("Skills?")).await.unwrap_err();

        assert!(matches!(err, ChatError::Timeout(_)));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.public_message().starts_with(SERVICE_PROBLEM_PREFIX));
    }

    #[tokio::test]
    async fn exhausted_models_collapse_into_generic_message() {
        let provider = Arc::new(MockTextProvider::new("unused").with_loadable_models(&[]));
        let chat = service(provider.clone(), ChatSettings::default());

        let err = chat.ask(Some("Skills?")).await.unwrap_err();

        assert!(matches!(err, ChatError::NoModelAvailable(_)));
        assert_eq!(
            err.public_message(),
            "Sorry, there was a problem contacting the AI service: \
             no usable model among [gemini-1.5-flash, gemini-1.5-pro, gemini-pro]"
        );
        assert!(provider.generations().is_empty());
    }
}
