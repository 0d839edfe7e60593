//! Application startup and lifecycle management.
//!
//! One HTTP listener serves the page, static assets, the chat endpoint and
//! the operational routes.

use crate::config::ChatConfig;
use crate::handlers::{
    chat::chat,
    health::{health_check, metrics, readiness_check},
    page::index,
};
use crate::models::PortfolioContext;
use crate::services::providers::gemini::{GeminiConfig, GeminiTextProvider};
use crate::services::providers::TextProvider;
use crate::services::{ChatService, ChatSettings, ModelResolver, ResolverSettings};
use axum::{
    http::{HeaderValue, Method, Request},
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatService>,
}

pub fn build_router(state: AppState, config: &ChatConfig) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/chat", post(chat))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics))
        .nest_service("/static", ServeDir::new(&config.portfolio.static_dir))
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer(&config.portfolio.allowed_origins))
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    if allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(origins)
}

/// Wire the chat service from configuration around the given provider.
pub fn build_state(
    config: &ChatConfig,
    provider: Arc<dyn TextProvider>,
) -> Result<AppState, AppError> {
    let context = match &config.portfolio.context_file {
        Some(path) => PortfolioContext::from_file(path).map_err(|e| {
            tracing::error!(path = %path.display(), "Failed to read portfolio context: {}", e);
            AppError::ConfigError(anyhow::anyhow!(
                "cannot read context file {}: {}",
                path.display(),
                e
            ))
        })?,
        None => PortfolioContext::default(),
    };

    let resolver = ModelResolver::new(ResolverSettings {
        preferred_family: config.models.preferred_family.clone(),
        fallback_models: config.models.fallback_models.clone(),
        cache_ttl: config.models.cache_ttl,
    });

    let settings = ChatSettings {
        prompt_style: config.portfolio.prompt_style,
        max_question_chars: config.portfolio.max_question_chars,
        generation_timeout: config.google.request_timeout,
    };

    Ok(AppState {
        chat: Arc::new(ChatService::new(provider, resolver, context, settings)),
    })
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application with the Gemini provider.
    pub async fn build(config: ChatConfig) -> Result<Self, AppError> {
        let gemini_config = GeminiConfig {
            api_key: config.google.api_key.clone(),
            base_url: config.google.api_base.clone(),
            timeout: config.google.request_timeout,
        };
        let provider = GeminiTextProvider::new(gemini_config)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!(e)))?;

        if provider.is_configured() {
            tracing::info!(api_base = %config.google.api_base, "Initialized Gemini text provider");
        } else {
            tracing::warn!("GEMINI_API_KEY is not set; chat requests will fail until it is");
        }

        Self::build_with_provider(config, Arc::new(provider)).await
    }

    /// Build around any provider. Port 0 picks a random port.
    pub async fn build_with_provider(
        config: ChatConfig,
        provider: Arc<dyn TextProvider>,
    ) -> Result<Self, AppError> {
        let state = build_state(&config, provider)?;
        let router = build_router(state, &config);

        let address = config.common.address();
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", address, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Portfolio chat service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
