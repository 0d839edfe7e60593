//! Model selection with ordered fallback.
//!
//! Resolution lists the models the credential can see, prefers a
//! generation-capable model from the configured family, then probes that
//! preference followed by a static fallback list, keeping the first model that
//! instantiates. A failed listing is not fatal: the fallbacks are still probed.
//!
//! The resolved handle is cached for `cache_ttl`; a zero TTL re-resolves on
//! every request.

use super::metrics;
use super::providers::{ProviderError, TextProvider};
use crate::models::{ModelCandidate, ModelHandle};
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;

/// Default fallback sequence, highest priority first.
pub const DEFAULT_FALLBACK_MODELS: &[&str] = &["gemini-1.5-flash", "gemini-1.5-pro", "gemini-pro"];
pub const DEFAULT_PREFERRED_FAMILY: &str = "gemini";

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// Case-insensitive substring that marks a listed model as preferred.
    pub preferred_family: String,
    pub fallback_models: Vec<String>,
    pub cache_ttl: Duration,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            preferred_family: DEFAULT_PREFERRED_FAMILY.to_string(),
            fallback_models: DEFAULT_FALLBACK_MODELS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            cache_ttl: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("no usable model among [{}]", .tried.join(", "))]
pub struct NoModelAvailable {
    /// Candidates attempted, in order.
    pub tried: Vec<String>,
    pub last_error: Option<ProviderError>,
}

/// Where a resolved model came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    Cache,
    Listed,
    Fallback,
}

impl ResolutionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionSource::Cache => "cache",
            ResolutionSource::Listed => "listed",
            ResolutionSource::Fallback => "fallback",
        }
    }
}

/// Run `try_fn` over `candidates` in order and return the first success.
///
/// Stops at the first `Ok`; candidates after it are never attempted. On total
/// failure returns every `(candidate, error)` pair in attempt order.
pub async fn first_success<T, E, F, Fut>(
    candidates: &[String],
    mut try_fn: F,
) -> Result<(String, T), Vec<(String, E)>>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut failures = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match try_fn(candidate.clone()).await {
            Ok(value) => return Ok((candidate.clone(), value)),
            Err(e) => failures.push((candidate.clone(), e)),
        }
    }
    Err(failures)
}

/// Pick a model from a listing: the first generation-capable model whose name
/// contains `family`, else the first generation-capable model.
pub fn select_preferred<'a>(models: &'a [ModelCandidate], family: &str) -> Option<&'a ModelCandidate> {
    let family = family.to_lowercase();
    let mut capable = models.iter().filter(|m| m.supports_generation);
    let first_capable = capable.clone().next();

    capable
        .find(|m| !family.is_empty() && m.name.to_lowercase().contains(&family))
        .or(first_capable)
}

/// Listing-derived preference. A failed listing yields no preference.
pub fn preferred_from_listing(
    listing: Result<Vec<ModelCandidate>, ProviderError>,
    family: &str,
) -> Option<String> {
    match listing {
        Ok(models) => select_preferred(&models, family).map(|m| m.name.clone()),
        Err(e) => {
            tracing::warn!(error = %e, "Model listing failed, continuing with fallback models");
            metrics::record_listing_failure();
            None
        }
    }
}

/// `[preferred]` followed by `fallbacks`, without duplicates or blanks.
pub fn candidate_list(preferred: Option<&str>, fallbacks: &[String]) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::with_capacity(fallbacks.len() + 1);
    for name in preferred.into_iter().chain(fallbacks.iter().map(String::as_str)) {
        let name = crate::models::model::normalize_model_name(name);
        if !name.is_empty() && !candidates.iter().any(|c| c == name) {
            candidates.push(name.to_string());
        }
    }
    candidates
}

struct CachedModel {
    handle: ModelHandle,
    resolved_at: Instant,
}

pub struct ModelResolver {
    settings: ResolverSettings,
    cache: RwLock<Option<CachedModel>>,
}

impl ModelResolver {
    pub fn new(settings: ResolverSettings) -> Self {
        Self {
            settings,
            cache: RwLock::new(None),
        }
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    pub async fn resolve(
        &self,
        provider: &dyn TextProvider,
    ) -> Result<(ModelHandle, ResolutionSource), NoModelAvailable> {
        if let Some(handle) = self.cached().await {
            return Ok((handle, ResolutionSource::Cache));
        }

        let preferred =
            preferred_from_listing(provider.list_models().await, &self.settings.preferred_family);
        let candidates = candidate_list(preferred.as_deref(), &self.settings.fallback_models);

        tracing::debug!(
            preferred = preferred.as_deref().unwrap_or("-"),
            candidates = ?candidates,
            "Probing model candidates"
        );

        let outcome = first_success(&candidates, |name| async move {
            let result = provider.load_model(&name).await;
            if let Err(e) = &result {
                tracing::info!(model = %name, error = %e, "Model candidate unavailable");
            }
            result
        })
        .await;

        match outcome {
            Ok((name, handle)) => {
                let source = if preferred.as_deref() == Some(name.as_str()) {
                    ResolutionSource::Listed
                } else {
                    ResolutionSource::Fallback
                };
                self.store(&handle).await;
                Ok((handle, source))
            }
            Err(failures) => {
                let last_error = failures.last().map(|(_, e)| e.clone());
                Err(NoModelAvailable {
                    tried: failures.into_iter().map(|(name, _)| name).collect(),
                    last_error,
                })
            }
        }
    }

    /// Drop the cached model so the next request re-resolves.
    pub async fn invalidate(&self) {
        self.cache.write().await.take();
    }

    async fn cached(&self) -> Option<ModelHandle> {
        if self.settings.cache_ttl.is_zero() {
            return None;
        }
        self.cache
            .read()
            .await
            .as_ref()
            .filter(|c| c.resolved_at.elapsed() < self.settings.cache_ttl)
            .map(|c| c.handle.clone())
    }

    async fn store(&self, handle: &ModelHandle) {
        if self.settings.cache_ttl.is_zero() {
            return;
        }
        *self.cache.write().await = Some(CachedModel {
            handle: handle.clone(),
            resolved_at: Instant::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::mock::MockTextProvider;
    use std::cell::RefCell;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn settings(fallbacks: &[&str], ttl: Duration) -> ResolverSettings {
        ResolverSettings {
            preferred_family: "gemini".to_string(),
            fallback_models: names(fallbacks),
            cache_ttl: ttl,
        }
    }

    #[tokio::test]
    async fn first_success_stops_at_first_ok() {
        let attempted = RefCell::new(Vec::new());
        let result = first_success(&names(&["a", "b", "c"]), |name| {
            attempted.borrow_mut().push(name.clone());
            async move {
                if name == "a" {
                    Err("a is gone")
                } else {
                    Ok(name.to_uppercase())
                }
            }
        })
        .await;

        assert_eq!(result, Ok(("b".to_string(), "B".to_string())));
        assert_eq!(*attempted.borrow(), names(&["a", "b"]));
    }

    #[tokio::test]
    async fn first_success_reports_every_failure_in_order() {
        let result: Result<(String, ()), _> =
            first_success(&names(&["a", "b"]), |name| async move { Err(name.len()) }).await;

        assert_eq!(result, Err(vec![("a".to_string(), 1), ("b".to_string(), 1)]));
    }

    #[tokio::test]
    async fn first_success_with_no_candidates_fails() {
        let result: Result<(String, ()), Vec<(String, ())>> =
            first_success(&[], |_| async { Ok(()) }).await;
        assert_eq!(result, Err(vec![]));
    }

    #[test]
    fn prefers_capable_model_from_family() {
        let models = vec![
            ModelCandidate::new("models/embedding-gemini-001", false),
            ModelCandidate::new("models/text-bison-001", true),
            ModelCandidate::new("models/Gemini-1.5-Flash-002", true),
            ModelCandidate::new("models/gemini-1.5-pro", true),
        ];
        let chosen = select_preferred(&models, "gemini").unwrap();
        assert_eq!(chosen.name, "Gemini-1.5-Flash-002");
    }

    #[test]
    fn falls_back_to_first_capable_model_outside_family() {
        let models = vec![
            ModelCandidate::new("models/embedding-001", false),
            ModelCandidate::new("models/text-bison-001", true),
            ModelCandidate::new("models/chat-bison-001", true),
        ];
        assert_eq!(
            select_preferred(&models, "gemini").unwrap().name,
            "text-bison-001"
        );
    }

    #[test]
    fn no_capable_model_means_no_preference() {
        let models = vec![ModelCandidate::new("models/gemini-embedding", false)];
        assert!(select_preferred(&models, "gemini").is_none());
        assert!(select_preferred(&[], "gemini").is_none());
    }

    #[test]
    fn failed_listing_yields_no_preference() {
        let listing = Err(ProviderError::Network("connection refused".to_string()));
        assert_eq!(preferred_from_listing(listing, "gemini"), None);
    }

    #[test]
    fn candidate_list_puts_preference_first_and_dedupes() {
        let fallbacks = names(&["gemini-1.5-flash", "models/gemini-1.5-pro", " "]);
        assert_eq!(
            candidate_list(Some("gemini-1.5-pro"), &fallbacks),
            names(&["gemini-1.5-pro", "gemini-1.5-flash"])
        );
        assert_eq!(
            candidate_list(None, &fallbacks),
            names(&["gemini-1.5-flash", "gemini-1.5-pro"])
        );
    }

    #[tokio::test]
    async fn stops_probing_after_first_loadable_candidate() {
        let provider = MockTextProvider::new("ok").with_loadable_models(&["b", "c"]);
        let resolver = ModelResolver::new(settings(&["a", "b", "c"], Duration::ZERO));

        let (handle, source) = resolver.resolve(&provider).await.unwrap();

        assert_eq!(handle.name, "b");
        assert_eq!(source, ResolutionSource::Fallback);
        assert_eq!(provider.load_attempts(), names(&["a", "b"]));
    }

    #[tokio::test]
    async fn listed_model_is_tried_before_fallbacks() {
        let provider = MockTextProvider::new("ok")
            .with_listing(vec![ModelCandidate::new("models/gemini-2.0-flash", true)]);
        let resolver = ModelResolver::new(settings(&["gemini-1.5-flash"], Duration::ZERO));

        let (handle, source) = resolver.resolve(&provider).await.unwrap();

        assert_eq!(handle.name, "gemini-2.0-flash");
        assert_eq!(source, ResolutionSource::Listed);
        assert_eq!(provider.load_attempts(), names(&["gemini-2.0-flash"]));
    }

    #[tokio::test]
    async fn listing_failure_still_resolves_from_fallbacks() {
        let provider = MockTextProvider::new("ok")
            .with_failing_listing(ProviderError::Api {
                status: 403,
                message: "permission denied".to_string(),
            })
            .with_loadable_models(&["gemini-1.5-pro"]);
        let resolver =
            ModelResolver::new(settings(&["gemini-1.5-flash", "gemini-1.5-pro"], Duration::ZERO));

        let (handle, _) = resolver.resolve(&provider).await.unwrap();

        assert_eq!(handle.name, "gemini-1.5-pro");
        assert_eq!(provider.list_calls(), 1);
    }

    #[tokio::test]
    async fn exhausted_candidates_report_what_was_tried() {
        let provider = MockTextProvider::new("ok").with_loadable_models(&[]);
        let resolver = ModelResolver::new(settings(&["x", "y"], Duration::ZERO));

        let err = resolver.resolve(&provider).await.unwrap_err();

        assert_eq!(err.tried, names(&["x", "y"]));
        assert!(matches!(err.last_error, Some(ProviderError::Api { status: 404, .. })));
        assert_eq!(err.to_string(), "no usable model among [x, y]");
    }

    #[tokio::test]
    async fn cached_model_skips_listing_until_invalidated() {
        let provider = MockTextProvider::new("ok");
        let resolver = ModelResolver::new(settings(&["gemini-1.5-flash"], Duration::from_secs(60)));

        resolver.resolve(&provider).await.unwrap();
        let (_, source) = resolver.resolve(&provider).await.unwrap();
        assert_eq!(source, ResolutionSource::Cache);
        assert_eq!(provider.list_calls(), 1);

        resolver.invalidate().await;
        resolver.resolve(&provider).await.unwrap();
        assert_eq!(provider.list_calls(), 2);
    }

    #[tokio::test]
    async fn zero_ttl_re_resolves_every_time() {
        let provider = MockTextProvider::new("ok");
        let resolver = ModelResolver::new(settings(&["gemini-1.5-flash"], Duration::ZERO));

        resolver.resolve(&provider).await.unwrap();
        resolver.resolve(&provider).await.unwrap();

        assert_eq!(provider.list_calls(), 2);
        assert_eq!(provider.load_attempts().len(), 2);
    }
}
