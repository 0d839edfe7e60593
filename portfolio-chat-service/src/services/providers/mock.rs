//! Mock provider implementation for testing.

use super::{ProviderError, TextProvider};
use crate::models::{ModelCandidate, ModelHandle, Prompt};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Scriptable text provider that records every call it receives.
///
/// By default it is configured, lists no models, accepts any model name and
/// answers every prompt with the same text.
pub struct MockTextProvider {
    configured: bool,
    listing: Result<Vec<ModelCandidate>, ProviderError>,
    loadable: Option<Vec<String>>,
    reply: Result<String, ProviderError>,
    delay: Option<Duration>,
    list_calls: AtomicUsize,
    load_attempts: Mutex<Vec<String>>,
    generations: Mutex<Vec<(String, String)>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockTextProvider {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            configured: true,
            listing: Ok(Vec::new()),
            loadable: None,
            reply: Ok(reply.into()),
            delay: None,
            list_calls: AtomicUsize::new(0),
            load_attempts: Mutex::new(Vec::new()),
            generations: Mutex::new(Vec::new()),
        }
    }

    /// Behave as if no API key was supplied.
    pub fn unconfigured(mut self) -> Self {
        self.configured = false;
        self
    }

    pub fn with_listing(mut self, models: Vec<ModelCandidate>) -> Self {
        self.listing = Ok(models);
        self
    }

    pub fn with_failing_listing(mut self, error: ProviderError) -> Self {
        self.listing = Err(error);
        self
    }

    /// Only these names can be instantiated; everything else fails.
    pub fn with_loadable_models(mut self, names: &[&str]) -> Self {
        self.loadable = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn with_generation_error(mut self, error: ProviderError) -> Self {
        self.reply = Err(error);
        self
    }

    /// Sleep this long inside `generate`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Model names passed to `load_model`, in call order.
    pub fn load_attempts(&self) -> Vec<String> {
        lock(&self.load_attempts).clone()
    }

    /// `(model, prompt)` pairs passed to `generate`, in call order.
    pub fn generations(&self) -> Vec<(String, String)> {
        lock(&self.generations).clone()
    }

    /// Every provider call of any kind, health checks excluded.
    pub fn total_calls(&self) -> usize {
        self.list_calls() + lock(&self.load_attempts).len() + lock(&self.generations).len()
    }
}

#[async_trait]
impl TextProvider for MockTextProvider {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn list_models(&self) -> Result<Vec<ModelCandidate>, ProviderError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.listing.clone()
    }

    async fn load_model(&self, name: &str) -> Result<ModelHandle, ProviderError> {
        lock(&self.load_attempts).push(name.to_string());

        match &self.loadable {
            Some(names) if !names.iter().any(|n| n == name) => Err(ProviderError::Api {
                status: 404,
                message: format!("models/{} is not found", name),
            }),
            _ => Ok(ModelHandle::new(name)),
        }
    }

    async fn generate(
        &self,
        model: &ModelHandle,
        prompt: &Prompt,
    ) -> Result<String, ProviderError> {
        lock(&self.generations).push((model.name.clone(), prompt.to_string()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.reply.clone()
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if self.configured {
            Ok(())
        } else {
            Err(ProviderError::NotConfigured(
                "Mock text provider not configured".to_string(),
            ))
        }
    }
}
