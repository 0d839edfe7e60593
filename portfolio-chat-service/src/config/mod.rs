use crate::models::PromptStyle;
use crate::services::providers::gemini::GEMINI_API_BASE;
use crate::services::resolver::{DEFAULT_FALLBACK_MODELS, DEFAULT_PREFERRED_FAMILY};
use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MODEL_CACHE_TTL_SECS: u64 = 300;
/// Zero disables the question length limit.
const DEFAULT_MAX_QUESTION_CHARS: usize = 0;

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub common: core_config::Config,
    pub google: GoogleConfig,
    pub models: ModelConfig,
    pub portfolio: PortfolioConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// `None` when unset or blank; chat requests then fail with 500.
    pub api_key: Option<Secret<String>>,
    pub api_base: String,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Tried in order after the model picked from the live listing.
    pub fallback_models: Vec<String>,
    pub preferred_family: String,
    /// How long a resolved model is reused. Zero re-resolves per request.
    pub cache_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct PortfolioConfig {
    /// Replaces the built-in context text when set.
    pub context_file: Option<PathBuf>,
    pub prompt_style: PromptStyle,
    /// Zero means no limit.
    pub max_question_chars: usize,
    pub static_dir: PathBuf,
    /// Empty means any origin.
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            common: core_config::Config::default(),
            google: GoogleConfig {
                api_key: None,
                api_base: GEMINI_API_BASE.to_string(),
                request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            },
            models: ModelConfig {
                fallback_models: DEFAULT_FALLBACK_MODELS.iter().map(|m| m.to_string()).collect(),
                preferred_family: DEFAULT_PREFERRED_FAMILY.to_string(),
                cache_ttl: Duration::from_secs(DEFAULT_MODEL_CACHE_TTL_SECS),
            },
            portfolio: PortfolioConfig {
                context_file: None,
                prompt_style: PromptStyle::Guided,
                max_question_chars: DEFAULT_MAX_QUESTION_CHARS,
                static_dir: PathBuf::from("static"),
                allowed_origins: Vec::new(),
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                otlp_endpoint: None,
            },
        }
    }
}

impl ChatConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        Self::from_lookup(common_config, |key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader::new(lookup);

        let api_key = env
            .optional("GEMINI_API_KEY")
            .or_else(|| env.optional("GOOGLE_API_KEY"))
            .map(Secret::new);

        Ok(ChatConfig {
            common,
            google: GoogleConfig {
                api_key,
                api_base: env.get("GEMINI_API_BASE", Some(GEMINI_API_BASE))?,
                request_timeout: Duration::from_secs(
                    env.parse("GEMINI_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
                ),
            },
            models: ModelConfig {
                fallback_models: split_list(
                    &env.get("GEMINI_FALLBACK_MODELS", Some(DEFAULT_FALLBACK_MODELS.join(",").as_str()))?,
                ),
                preferred_family: env
                    .get("GEMINI_PREFERRED_FAMILY", Some(DEFAULT_PREFERRED_FAMILY))?,
                cache_ttl: Duration::from_secs(
                    env.parse("GEMINI_MODEL_CACHE_TTL_SECS", DEFAULT_MODEL_CACHE_TTL_SECS)?,
                ),
            },
            portfolio: PortfolioConfig {
                context_file: env.optional("PORTFOLIO_CONTEXT_FILE").map(PathBuf::from),
                prompt_style: env.parse("PORTFOLIO_PROMPT_STYLE", PromptStyle::Guided)?,
                max_question_chars: env
                    .parse("PORTFOLIO_MAX_QUESTION_CHARS", DEFAULT_MAX_QUESTION_CHARS)?,
                static_dir: PathBuf::from(env.get("PORTFOLIO_STATIC_DIR", Some("static"))?),
                allowed_origins: env
                    .optional("PORTFOLIO_ALLOWED_ORIGINS")
                    .map(|v| split_list(&v))
                    .unwrap_or_default(),
            },
            observability: ObservabilityConfig {
                log_level: env.get("LOG_LEVEL", Some("info"))?,
                otlp_endpoint: env.optional("OTLP_ENDPOINT"),
            },
        })
    }
}

/// Comma separated list, trimmed, blanks dropped.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

struct EnvReader<F> {
    lookup: F,
    is_prod: bool,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn new(lookup: F) -> Self {
        let is_prod = lookup("ENVIRONMENT").as_deref() == Some("prod");
        Self { lookup, is_prod }
    }

    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    fn get(&self, key: &str, default: Option<&str>) -> Result<String, AppError> {
        match self.optional(key) {
            Some(val) => Ok(val),
            None => {
                if self.is_prod {
                    Err(AppError::ConfigError(anyhow::anyhow!(
                        "{} is required in production but not set",
                        key
                    )))
                } else if let Some(def) = default {
                    Ok(def.to_string())
                } else {
                    Err(AppError::ConfigError(anyhow::anyhow!(
                        "{} is required but not set",
                        key
                    )))
                }
            }
        }
    }

    fn parse<T>(&self, key: &str, default: T) -> Result<T, AppError>
    where
        T: FromStr + ToString,
        T::Err: std::fmt::Display,
    {
        let raw = self.get(key, Some(default.to_string().as_str()))?;
        raw.trim().parse().map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e))
        })
    }
}
