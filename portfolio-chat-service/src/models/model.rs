//! Model identifiers as seen by the resolver.

/// Resource prefix the Gemini API puts in front of model names.
const MODEL_RESOURCE_PREFIX: &str = "models/";

/// Strip the `models/` resource prefix, if present.
pub fn normalize_model_name(name: &str) -> &str {
    let name = name.trim();
    name.strip_prefix(MODEL_RESOURCE_PREFIX).unwrap_or(name)
}

/// A model the credential can see, as reported by the provider's listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCandidate {
    pub name: String,
    pub supports_generation: bool,
}

impl ModelCandidate {
    pub fn new(name: &str, supports_generation: bool) -> Self {
        Self {
            name: normalize_model_name(name).to_string(),
            supports_generation,
        }
    }
}

/// A model that was successfully instantiated and can be asked to generate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelHandle {
    pub name: String,
    pub display_name: Option<String>,
}

impl ModelHandle {
    pub fn new(name: &str) -> Self {
        Self {
            name: normalize_model_name(name).to_string(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }
}
