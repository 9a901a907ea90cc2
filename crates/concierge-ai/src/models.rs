//! Model registry with public lookup API.

use crate::{Model, Provider};

struct ModelEntry {
    id: &'static str,
    name: &'static str,
    provider: Provider,
    context_window: u32,
    max_tokens: u32,
}

const MODEL_ENTRIES: &[ModelEntry] = &[
    ModelEntry {
        id: "gemma2-9b-it",
        name: "Gemma 2 9B",
        provider: Provider::Groq,
        context_window: 8192,
        max_tokens: 8192,
    },
    ModelEntry {
        id: "llama-3.1-8b-instant",
        name: "Llama 3.1 8B Instant",
        provider: Provider::Groq,
        context_window: 131072,
        max_tokens: 8192,
    },
    ModelEntry {
        id: "llama-3.3-70b-versatile",
        name: "Llama 3.3 70B Versatile",
        provider: Provider::Groq,
        context_window: 131072,
        max_tokens: 32768,
    },
    ModelEntry {
        id: "gpt-4o-mini",
        name: "GPT-4o mini",
        provider: Provider::OpenAI,
        context_window: 128000,
        max_tokens: 16384,
    },
    ModelEntry {
        id: "gpt-4o",
        name: "GPT-4o",
        provider: Provider::OpenAI,
        context_window: 128000,
        max_tokens: 16384,
    },
    ModelEntry {
        id: "meta-llama/llama-3.1-8b-instruct",
        name: "Llama 3.1 8B Instruct",
        provider: Provider::OpenRouter,
        context_window: 131072,
        max_tokens: 8192,
    },
    ModelEntry {
        id: "llama3.1",
        name: "Llama 3.1 (local)",
        provider: Provider::Ollama,
        context_window: 131072,
        max_tokens: 4096,
    },
];

/// Provider and model used when nothing is configured
pub const DEFAULT_PROVIDER: Provider = Provider::Groq;
pub const DEFAULT_MODEL_ID: &str = "gemma2-9b-it";

impl ModelEntry {
    fn to_model(&self) -> Model {
        Model {
            id: self.id.to_string(),
            name: self.name.to_string(),
            provider: self.provider,
            base_url: self.provider.default_base_url().to_string(),
            context_window: self.context_window,
            max_tokens: self.max_tokens,
            headers: Default::default(),
        }
    }
}

/// Look up a model by provider and ID.
pub fn get_model(provider: Provider, id: &str) -> Option<Model> {
    MODEL_ENTRIES
        .iter()
        .find(|e| e.id == id && e.provider == provider)
        .map(|e| e.to_model())
}

/// Get all models for a specific provider.
pub fn get_models(provider: Provider) -> Vec<Model> {
    MODEL_ENTRIES
        .iter()
        .filter(|e| e.provider == provider)
        .map(|e| e.to_model())
        .collect()
}

/// The first registered model for `provider`. `Custom` endpoints have none.
pub fn default_model_id(provider: Provider) -> Option<&'static str> {
    MODEL_ENTRIES
        .iter()
        .find(|e| e.provider == provider)
        .map(|e| e.id)
}

/// Resolve a model: registry first, otherwise a descriptor built from the
/// provider defaults. `base_url` overrides the endpoint either way.
pub fn resolve_model(provider: Provider, id: &str, base_url: Option<&str>) -> Model {
    let mut model = get_model(provider, id).unwrap_or_else(|| Model {
        id: id.to_string(),
        name: id.to_string(),
        provider,
        base_url: provider.default_base_url().to_string(),
        context_window: 8192,
        max_tokens: 4096,
        headers: Default::default(),
    });
    if let Some(url) = base_url {
        model.base_url = url.trim_end_matches('/').to_string();
    }
    model
}

/// The out-of-box model
pub fn default_model() -> Model {
    resolve_model(DEFAULT_PROVIDER, DEFAULT_MODEL_ID, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model_is_registered() {
        let model = default_model();
        assert_eq!(model.id, "gemma2-9b-it");
        assert_eq!(model.provider, Provider::Groq);
        assert_eq!(model.base_url, "https://api.groq.com/openai/v1");
    }

    #[test]
    fn test_get_model_respects_provider() {
        assert!(get_model(Provider::Groq, "gpt-4o").is_none());
        assert!(get_model(Provider::OpenAI, "gpt-4o").is_some());
    }

    #[test]
    fn test_get_models_filters() {
        let groq = get_models(Provider::Groq);
        assert!(!groq.is_empty());
        assert!(groq.iter().all(|m| m.provider == Provider::Groq));
    }

    #[test]
    fn test_default_model_follows_provider() {
        assert_eq!(default_model_id(Provider::Groq), Some(DEFAULT_MODEL_ID));
        assert_eq!(default_model_id(Provider::OpenAI), Some("gpt-4o-mini"));
        assert_eq!(default_model_id(Provider::Ollama), Some("llama3.1"));
        assert!(default_model_id(Provider::OpenRouter).is_some());
        assert_eq!(default_model_id(Provider::Custom), None);
    }

    #[test]
    fn test_resolve_unknown_model_uses_provider_defaults() {
        let model = resolve_model(Provider::OpenRouter, "acme/support-7b", None);
        assert_eq!(model.id, "acme/support-7b");
        assert_eq!(model.base_url, "https://openrouter.ai/api/v1");
    }

    #[test]
    fn test_resolve_base_url_override_trims_slash() {
        let model = resolve_model(Provider::Custom, "local", Some("http://10.0.0.5:8000/v1/"));
        assert_eq!(model.base_url, "http://10.0.0.5:8000/v1");
    }
}
