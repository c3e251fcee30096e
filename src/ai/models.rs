use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    OpenAi,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    /// Stable id stored in settings and config.
    pub id: &'static str,
    pub name: &'static str,
    pub provider: Provider,
    /// Model name sent to the provider API.
    pub api_model: &'static str,
}

pub const MODELS: &[ModelDescriptor] = &[
    ModelDescriptor {
        id: "claude-sonnet",
        name: "Claude Sonnet 4",
        provider: Provider::Anthropic,
        api_model: "claude-sonnet-4-20250514",
    },
    ModelDescriptor {
        id: "claude-opus",
        name: "Claude Opus 4",
        provider: Provider::Anthropic,
        api_model: "claude-opus-4-20250514",
    },
    ModelDescriptor {
        id: "gpt-4o",
        name: "GPT-4o",
        provider: Provider::OpenAi,
        api_model: "gpt-4o",
    },
    ModelDescriptor {
        id: "gpt-4o-mini",
        name: "GPT-4o Mini",
        provider: Provider::OpenAi,
        api_model: "gpt-4o-mini",
    },
];

pub fn find_model(id: &str) -> Option<&'static ModelDescriptor> {
    MODELS.iter().find(|m| m.id == id)
}

/// Picks the explicit model if given, else the stored default. Fails when
/// neither is set or the chosen id is not in the catalog.
pub fn resolve_model(
    explicit: Option<&str>,
    stored_default: Option<&str>,
) -> Result<&'static ModelDescriptor> {
    let id = explicit
        .filter(|id| !id.trim().is_empty())
        .or(stored_default.filter(|id| !id.trim().is_empty()))
        .ok_or_else(|| {
            AppError::ModelResolution("no model override and no default model stored".into())
        })?;

    find_model(id.trim())
        .ok_or_else(|| AppError::ModelResolution(format!("unknown model '{}'", id)))
}
