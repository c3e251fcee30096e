mod draft;
mod models;
mod parse;
mod prompt;
mod provider;
mod style;

pub use draft::DraftGenerator;
pub use models::{find_model, MODELS};
pub use provider::LlmClient;

#[cfg(test)]
pub(crate) use draft::tests as test_support;
