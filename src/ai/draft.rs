use std::sync::Arc;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::FeedArticle;

use super::models::resolve_model;
use super::parse::parse_generated_content;
use super::prompt::build_news_essay_prompt;
use super::provider::TextGenerator;
use super::style::StyleContextProvider;

const USER_PROMPT: &str = "Write the essay now.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedDraft {
    pub title: String,
    pub subtitle: Option<String>,
    pub body: String,
}

/// Turns one news article into an essay draft in the author's voice.
pub struct DraftGenerator {
    llm: Arc<dyn TextGenerator>,
    style: Arc<dyn StyleContextProvider>,
    model_override: Option<String>,
    max_tokens: u32,
    timeout: Duration,
}

impl DraftGenerator {
    pub fn new(
        llm: Arc<dyn TextGenerator>,
        style: Arc<dyn StyleContextProvider>,
        max_tokens: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            llm,
            style,
            model_override: None,
            max_tokens,
            timeout,
        }
    }

    pub fn with_model_override(mut self, model: Option<String>) -> Self {
        self.model_override = model;
        self
    }

    pub async fn generate(
        &self,
        article: &FeedArticle,
        topic_name: &str,
        essay_focus: Option<&str>,
    ) -> Result<GeneratedDraft> {
        let stored_default = match self.model_override {
            Some(_) => None,
            None => self.style.default_model().await?,
        };
        let model = resolve_model(self.model_override.as_deref(), stored_default.as_deref())?;

        let context = self.style.style_context().await?;
        let prompt = build_news_essay_prompt(article, topic_name, &context, essay_focus);

        tracing::debug!("Generating draft for {} with {}", article.url, model.id);

        let generation = tokio::time::timeout(
            self.timeout,
            self.llm.generate(model, &prompt, USER_PROMPT, self.max_tokens),
        )
        .await
        .map_err(|_| AppError::Timeout {
            what: format!("generation for {}", article.url),
            seconds: self.timeout.as_secs(),
        })??;

        tracing::debug!(
            "Generated {} chars for {} (tokens in {:?}, out {:?})",
            generation.text.len(),
            article.url,
            generation.input_tokens,
            generation.output_tokens
        );

        let (title, subtitle, body) = parse_generated_content(&generation.text);

        if body.is_empty() {
            return Err(AppError::Generation(format!(
                "empty essay body for {}",
                article.url
            )));
        }

        Ok(GeneratedDraft {
            title: if title.is_empty() {
                article.title.clone()
            } else {
                title
            },
            subtitle: (!subtitle.is_empty()).then_some(subtitle),
            body,
        })
    }
}
