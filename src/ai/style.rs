use async_trait::async_trait;

use crate::db::Repository;
use crate::error::Result;
use crate::models::DraftPost;

use super::prompt::StyleContext;

/// Source of the author's voice and the stored model default.
#[async_trait]
pub trait StyleContextProvider: Send + Sync {
    async fn style_context(&self) -> Result<StyleContext>;

    async fn default_model(&self) -> Result<Option<String>>;
}

#[async_trait]
impl StyleContextProvider for Repository {
    async fn style_context(&self) -> Result<StyleContext> {
        let settings = self.get_settings().await?;
        let published = self.get_published_posts().await?;

        Ok(StyleContext {
            rules: settings.rules,
            auto_draft_rules: settings.auto_draft_rules,
            style_examples: render_style_examples(&published),
            auto_draft_template: settings.auto_draft_template,
            word_count: settings.auto_draft_word_count,
        })
    }

    async fn default_model(&self) -> Result<Option<String>> {
        Ok(self.get_settings().await?.default_model)
    }
}

fn render_style_examples(posts: &[DraftPost]) -> String {
    posts
        .iter()
        .map(|p| match p.subtitle.as_deref().filter(|s| !s.is_empty()) {
            Some(subtitle) => format!("# {}\n*{}*\n\n{}", p.title, subtitle, p.markdown),
            None => format!("# {}\n\n{}", p.title, p.markdown),
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}
