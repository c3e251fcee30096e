use crate::models::FeedArticle;

pub const DEFAULT_AUTO_DRAFT_TEMPLATE: &str = r#"You are a writing assistant that writes thought-provoking essays inspired by current news.

## Auto-Draft Rules (Follow these for news-inspired essays)
{{AUTO_DRAFT_RULES}}

## Topic-Specific Focus
{{ESSAY_FOCUS}}

## General Writing Rules
{{RULES}}

## Style Reference (Write in this voice)
{{STYLE_EXAMPLES}}

---

Write an essay of approximately {{AUTO_DRAFT_WORD_COUNT}} words inspired by this news article. Offer an original perspective and personal insights - don't just summarize the news.

TOPIC: {{TOPIC_NAME}}
ARTICLE TITLE: {{ARTICLE_TITLE}}
ARTICLE SUMMARY: {{ARTICLE_SUMMARY}}
SOURCE: {{ARTICLE_URL}}

Output ONLY markdown. No preamble, no "Here is...", no explanations. Start with a compelling title using markdown # heading."#;

const NO_RULES: &str = "No specific rules provided. Match the style of the examples.";
const NO_AUTO_DRAFT_RULES: &str =
    "Write original perspectives on news. Be thought-provoking. Avoid summarizing.";
const NO_STYLE_EXAMPLES: &str =
    "No published essays available. Write in a clear, personal essay style.";
const NO_FOCUS: &str =
    "No specific focus provided. Write with a general perspective on this topic.";
const NO_SUMMARY: &str = "No summary available";

/// Voice and rules drawn from settings and previously published posts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleContext {
    pub rules: String,
    pub auto_draft_rules: String,
    pub style_examples: String,
    pub auto_draft_template: Option<String>,
    pub word_count: u32,
}

pub fn build_news_essay_prompt(
    article: &FeedArticle,
    topic_name: &str,
    context: &StyleContext,
    essay_focus: Option<&str>,
) -> String {
    let template = context
        .auto_draft_template
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(DEFAULT_AUTO_DRAFT_TEMPLATE);

    // Article fields go last so their text is never re-expanded.
    template
        .replace("{{AUTO_DRAFT_RULES}}", or_default(&context.auto_draft_rules, NO_AUTO_DRAFT_RULES))
        .replace("{{AUTO_DRAFT_WORD_COUNT}}", &context.word_count.to_string())
        .replace("{{ESSAY_FOCUS}}", or_default(essay_focus.unwrap_or_default(), NO_FOCUS))
        .replace("{{RULES}}", or_default(&context.rules, NO_RULES))
        .replace("{{STYLE_EXAMPLES}}", or_default(&context.style_examples, NO_STYLE_EXAMPLES))
        .replace("{{TOPIC_NAME}}", topic_name)
        .replace("{{ARTICLE_TITLE}}", &article.title)
        .replace(
            "{{ARTICLE_SUMMARY}}",
            or_default(article.summary.as_deref().unwrap_or_default(), NO_SUMMARY),
        )
        .replace("{{ARTICLE_URL}}", &article.url)
}

fn or_default<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}
