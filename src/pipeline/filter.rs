use crate::models::FeedArticle;

/// Keeps articles whose title or summary mentions any keyword,
/// case-insensitively. Disabled filtering and an empty keyword list both
/// pass everything through.
pub fn filter_by_keywords(
    articles: Vec<FeedArticle>,
    keywords: &[String],
    enabled: bool,
) -> Vec<FeedArticle> {
    if !enabled || keywords.is_empty() {
        return articles;
    }

    let keywords: Vec<String> = keywords.iter().map(|k| k.trim().to_lowercase()).collect();

    articles
        .into_iter()
        .filter(|article| {
            let haystack = format!(
                "{} {}",
                article.title,
                article.summary.as_deref().unwrap_or_default()
            )
            .to_lowercase();
            keywords.iter().any(|k| haystack.contains(k.as_str()))
        })
        .collect()
}
