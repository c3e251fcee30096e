use std::sync::OnceLock;

use regex::Regex;

static ITALIC_LINE: OnceLock<Regex> = OnceLock::new();

/// Splits generated markdown into `(title, subtitle, body)`.
///
/// A leading `# ` heading is the title. The first non-empty line after it is
/// the subtitle when it is entirely `*italic*` or `_italic_`. Everything else
/// is body. Missing parts come back empty.
pub fn parse_generated_content(markdown: &str) -> (String, String, String) {
    let italic = ITALIC_LINE.get_or_init(|| {
        Regex::new(r"^(?:\*(.+)\*|_(.+)_)$").expect("italic pattern is valid")
    });

    let lines: Vec<&str> = markdown.trim().lines().collect();
    let mut title = String::new();
    let mut subtitle = String::new();
    let mut body_start = 0;

    if let Some(heading) = lines.first().and_then(|l| l.strip_prefix("# ")) {
        title = heading.trim().to_string();
        body_start = 1;
    }

    if let Some((offset, line)) = lines[body_start..]
        .iter()
        .enumerate()
        .find(|(_, l)| !l.trim().is_empty())
    {
        if let Some(caps) = italic.captures(line.trim()) {
            if let Some(text) = caps.get(1).or_else(|| caps.get(2)) {
                subtitle = text.as_str().trim().to_string();
                body_start += offset + 1;
            }
        }
    }

    while body_start < lines.len() && lines[body_start].trim().is_empty() {
        body_start += 1;
    }

    let body = lines[body_start..].join("\n").trim().to_string();

    (title, subtitle, body)
}
