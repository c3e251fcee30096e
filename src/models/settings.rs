use serde::{Deserialize, Serialize};

pub const DEFAULT_WORD_COUNT: u32 = 800;

/// Singleton settings row shared by the writing tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WritingSettings {
    pub auto_draft_enabled: bool,
    pub default_model: Option<String>,
    pub rules: String,
    pub auto_draft_rules: String,
    pub auto_draft_template: Option<String>,
    pub auto_draft_word_count: u32,
}

impl Default for WritingSettings {
    fn default() -> Self {
        Self {
            auto_draft_enabled: false,
            default_model: None,
            rules: String::new(),
            auto_draft_rules: String::new(),
            auto_draft_template: None,
            auto_draft_word_count: DEFAULT_WORD_COUNT,
        }
    }
}
