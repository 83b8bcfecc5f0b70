//! Prompt construction and reply cleanup
//!
//! The generation backends take one raw prompt string with no separate
//! system/user roles, so the persona preamble is inlined ahead of the
//! user's line.

use std::sync::LazyLock;

use regex::Regex;

/// Default persona preamble
pub const DEFAULT_PREAMBLE: &str = "You are Julia, User's sarcastic but caring offline assistant. \
     Keep replies under 60 words, inject dry humor, disagree politely. \
     Give always short replies, never give long replies";

/// Chat template markers such as `<|eot_id|>` or `<|im_end|>`
static SPECIAL_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<\|[^>]+\|>").expect("special token pattern is valid"));

/// Builds prompts for the language model and cleans what comes back
#[derive(Debug, Clone)]
pub struct ResponseFormatter {
    preamble: String,
}

impl Default for ResponseFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_PREAMBLE)
    }
}

impl ResponseFormatter {
    /// Create a formatter with the given persona preamble
    #[must_use]
    pub fn new(preamble: impl Into<String>) -> Self {
        Self {
            preamble: preamble.into(),
        }
    }

    /// The persona preamble placed ahead of every prompt
    #[must_use]
    pub fn preamble(&self) -> &str {
        &self.preamble
    }

    /// Build the single-string prompt for one user utterance
    #[must_use]
    pub fn format_prompt(&self, input: &str) -> String {
        format!("{}\n\nUser: {input}\nAssistant:", self.preamble)
    }

    /// Strip special-token markers and surrounding whitespace
    #[must_use]
    pub fn clean(&self, raw: &str) -> String {
        SPECIAL_TOKEN.replace_all(raw, "").trim().to_string()
    }
}
