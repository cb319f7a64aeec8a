use crate::utils::error::{Result, RouterError};
use regex::Regex;

/// Lower-cased text used only for keyword membership tests.
///
/// Punctuation and whitespace are kept as-is; there is no stemming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText(String);

impl NormalizedText {
    pub fn new(raw: &str) -> Self {
        Self(raw.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.0.contains(keyword)
    }

    pub fn contains_any<S: AsRef<str>>(&self, keywords: &[S]) -> bool {
        keywords.iter().any(|k| self.0.contains(k.as_ref()))
    }

    pub fn contains_all<S: AsRef<str>>(&self, keywords: &[S]) -> bool {
        keywords.iter().all(|k| self.0.contains(k.as_ref()))
    }

    pub fn contains_word(&self, pattern: &WordPattern) -> bool {
        pattern.regex.is_match(&self.0)
    }
}

/// Whole-word matcher for short, ambiguous tokens such as "tia".
///
/// A word boundary here is start/end of text, whitespace or one of `, ; . -`.
#[derive(Debug, Clone)]
pub struct WordPattern {
    word: String,
    regex: Regex,
}

impl WordPattern {
    pub fn new(word: &str) -> Result<Self> {
        let word = word.to_lowercase();
        let pattern = format!(r"(?:^|[\s,;.\-]){}(?:[\s,;.\-]|$)", regex::escape(&word));
        let regex = Regex::new(&pattern).map_err(|e| RouterError::RuleTableError {
            message: format!("invalid word pattern '{}': {}", word, e),
        })?;
        Ok(Self { word, regex })
    }

    pub fn word(&self) -> &str {
        &self.word
    }
}
