//! 姓名提取
//!
//! Heuristic: the word right after a self-introduction phrase is taken as the
//! visitor's name. "I am fine" yields "fine"; that is accepted.

use once_cell::sync::Lazy;
use regex::Regex;

static INTRODUCTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:my name is|i am|i'm|called|call me)\s+(\w+)")
        .expect("introduction pattern is valid")
});

/// Extract a candidate name from the leftmost self-introduction phrase.
pub fn extract_name(utterance: &str) -> Option<String> {
    INTRODUCTION
        .captures(utterance)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
