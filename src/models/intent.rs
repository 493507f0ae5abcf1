use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on the compiled size of a single rule pattern.
///
/// The rule file is hand-edited content; the regex engine already runs in
/// linear time, so this cap is what bounds a pathological pattern.
pub const PATTERN_SIZE_LIMIT: usize = 256 * 1024;

/// 规则文件
///
/// On-disk shape: `{"intents": [{"tag": .., "patterns": [..], "responses": [..]}]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleFile {
    pub intents: Vec<IntentDefinition>,
}

/// 未编译的意图定义
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct IntentDefinition {
    /// 意图标签
    pub tag: String,
    /// 正则表达式模式
    pub patterns: Vec<String>,
    /// 候选回复
    pub responses: Vec<String>,
}

/// Structural problems with a single intent.
#[derive(Debug, Error)]
pub enum IntentError {
    #[error("intent has an empty tag")]
    EmptyTag,

    #[error("intent '{tag}' has no usable patterns")]
    NoPatterns { tag: String },

    #[error("intent '{tag}' has no responses")]
    NoResponses { tag: String },

    #[error("intent '{tag}' pattern '{pattern}' is invalid: {source}")]
    InvalidPattern {
        tag: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// 已编译的意图
///
/// Always holds at least one pattern and at least one response.
#[derive(Debug, Clone)]
pub struct Intent {
    tag: String,
    patterns: Vec<Regex>,
    responses: Vec<String>,
}

impl Intent {
    /// Build an intent from already compiled patterns.
    pub fn new(
        tag: impl Into<String>,
        patterns: Vec<Regex>,
        responses: Vec<String>,
    ) -> Result<Self, IntentError> {
        let tag = tag.into();
        if tag.trim().is_empty() {
            return Err(IntentError::EmptyTag);
        }
        if patterns.is_empty() {
            return Err(IntentError::NoPatterns { tag });
        }
        if responses.is_empty() {
            return Err(IntentError::NoResponses { tag });
        }
        Ok(Self {
            tag,
            patterns,
            responses,
        })
    }

    /// Compile a rule pattern for case-insensitive substring search.
    pub fn compile_pattern(tag: &str, pattern: &str) -> Result<Regex, IntentError> {
        RegexBuilder::new(pattern)
            .case_insensitive(true)
            .size_limit(PATTERN_SIZE_LIMIT)
            .build()
            .map_err(|source| IntentError::InvalidPattern {
                tag: tag.to_string(),
                pattern: pattern.to_string(),
                source,
            })
    }

    /// Compile every pattern of a definition, failing on the first bad one.
    pub fn from_definition(definition: IntentDefinition) -> Result<Self, IntentError> {
        let patterns = definition
            .patterns
            .iter()
            .map(|p| Self::compile_pattern(&definition.tag, p))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(definition.tag, patterns, definition.responses)
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn patterns(&self) -> &[Regex] {
        &self.patterns
    }

    pub fn responses(&self) -> &[String] {
        &self.responses
    }

    /// 第一条回复
    pub fn first_response(&self) -> &str {
        &self.responses[0]
    }

    /// True when any pattern occurs anywhere in the utterance.
    pub fn matches(&self, utterance: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(utterance))
    }
}

/// 意图目录
///
/// Order is match priority: the first intent that matches wins.
#[derive(Debug, Clone, Default)]
pub struct IntentCatalog {
    intents: Vec<Intent>,
}

impl IntentCatalog {
    pub fn new(intents: Vec<Intent>) -> Self {
        Self { intents }
    }

    /// 空目录
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Intent> {
        self.intents.iter()
    }

    /// 按标签查找
    pub fn get(&self, tag: &str) -> Option<&Intent> {
        self.intents.iter().find(|i| i.tag == tag)
    }

    pub fn tags(&self) -> Vec<&str> {
        self.intents.iter().map(Intent::tag).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(tag: &str, patterns: &[&str], responses: &[&str]) -> IntentDefinition {
        IntentDefinition {
            tag: tag.to_string(),
            patterns: patterns.iter().map(|s| s.to_string()).collect(),
            responses: responses.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_intent_matches_substring_case_insensitively() {
        let intent =
            Intent::from_definition(definition("greeting", &["hello", "hi there"], &["Hey!"]))
                .unwrap();

        assert!(intent.matches("well HELLO friend"));
        assert!(intent.matches("Hi There"));
        assert!(!intent.matches("goodbye"));
        assert_eq!(intent.first_response(), "Hey!");
    }

    #[test]
    fn test_intent_requires_patterns_and_responses() {
        let err = Intent::from_definition(definition("empty", &[], &["x"])).unwrap_err();
        assert!(matches!(err, IntentError::NoPatterns { .. }));

        let err = Intent::from_definition(definition("mute", &["x"], &[])).unwrap_err();
        assert!(matches!(err, IntentError::NoResponses { .. }));

        let err = Intent::from_definition(definition("  ", &["x"], &["y"])).unwrap_err();
        assert!(matches!(err, IntentError::EmptyTag));
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let err = Intent::compile_pattern("broken", "(unclosed").unwrap_err();
        assert!(matches!(err, IntentError::InvalidPattern { .. }));
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_shorthand_classes_keep_their_case() {
        // \S must stay "non-whitespace" rather than being folded into \s.
        let pattern = Intent::compile_pattern("code", r"\S+\(\)").unwrap();
        assert!(pattern.is_match("call Foo()"));
    }

    #[test]
    fn test_catalog_lookup_preserves_order() {
        let catalog = IntentCatalog::new(vec![
            Intent::from_definition(definition("a", &["x"], &["1"])).unwrap(),
            Intent::from_definition(definition("b", &["y"], &["2"])).unwrap(),
        ]);

        assert_eq!(catalog.tags(), vec!["a", "b"]);
        assert_eq!(catalog.get("b").map(Intent::first_response), Some("2"));
        assert!(catalog.get("c").is_none());
        assert!(IntentCatalog::empty().is_empty());
    }

    #[test]
    fn test_rule_file_parses() {
        let raw = r#"{"intents":[{"tag":"greeting","patterns":["hi"],"responses":["Hello [name]!"]}]}"#;
        let file: RuleFile = serde_json::from_str(raw).unwrap();
        assert_eq!(file.intents.len(), 1);
        assert_eq!(file.intents[0].responses[0], "Hello [name]!");
    }
}
