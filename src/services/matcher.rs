//! 意图匹配
//!
//! Linear scan of the catalog: intents in catalog order, patterns in intent
//! order, substring search. The first intent with a hit wins.

use crate::models::intent::{Intent, IntentCatalog};

/// Find the intent an utterance triggers, if any.
pub fn match_intent<'a>(catalog: &'a IntentCatalog, utterance: &str) -> Option<&'a Intent> {
    catalog.iter().find(|intent| intent.matches(utterance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::intent::IntentDefinition;

    fn catalog(entries: &[(&str, &[&str])]) -> IntentCatalog {
        IntentCatalog::new(
            entries
                .iter()
                .map(|(tag, patterns)| {
                    Intent::from_definition(IntentDefinition {
                        tag: tag.to_string(),
                        patterns: patterns.iter().map(|p| p.to_string()).collect(),
                        responses: vec![format!("{tag} response")],
                    })
                    .unwrap()
                })
                .collect(),
        )
    }

    #[test]
    fn test_empty_catalog_never_matches() {
        assert!(match_intent(&IntentCatalog::empty(), "hello").is_none());
    }

    #[test]
    fn test_first_intent_in_catalog_order_wins() {
        let catalog = catalog(&[
            ("greeting", &["hello"]),
            ("hello_world", &["hello world"]),
        ]);
        let intent = match_intent(&catalog, "hello world program").unwrap();
        assert_eq!(intent.tag(), "greeting");
    }

    #[test]
    fn test_later_pattern_of_intent_can_match() {
        let catalog = catalog(&[("ai", &["machine learning", r"\bai\b"])]);
        assert_eq!(
            match_intent(&catalog, "Tell me about AI please").map(Intent::tag),
            Some("ai")
        );
    }

    #[test]
    fn test_match_is_substring_not_full() {
        let catalog = catalog(&[("python", &["python"])]);
        assert!(match_intent(&catalog, "is PYTHON good for beginners?").is_some());
    }

    #[test]
    fn test_no_match() {
        let catalog = catalog(&[("greeting", &["hello"]), ("bye", &["goodbye"])]);
        assert!(match_intent(&catalog, "what is rust?").is_none());
    }
}
