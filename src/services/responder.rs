//! 回复选择
//!
//! Each tag has a fixed selection policy. Factual topics always answer with the
//! first listed response so repeated questions get the same canned answer;
//! small-talk tags pick at random for variety. Tags not in the table answer with
//! the first response.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::models::intent::Intent;

/// How a response is picked from an intent's list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Always the first response.
    First,
    /// Uniformly random response.
    Random,
}

/// Every explicitly classified tag with its policy.
pub const SELECTION_TABLE: &[(&str, SelectionPolicy)] = &[
    ("coding_tips", SelectionPolicy::First),
    ("junior_developer", SelectionPolicy::First),
    ("ai", SelectionPolicy::First),
    ("development", SelectionPolicy::First),
    ("programming_languages", SelectionPolicy::First),
    ("greeting", SelectionPolicy::Random),
    ("how_are_you", SelectionPolicy::Random),
    ("user_name", SelectionPolicy::Random),
];

/// Policy for a tag; unclassified tags get [`SelectionPolicy::First`].
pub fn policy_for(tag: &str) -> SelectionPolicy {
    SELECTION_TABLE
        .iter()
        .find(|(t, _)| *t == tag)
        .map(|(_, policy)| *policy)
        .unwrap_or(SelectionPolicy::First)
}

/// Pick the response for a matched intent.
pub fn select_response<'a, R: Rng + ?Sized>(intent: &'a Intent, rng: &mut R) -> &'a str {
    match policy_for(intent.tag()) {
        SelectionPolicy::First => intent.first_response(),
        SelectionPolicy::Random => intent
            .responses()
            .choose(rng)
            .map(String::as_str)
            .unwrap_or_else(|| intent.first_response()),
    }
}
