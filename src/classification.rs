use serde::{Deserialize, Serialize};
use std::fmt;

/// A single label produced by the classifier for one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: String,
    pub confidence: f32,
}

impl Classification {
    pub fn new<S: Into<String>>(label: S, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Classifications for every frame of one capture, in frame order
pub type ClassificationBatch = Vec<Vec<Classification>>;

/// Threshold rule: a classification matches when its label equals `label`
/// exactly and its confidence is at least `min_confidence`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRule {
    pub label: String,
    pub min_confidence: f32,
}

impl ClassificationRule {
    pub fn new<S: Into<String>>(label: S, min_confidence: f32) -> Self {
        Self {
            label: label.into(),
            min_confidence,
        }
    }

    pub fn matches(&self, classification: &Classification) -> bool {
        classification.label == self.label
            && classification.confidence >= self.min_confidence
    }
}

/// Semantic summary of one classification batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Detection {
    #[default]
    None,
    Cat,
    Dog,
}

impl fmt::Display for Detection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Detection::None => write!(f, "none"),
            Detection::Cat => write!(f, "cat"),
            Detection::Dog => write!(f, "dog"),
        }
    }
}

fn batch_matches(batch: &[Vec<Classification>], rules: &[ClassificationRule]) -> bool {
    rules.iter().any(|rule| {
        batch
            .iter()
            .any(|frame| frame.iter().any(|classification| rule.matches(classification)))
    })
}

/// Reduce a batch to a single detection.
///
/// Unlock rules are evaluated before lock rules, so a batch that satisfies both
/// (a classifier reporting dog and cat in the same frame) yields `Detection::Dog`.
pub fn to_detection(
    batch: &[Vec<Classification>],
    unlock_rules: &[ClassificationRule],
    lock_rules: &[ClassificationRule],
) -> Detection {
    if batch_matches(batch, unlock_rules) {
        Detection::Dog
    } else if batch_matches(batch, lock_rules) {
        Detection::Cat
    } else {
        Detection::None
    }
}
