//! Topic intent classification
//!
//! Classification is an ordered rule list evaluated over normalized topic text.
//! The first matching rule wins, so a topic carrying both review and tutorial
//! vocabulary ("二手手机验机教程推荐") resolves to [`Archetype::Review`].

use crate::types::Archetype;

/// One classification rule: archetype chosen when any keyword occurs in the topic
#[derive(Debug, Clone, Copy)]
pub struct IntentRule {
    pub archetype: Archetype,
    pub keywords: &'static [&'static str],
}

impl IntentRule {
    /// `topic` must already be normalized
    fn matches(&self, topic: &str) -> bool {
        self.keywords.iter().any(|keyword| topic.contains(keyword))
    }
}

/// Rules in priority order. Keywords are lower-case.
pub const INTENT_RULES: &[IntentRule] = &[
    IntentRule {
        archetype: Archetype::Review,
        keywords: &["推荐", "排行", "值得买", "二手", "性价比", "review", "best ", " vs "],
    },
    IntentRule {
        archetype: Archetype::Tutorial,
        keywords: &["怎么", "如何", "步骤", "教程", "指南", "验机", "how to", "tutorial", "guide"],
    },
];

/// Archetype used when no rule matches
pub const FALLBACK_ARCHETYPE: Archetype = Archetype::General;

/// Normalize topic text for matching
fn normalize(topic: &str) -> String {
    topic.trim().to_lowercase()
}

/// Classify a topic. Pure and total.
pub fn classify(topic: &str) -> Archetype {
    let normalized = normalize(topic);
    INTENT_RULES
        .iter()
        .find(|rule| rule.matches(&normalized))
        .map(|rule| rule.archetype)
        .unwrap_or(FALLBACK_ARCHETYPE)
}
