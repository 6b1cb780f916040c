//! Result reassembly
//!
//! Merges dispatcher outcomes back into the original document by block index.
//! Block count and order never change; only the content of TEXT blocks with a
//! matching outcome can.

use super::blocks::Document;
use crate::types::{GenerationOutcome, UnitId};
use scribe_common::FailurePolicy;
use std::collections::HashMap;
use tracing::debug;

/// Visible marker for a block whose rewrite failed
pub fn failure_annotation(detail: &str, original: &str) -> String {
    format!("[rewrite failed: {}] {}", detail, original)
}

/// Merge outcomes into `original`
///
/// - Succeeded: the TEXT block with that index takes the generated output
/// - Failed: `Retain` keeps the original, `Annotate` replaces it with
///   [`failure_annotation`]
/// - OPAQUE blocks, blocks without an outcome, and outcomes without a block
///   (or with a platform id) are left alone
pub fn reassemble(
    original: Document,
    outcomes: Vec<GenerationOutcome>,
    policy: FailurePolicy,
) -> Document {
    let mut by_index: HashMap<usize, GenerationOutcome> = HashMap::with_capacity(outcomes.len());
    for outcome in outcomes {
        match outcome.id {
            UnitId::Index(index) => {
                by_index.insert(index, outcome);
            }
            UnitId::Platform(platform) => {
                debug!(platform = %platform, "Ignoring platform outcome during reassembly");
            }
        }
    }

    let blocks = original
        .blocks
        .into_iter()
        .map(|mut block| {
            if !block.is_text() {
                return block;
            }
            if let Some(outcome) = by_index.remove(&block.index) {
                if outcome.succeeded {
                    block.content = outcome.output;
                } else if policy == FailurePolicy::Annotate {
                    let detail = outcome.failure_detail.as_deref().unwrap_or("unknown error");
                    block.content = failure_annotation(detail, &block.content);
                }
            }
            block
        })
        .collect();

    if !by_index.is_empty() {
        debug!(
            unmatched = by_index.len(),
            "Outcomes without a matching text block were dropped"
        );
    }

    Document::new(blocks)
}
