//! Block-based transformation pipeline
//!
//! # Architecture
//! - [`blocks`]: Delta / segment decomposition into addressable blocks
//! - [`classifier`]: topic -> archetype rule list
//! - [`directives`]: read-only directive table and prompt rendering
//! - [`dispatcher`]: bounded concurrent fan-out with per-unit failure isolation
//! - [`reassembler`]: outcome merge by block index under a failure policy
//! - [`placeholders`]: `{{IMG_SEARCH:...}}` marker resolution
//!
//! [`Pipeline`] ties these together into the three caller-facing flows:
//! - rewrite: document -> decompose -> dispatch (per TEXT block) -> reassemble
//! - generate: topic -> classify -> select -> single call -> resolve placeholders
//! - matrix: topic x platforms -> dispatch (per platform) -> platform map

pub mod blocks;
pub mod classifier;
pub mod directives;
pub mod dispatcher;
pub mod placeholders;
pub mod reassembler;

use crate::error::PipelineError;
use crate::types::{
    Archetype, GenerationOutcome, GenerationUnit, Platform, TextGenerator, UnitFailure, UnitId,
};
use blocks::{Delta, Document, TextSegment};
use directives::{DirectiveKey, DirectiveTable};
use dispatcher::{DispatchConfig, Dispatcher};
use placeholders::PlaceholderResolver;
use scribe_common::config::PipelineSettings;
use scribe_common::FailurePolicy;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Value stored for a platform whose generation failed
pub const MATRIX_FAILURE_MARKER: &str = "生成失败，请重试。";

/// Matrix entry for a failed platform
pub fn matrix_failure_text(detail: &str) -> String {
    format!("{} ({})", MATRIX_FAILURE_MARKER, detail)
}

/// Pipeline settings shared by all flows
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub dispatch: DispatchConfig,
    /// TEXT threshold for Delta documents
    pub min_block_chars: usize,
    /// Policy used when a rewrite request does not name one
    pub default_policy: FailurePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&PipelineSettings::default())
    }
}

impl From<&PipelineSettings> for PipelineConfig {
    fn from(settings: &PipelineSettings) -> Self {
        Self {
            dispatch: DispatchConfig {
                max_concurrency: settings.max_concurrency,
                unit_timeout: Duration::from_secs(settings.unit_timeout_secs),
            },
            min_block_chars: settings.min_block_chars,
            default_policy: settings.failure_policy,
        }
    }
}

/// Result of the generate flow
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedArticle {
    pub content: String,
    pub archetype: Archetype,
}

/// Rewrite counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RewriteStats {
    /// Blocks in the document
    pub blocks: usize,
    /// TEXT blocks sent to the backend
    pub submitted: usize,
    pub rewritten: usize,
    pub failed: usize,
}

/// Result of rewriting a Delta document
#[derive(Debug, Clone, PartialEq)]
pub struct RewrittenDocument {
    pub delta: Delta,
    pub stats: RewriteStats,
}

/// The transformation pipeline
///
/// Cheap to share: everything inside is immutable after construction.
pub struct Pipeline {
    directives: Arc<DirectiveTable>,
    generator: Arc<dyn TextGenerator>,
    articles: Dispatcher,
    rewrites: Dispatcher,
    placeholders: PlaceholderResolver,
    config: PipelineConfig,
}

impl Pipeline {
    /// Create pipeline
    ///
    /// # Arguments
    /// * `generator` - backend for generate and matrix
    /// * `rewriter` - backend for rewrites (may be the same instance)
    pub fn new(
        directives: Arc<DirectiveTable>,
        generator: Arc<dyn TextGenerator>,
        rewriter: Arc<dyn TextGenerator>,
        placeholders: PlaceholderResolver,
        config: PipelineConfig,
    ) -> Self {
        Self {
            directives,
            articles: Dispatcher::new(Arc::clone(&generator), config.dispatch),
            rewrites: Dispatcher::new(rewriter, config.dispatch),
            generator,
            placeholders,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Generate a full article for a topic
    ///
    /// # Errors
    /// - `EmptyInput` for a blank topic
    /// - `UnknownKey` if the archetype has no directive
    /// - `Generation` when the single backend call fails or times out
    pub async fn generate(&self, topic: &str) -> Result<GeneratedArticle, PipelineError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(PipelineError::EmptyInput("topic must not be blank".to_string()));
        }

        let archetype = classifier::classify(topic);
        let directive = self.directives.select(DirectiveKey::Archetype(archetype))?;
        info!(archetype = %archetype, backend = self.generator.name(), "Generating article");

        let prompt = directive.render(topic);
        let unit_timeout = self.config.dispatch.unit_timeout;
        let raw = match tokio::time::timeout(unit_timeout, self.generator.generate(&prompt)).await {
            Ok(result) => result?,
            Err(_) => return Err(UnitFailure::Timeout(unit_timeout).into()),
        };

        let content = self.placeholders.resolve(&raw).await;
        Ok(GeneratedArticle { content, archetype })
    }

    /// Rewrite caller-segmented text blocks
    ///
    /// Returns one segment per submitted segment, in input order. Whitespace-only
    /// segments are returned unchanged without a backend call.
    ///
    /// # Errors
    /// `InvalidInput` on duplicate indices, `EmptyDocument` when nothing is rewritable
    pub async fn rewrite(
        &self,
        segments: Vec<TextSegment>,
        policy: Option<FailurePolicy>,
    ) -> Result<Vec<TextSegment>, PipelineError> {
        let document = blocks::from_segments(segments, 0)?;
        let (document, _) = self.rewrite_blocks(document, policy).await?;

        Ok(document
            .blocks
            .into_iter()
            .map(|block| TextSegment {
                index: block.index,
                content: block.content,
            })
            .collect())
    }

    /// Rewrite a Delta document, keeping embeds, formatting and op order
    ///
    /// # Arguments
    /// * `min_chars` - TEXT threshold override (configured default otherwise)
    pub async fn rewrite_document(
        &self,
        delta: Delta,
        policy: Option<FailurePolicy>,
        min_chars: Option<usize>,
    ) -> Result<RewrittenDocument, PipelineError> {
        let min_chars = min_chars.unwrap_or(self.config.min_block_chars);
        let document = blocks::decompose(delta, min_chars)?;
        let (document, stats) = self.rewrite_blocks(document, policy).await?;

        Ok(RewrittenDocument {
            delta: document.into_delta(),
            stats,
        })
    }

    async fn rewrite_blocks(
        &self,
        document: Document,
        policy: Option<FailurePolicy>,
    ) -> Result<(Document, RewriteStats), PipelineError> {
        let policy = policy.unwrap_or(self.config.default_policy);
        let directive = self.directives.select(DirectiveKey::Rewrite)?;

        // Only the trimmed body goes out; surrounding whitespace (Quill line breaks)
        // is restored on the way back
        let edges: HashMap<usize, (String, String)> = document
            .text_blocks()
            .map(|block| {
                let (leading, trailing) = whitespace_edges(&block.content);
                (block.index, (leading.to_string(), trailing.to_string()))
            })
            .collect();

        let units: Vec<GenerationUnit> = document
            .text_blocks()
            .map(|block| {
                GenerationUnit::new(
                    UnitId::Index(block.index),
                    block.content.trim(),
                    Arc::clone(&directive),
                )
            })
            .collect();

        let mut stats = RewriteStats {
            blocks: document.len(),
            submitted: units.len(),
            ..RewriteStats::default()
        };

        let outcomes: Vec<GenerationOutcome> = self
            .rewrites
            .dispatch(units)
            .await?
            .into_iter()
            .map(|mut outcome| {
                if outcome.succeeded {
                    stats.rewritten += 1;
                    if let UnitId::Index(index) = outcome.id {
                        if let Some((leading, trailing)) = edges.get(&index) {
                            outcome.output = format!("{}{}{}", leading, outcome.output.trim(), trailing);
                        }
                    }
                } else {
                    stats.failed += 1;
                }
                outcome
            })
            .collect();

        if stats.failed > 0 {
            warn!(
                failed = stats.failed,
                submitted = stats.submitted,
                policy = ?policy,
                "Some blocks could not be rewritten"
            );
        }

        Ok((reassembler::reassemble(document, outcomes, policy), stats))
    }

    /// Generate one piece of copy per platform
    ///
    /// Every requested platform appears in the result; a failed platform carries
    /// [`matrix_failure_text`]. Duplicate platforms are generated once.
    ///
    /// # Errors
    /// - `EmptyInput` for a blank topic or no platforms
    /// - `UnknownKey` if any platform has no directive (checked before dispatch)
    pub async fn matrix(
        &self,
        topic: &str,
        platforms: &[Platform],
    ) -> Result<BTreeMap<Platform, String>, PipelineError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(PipelineError::EmptyInput("topic must not be blank".to_string()));
        }
        if platforms.is_empty() {
            return Err(PipelineError::EmptyInput("no platforms requested".to_string()));
        }

        let requested: BTreeSet<Platform> = platforms.iter().copied().collect();
        let units = requested
            .iter()
            .map(|&platform| {
                let directive = self.directives.select(DirectiveKey::Platform(platform))?;
                Ok(GenerationUnit::new(UnitId::Platform(platform), topic, directive))
            })
            .collect::<Result<Vec<_>, PipelineError>>()?;

        info!(platforms = units.len(), "Generating platform matrix");

        let mut results = BTreeMap::new();
        for outcome in self.articles.dispatch(units).await? {
            let UnitId::Platform(platform) = outcome.id else {
                continue;
            };
            let value = if outcome.succeeded {
                outcome.output
            } else {
                matrix_failure_text(outcome.failure_detail.as_deref().unwrap_or("unknown error"))
            };
            results.insert(platform, value);
        }

        Ok(results)
    }
}

/// Leading and trailing whitespace of `text`
fn whitespace_edges(text: &str) -> (&str, &str) {
    let trimmed_start = text.trim_start();
    let leading = &text[..text.len() - trimmed_start.len()];
    let trailing = &trimmed_start[trimmed_start.trim_end().len()..];
    (leading, trailing)
}
