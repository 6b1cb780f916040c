//! Core Types and Trait Definitions for scribe-gen
//!
//! Defines the units of work that flow through the pipeline and the two backend
//! seams the pipeline is written against:
//! - [`TextGenerator`]: directive + input → generated text
//! - [`MediaLookup`]: keyword → optional media URL
//!
//! # Architecture
//! - Rewrite: Document → decompose → dispatch per TEXT block → reassemble
//! - Generate: Topic → classify → select directive → generate → resolve placeholders
//! - Matrix: Topic × Platforms → dispatch per platform

use crate::pipeline::directives::Directive;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Classification keys
// ============================================================================

/// Article archetype selected from a topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Archetype {
    /// Review / recommendation article with product cards and a summary table
    Review,
    /// Step-by-step tutorial
    Tutorial,
    /// Explanatory article
    General,
}

impl Archetype {
    pub const ALL: [Archetype; 3] = [Archetype::Review, Archetype::Tutorial, Archetype::General];

    /// Key used in the directive table
    pub fn as_str(&self) -> &'static str {
        match self {
            Archetype::Review => "review",
            Archetype::Tutorial => "tutorial",
            Archetype::General => "general",
        }
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Publishing platform targeted by matrix generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Xiaohongshu (RED) note
    Xhs,
    /// Douyin short-video script
    Douyin,
    /// WeChat official account article
    Wechat,
    /// LinkedIn post
    Linkedin,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Xhs,
        Platform::Douyin,
        Platform::Wechat,
        Platform::Linkedin,
    ];

    /// Wire identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Xhs => "xhs",
            Platform::Douyin => "douyin",
            Platform::Wechat => "wechat",
            Platform::Linkedin => "linkedin",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized platform identifier
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown platform: {0}")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| UnknownPlatform(s.to_string()))
    }
}

// ============================================================================
// Units of work
// ============================================================================

/// Identity of a generation unit: a block index or a platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UnitId {
    Index(usize),
    Platform(Platform),
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitId::Index(index) => write!(f, "block {}", index),
            UnitId::Platform(platform) => write!(f, "platform {}", platform),
        }
    }
}

/// One unit of work submitted to the dispatcher
#[derive(Debug, Clone)]
pub struct GenerationUnit {
    pub id: UnitId,
    /// Topic or block content
    pub input: String,
    pub directive: Arc<Directive>,
}

impl GenerationUnit {
    pub fn new(id: UnitId, input: impl Into<String>, directive: Arc<Directive>) -> Self {
        Self {
            id,
            input: input.into(),
            directive,
        }
    }
}

/// Result of one unit of work
///
/// Failures are data: a failed unit carries a human-readable `failure_detail`
/// instead of aborting its batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationOutcome {
    pub id: UnitId,
    pub succeeded: bool,
    /// Generated text (empty on failure)
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_detail: Option<String>,
}

impl GenerationOutcome {
    pub fn success(id: UnitId, output: String) -> Self {
        Self {
            id,
            succeeded: true,
            output,
            failure_detail: None,
        }
    }

    pub fn failure(id: UnitId, failure: &UnitFailure) -> Self {
        Self {
            id,
            succeeded: false,
            output: String::new(),
            failure_detail: Some(failure.to_string()),
        }
    }
}

/// Per-unit failure
///
/// Display strings are shown to people reviewing the output, so each variant
/// names its cause plainly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitFailure {
    /// 401 / 403: key missing, revoked or lacking permission
    #[error("authentication failed (HTTP {status}): {message}")]
    Authentication { status: u16, message: String },

    /// 402: account balance or quota exhausted
    #[error("quota exhausted (HTTP {status}): {message}")]
    QuotaExhausted { status: u16, message: String },

    /// 429: too many requests
    #[error("rate limited (HTTP 429): {0}")]
    RateLimited(String),

    /// Unit did not finish within its timeout
    #[error("timed out after {}s", .0.as_secs_f32())]
    Timeout(Duration),

    /// Any other non-2xx status
    #[error("backend error (HTTP {status}): {message}")]
    Backend { status: u16, message: String },

    /// Connection or transport failure
    #[error("network error: {0}")]
    Network(String),

    /// 2xx response without usable text
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl UnitFailure {
    /// Classify a non-2xx HTTP status
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => UnitFailure::Authentication { status, message },
            402 => UnitFailure::QuotaExhausted { status, message },
            429 => UnitFailure::RateLimited(message),
            _ => UnitFailure::Backend { status, message },
        }
    }
}

// ============================================================================
// Backend seams
// ============================================================================

/// Prompt pair produced by rendering a directive
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPrompt {
    /// System-level instruction
    pub system: String,
    /// User-level instruction carrying the topic or block content
    pub user: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Text generation backend
///
/// # Example
/// ```rust,ignore
/// use scribe_gen::types::{RenderedPrompt, TextGenerator, UnitFailure};
///
/// struct Echo;
///
/// #[async_trait::async_trait]
/// impl TextGenerator for Echo {
///     fn name(&self) -> &'static str { "echo" }
///
///     async fn generate(&self, prompt: &RenderedPrompt) -> Result<String, UnitFailure> {
///         Ok(prompt.user.clone())
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Generate text for one rendered prompt
    ///
    /// # Errors
    /// Returns `UnitFailure` for this request only (per-unit error isolation)
    async fn generate(&self, prompt: &RenderedPrompt) -> Result<String, UnitFailure>;
}

/// Media lookup backend
///
/// Lookups never fail: any problem is reported as "not found".
#[async_trait::async_trait]
pub trait MediaLookup: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Find a media URL for `keyword`
    async fn lookup(&self, keyword: &str) -> Option<String>;
}

/// Media lookup that never finds anything (media disabled)
pub struct NoMedia;

#[async_trait::async_trait]
impl MediaLookup for NoMedia {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn lookup(&self, _keyword: &str) -> Option<String> {
        None
    }
}
