//! Media placeholder resolution
//!
//! Generated articles carry `{{IMG_SEARCH:<keyword>}}` markers. Every occurrence is
//! looked up independently (duplicates included), concurrently, under a per-lookup
//! timeout. A found URL replaces that occurrence with an `<img>` element; anything
//! else removes the marker. Markers never survive into the output.

use crate::types::MediaLookup;
use futures::stream::{self, StreamExt};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, info};

/// Marker pattern; the keyword is the shortest run up to the closing braces,
/// line breaks included
pub const MARKER_PATTERN: &str = r"(?s)\{\{IMG_SEARCH:(.*?)\}\}";

fn marker_regex() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| Regex::new(MARKER_PATTERN).expect("marker pattern is valid"))
}

/// One marker occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    /// Byte span of the full marker in the scanned text
    pub start: usize,
    pub end: usize,
    /// Exact marker text, braces included
    pub text: String,
    pub keyword: String,
}

/// Find all non-overlapping markers, in order
pub fn find_markers(text: &str) -> Vec<Marker> {
    marker_regex()
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let keyword = caps.get(1)?;
            Some(Marker {
                start: whole.start(),
                end: whole.end(),
                text: whole.as_str().to_string(),
                keyword: keyword.as_str().trim().to_string(),
            })
        })
        .collect()
}

/// Escape text for use inside a double-quoted HTML attribute
fn escape_attr(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Markup for a resolved image
pub fn render_image(url: &str, keyword: &str) -> String {
    format!(
        r#"<img src="{}" alt="{}" style="border-radius: 8px; margin: 15px 0; width: 100%; max-height: 400px; object-fit: cover;" />"#,
        escape_attr(url),
        escape_attr(keyword)
    )
}

/// Resolves placeholder markers through a [`MediaLookup`]
#[derive(Clone)]
pub struct PlaceholderResolver {
    lookup: Arc<dyn MediaLookup>,
    lookup_timeout: Duration,
    max_concurrency: usize,
}

impl PlaceholderResolver {
    pub fn new(lookup: Arc<dyn MediaLookup>, lookup_timeout: Duration, max_concurrency: usize) -> Self {
        Self {
            lookup,
            lookup_timeout,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Replace every marker in `text`, waiting for all lookups
    pub async fn resolve(&self, text: &str) -> String {
        let markers = find_markers(text);
        if markers.is_empty() {
            return text.to_string();
        }

        info!(
            markers = markers.len(),
            backend = self.lookup.name(),
            "Resolving media placeholders"
        );

        // Each task owns its keyword; handler futures must be Send
        let keywords: Vec<(usize, String)> = markers
            .iter()
            .map(|marker| marker.keyword.clone())
            .enumerate()
            .collect();

        let replacements: Vec<(usize, String)> = stream::iter(keywords)
            .map(|(position, keyword)| {
                let lookup = Arc::clone(&self.lookup);
                let lookup_timeout = self.lookup_timeout;
                async move {
                    let found = match tokio::time::timeout(lookup_timeout, lookup.lookup(&keyword)).await {
                        Ok(found) => found.filter(|url| !url.trim().is_empty()),
                        Err(_) => {
                            debug!(keyword = %keyword, "Media lookup timed out");
                            None
                        }
                    };
                    let replacement = match found {
                        Some(url) => render_image(&url, &keyword),
                        None => {
                            debug!(keyword = %keyword, "No media found, removing placeholder");
                            String::new()
                        }
                    };
                    (position, replacement)
                }
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        let mut by_position = vec![String::new(); markers.len()];
        for (position, replacement) in replacements {
            by_position[position] = replacement;
        }

        splice(text, &markers, &by_position)
    }
}

/// Replace each marker span with its replacement, copying the text between
/// markers verbatim
fn splice(text: &str, markers: &[Marker], replacements: &[String]) -> String {
    let mut output = String::with_capacity(text.len());
    let mut cursor = 0;
    for (marker, replacement) in markers.iter().zip(replacements) {
        debug_assert_eq!(&text[marker.start..marker.end], marker.text);
        output.push_str(&text[cursor..marker.start]);
        output.push_str(replacement);
        cursor = marker.end;
    }
    output.push_str(&text[cursor..]);
    output
}
