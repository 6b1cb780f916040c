//! Block model and document decomposition
//!
//! A [`Document`] is an ordered sequence of [`Block`]s. Every unit of the source
//! survives decomposition: text long enough to be worth rewriting becomes a TEXT
//! block, everything else (embeds, newlines, stray punctuation) becomes an OPAQUE
//! block that is carried through the pipeline untouched.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Block kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BlockKind {
    /// Sent to the generation backend
    Text,
    /// Passed through unchanged
    Opaque,
}

/// Addressable document unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the source document, unique and stable across the pipeline
    pub index: usize,
    pub kind: BlockKind,
    /// Text content (empty for embeds)
    pub content: String,
    /// Delta formatting attributes of the source op
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Map<String, Value>>,
    /// Original embed value (image, video, formula...) for non-text ops
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed: Option<Value>,
}

impl Block {
    pub fn text(index: usize, content: impl Into<String>) -> Self {
        Self {
            index,
            kind: BlockKind::Text,
            content: content.into(),
            attributes: None,
            embed: None,
        }
    }

    pub fn opaque(index: usize, content: impl Into<String>) -> Self {
        Self {
            index,
            kind: BlockKind::Opaque,
            content: content.into(),
            attributes: None,
            embed: None,
        }
    }

    pub fn is_text(&self) -> bool {
        self.kind == BlockKind::Text
    }
}

/// Ordered sequence of blocks; order is rendering order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub blocks: Vec<Block>,
}

impl Document {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Blocks eligible for generation
    pub fn text_blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(|b| b.is_text())
    }

    /// Re-emit as a Quill Delta, restoring attributes and embeds
    pub fn into_delta(self) -> Delta {
        let ops = self
            .blocks
            .into_iter()
            .map(|block| DeltaOp {
                insert: block.embed.unwrap_or(Value::String(block.content)),
                attributes: block.attributes,
            })
            .collect();
        Delta { ops }
    }
}

/// Quill Delta document (insert-only, as produced by `editor.getContents()`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub ops: Vec<DeltaOp>,
}

/// One Delta insert op
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaOp {
    /// String for text, object for embeds
    pub insert: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Map<String, Value>>,
}

/// Caller-segmented text unit (`{index, content}`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSegment {
    pub index: usize,
    pub content: String,
}

/// Whether text is long enough to be sent for generation
///
/// Length is counted in characters after trimming and must exceed `min_chars`.
pub fn is_substantial(text: &str, min_chars: usize) -> bool {
    text.trim().chars().count() > min_chars
}

/// Decompose a Delta into blocks, one per op
///
/// # Errors
/// `EmptyDocument` when no op qualifies as TEXT.
pub fn decompose(delta: Delta, min_chars: usize) -> Result<Document, PipelineError> {
    let blocks: Vec<Block> = delta
        .ops
        .into_iter()
        .enumerate()
        .map(|(index, op)| match op.insert {
            Value::String(text) => {
                let kind = if is_substantial(&text, min_chars) {
                    BlockKind::Text
                } else {
                    BlockKind::Opaque
                };
                Block {
                    index,
                    kind,
                    content: text,
                    attributes: op.attributes,
                    embed: None,
                }
            }
            embed => Block {
                index,
                kind: BlockKind::Opaque,
                content: String::new(),
                attributes: op.attributes,
                embed: Some(embed),
            },
        })
        .collect();

    finish(Document::new(blocks))
}

/// Build a document from caller-segmented text units
///
/// Segments keep their caller-assigned indices and order.
///
/// # Errors
/// - `InvalidInput` on a duplicate index
/// - `EmptyDocument` when no segment qualifies as TEXT
pub fn from_segments(
    segments: Vec<TextSegment>,
    min_chars: usize,
) -> Result<Document, PipelineError> {
    let mut seen = HashSet::with_capacity(segments.len());
    let mut blocks = Vec::with_capacity(segments.len());

    for segment in segments {
        if !seen.insert(segment.index) {
            return Err(PipelineError::InvalidInput(format!(
                "duplicate block index {}",
                segment.index
            )));
        }
        let block = if is_substantial(&segment.content, min_chars) {
            Block::text(segment.index, segment.content)
        } else {
            Block::opaque(segment.index, segment.content)
        };
        blocks.push(block);
    }

    finish(Document::new(blocks))
}

fn finish(document: Document) -> Result<Document, PipelineError> {
    if document.text_blocks().next().is_none() {
        return Err(PipelineError::EmptyDocument);
    }
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn delta(value: Value) -> Delta {
        serde_json::from_value(value).expect("valid delta")
    }

    #[test]
    fn test_decompose_preserves_every_op() {
        let source = delta(json!({
            "ops": [
                {"insert": "这款手机的续航简直逆天，用一整天都没问题！"},
                {"insert": {"image": "https://example.com/a.png"}},
                {"insert": "\n"},
                {"insert": "标题", "attributes": {"bold": true}},
                {"insert": "第二段内容足够长，应该被改写。\n", "attributes": {"header": 2}}
            ]
        }));

        let document = decompose(source, 5).unwrap();
        assert_eq!(document.len(), 5);

        let kinds: Vec<BlockKind> = document.blocks.iter().map(|b| b.kind).collect();
        assert_eq!(
            kinds,
            vec![
                BlockKind::Text,
                BlockKind::Opaque,
                BlockKind::Opaque,
                BlockKind::Opaque,
                BlockKind::Text
            ]
        );

        let indices: Vec<usize> = document.blocks.iter().map(|b| b.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        assert_eq!(document.blocks[1].embed, Some(json!({"image": "https://example.com/a.png"})));
    }

    #[test]
    fn test_threshold_counts_characters_not_bytes() {
        // Six CJK characters are 18 bytes but only 6 characters
        assert!(is_substantial("六个汉字六个", 5));
        assert!(!is_substantial("五个汉字五", 5));
        assert!(!is_substantial("   ok!   ", 5));
        assert!(is_substantial("a", 0));
        assert!(!is_substantial("  \n ", 0));
    }

    #[test]
    fn test_decompose_without_text_is_empty_document() {
        let source = delta(json!({
            "ops": [
                {"insert": {"image": "https://example.com/a.png"}},
                {"insert": "\n"}
            ]
        }));
        assert!(matches!(decompose(source, 5), Err(PipelineError::EmptyDocument)));
        assert!(matches!(
            decompose(Delta::default(), 0),
            Err(PipelineError::EmptyDocument)
        ));
    }

    #[test]
    fn test_into_delta_round_trips_untouched_document() {
        let value = json!({
            "ops": [
                {"insert": "一段足够长的正文内容。"},
                {"insert": {"image": "https://example.com/a.png"}, "attributes": {"width": "300"}},
                {"insert": "\n", "attributes": {"align": "center"}}
            ]
        });
        let document = decompose(delta(value.clone()), 5).unwrap();
        assert_eq!(serde_json::to_value(document.into_delta()).unwrap(), value);
    }

    #[test]
    fn test_from_segments_keeps_caller_indices() {
        let segments = vec![
            TextSegment { index: 4, content: "first".to_string() },
            TextSegment { index: 9, content: "   ".to_string() },
            TextSegment { index: 2, content: "third".to_string() },
        ];

        let document = from_segments(segments, 0).unwrap();
        let summary: Vec<(usize, BlockKind)> =
            document.blocks.iter().map(|b| (b.index, b.kind)).collect();
        assert_eq!(
            summary,
            vec![(4, BlockKind::Text), (9, BlockKind::Opaque), (2, BlockKind::Text)]
        );
    }

    #[test]
    fn test_from_segments_rejects_duplicate_index() {
        let segments = vec![
            TextSegment { index: 1, content: "one".to_string() },
            TextSegment { index: 1, content: "again".to_string() },
        ];
        assert!(matches!(
            from_segments(segments, 0),
            Err(PipelineError::InvalidInput(_))
        ));
    }
}
