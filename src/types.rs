use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// =============================================================================
// Markdown blocks
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    Heading,
    ListItem,
    CodeBlock,
    Blockquote,
    HorizontalRule,
    Paragraph,
    Empty,
}

impl BlockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Heading => "heading",
            BlockType::ListItem => "list_item",
            BlockType::CodeBlock => "code_block",
            BlockType::Blockquote => "blockquote",
            BlockType::HorizontalRule => "horizontal_rule",
            BlockType::Paragraph => "paragraph",
            BlockType::Empty => "empty",
        }
    }
}

/// One maximal run of source lines sharing a structural classification.
/// `content` always holds `end_line - start_line + 1` raw lines.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    #[serde(rename = "type")]
    pub block_type: BlockType,
    pub content: Vec<String>,
    pub start_line: u32,
    pub end_line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<Value>,
}

// =============================================================================
// Document tree
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    #[serde(rename = "type")]
    pub mark_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<Value>,
}

impl Mark {
    pub fn new(mark_type: impl Into<String>) -> Self {
        Self {
            mark_type: mark_type.into(),
            attrs: None,
        }
    }

    pub fn link(href: impl Into<String>) -> Self {
        Self {
            mark_type: "link".to_string(),
            attrs: Some(serde_json::json!({ "href": href.into() })),
        }
    }
}

/// ProseMirror-shaped node. A node carries either `text` (leaf) or `content`
/// (container); `Clone` is the deep clone the applier relies on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocNode {
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<DocNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marks: Option<Vec<Mark>>,
}

impl DocNode {
    pub fn doc(content: Vec<DocNode>) -> Self {
        Self::element("doc", content)
    }

    pub fn element(node_type: impl Into<String>, content: Vec<DocNode>) -> Self {
        Self {
            node_type: node_type.into(),
            attrs: None,
            content: Some(content),
            text: None,
            marks: None,
        }
    }

    pub fn leaf(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            attrs: None,
            content: None,
            text: None,
            marks: None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            node_type: "text".to_string(),
            attrs: None,
            content: None,
            text: Some(text.into()),
            marks: None,
        }
    }

    pub fn with_attrs(mut self, attrs: Value) -> Self {
        self.attrs = Some(attrs);
        self
    }

    pub fn with_marks(mut self, marks: Vec<Mark>) -> Self {
        self.marks = Some(marks);
        self
    }
}

/// Styled text run produced by the inline tokenizer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InlineToken {
    pub text: String,
    #[serde(default)]
    pub marks: Vec<Mark>,
}

// =============================================================================
// Block diff operations
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockDiffKind {
    InsertBlock,
    DeleteBlock,
    ModifyBlock,
    ReplaceBlock,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    TextChange,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentChange {
    #[serde(rename = "type")]
    pub change_type: ChangeKind,
    pub position: u32,
    pub length: u32,
    pub original_text: String,
    pub new_text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockDiffOp {
    #[serde(rename = "type")]
    pub op_type: BlockDiffKind,
    pub position: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_block: Option<Block>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_block: Option<Block>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_changes: Option<Vec<ContentChange>>,
}

// =============================================================================
// Tree-edit operations
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocOpKind {
    InsertNode,
    DeleteNode,
    Replace,
    ModifyNode,
}

/// One tree-edit instruction. `markdown_position` is an informational anchor
/// into the source text; the applier addresses purely by `prosemirror_path`.
/// For `insert_node` the last path component is an insertion index into the
/// parent's children rather than an existing child index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocOperation {
    #[serde(rename = "type")]
    pub op_type: DocOpKind,
    pub markdown_position: u32,
    pub prosemirror_path: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_attrs: Option<Value>,
}

impl DocOperation {
    pub fn insert_node(
        markdown_position: u32,
        path: Vec<u32>,
        content: String,
        node_type: String,
        node_attrs: Option<Value>,
    ) -> Self {
        Self {
            op_type: DocOpKind::InsertNode,
            markdown_position,
            prosemirror_path: path,
            length: None,
            content: Some(content),
            original_content: None,
            node_type: Some(node_type),
            node_attrs,
        }
    }

    pub fn delete_node(markdown_position: u32, path: Vec<u32>, original_content: Option<String>) -> Self {
        Self {
            op_type: DocOpKind::DeleteNode,
            markdown_position,
            prosemirror_path: path,
            length: None,
            content: None,
            original_content,
            node_type: None,
            node_attrs: None,
        }
    }

    pub fn replace(
        markdown_position: u32,
        path: Vec<u32>,
        length: u32,
        original_content: String,
        content: String,
    ) -> Self {
        Self {
            op_type: DocOpKind::Replace,
            markdown_position,
            prosemirror_path: path,
            length: Some(length),
            content: Some(content),
            original_content: Some(original_content),
            node_type: None,
            node_attrs: None,
        }
    }

    pub fn modify_node(markdown_position: u32, path: Vec<u32>, node_attrs: Value) -> Self {
        Self {
            op_type: DocOpKind::ModifyNode,
            markdown_position,
            prosemirror_path: path,
            length: None,
            content: None,
            original_content: None,
            node_type: None,
            node_attrs: Some(node_attrs),
        }
    }
}

// =============================================================================
// Transform surface
// =============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    #[default]
    Block,
    Line,
    Character,
}

/// Transform tuning knobs. `granularity` values other than `block` are
/// accepted but reserved; `preserve_formatting` is accepted and always on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformOptions {
    #[serde(default = "default_true")]
    pub preserve_formatting: bool,
    #[serde(default = "default_true")]
    pub handle_structural_changes: bool,
    #[serde(default)]
    pub granularity: Granularity,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            preserve_formatting: true,
            handle_structural_changes: true,
            granularity: Granularity::Block,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformRequest {
    pub original_markdown: String,
    pub modified_markdown: String,
    pub original_tree: Value,
    #[serde(default)]
    pub options: Option<TransformOptions>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformStatistics {
    pub nodes_modified: u32,
    pub text_changes: u32,
    pub structural_changes: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformResult {
    pub success: bool,
    pub new_document: DocNode,
    pub operations: Vec<DocOperation>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub statistics: TransformStatistics,
}

impl TransformResult {
    pub fn failure(document: DocNode, errors: Vec<String>) -> Self {
        Self {
            success: false,
            new_document: document,
            operations: Vec::new(),
            errors,
            warnings: Vec::new(),
            statistics: TransformStatistics::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntaxValidation {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Unknown-node policies for the markdown serializer. With `placeholders`
/// unset and `fallback_to_paragraph` set, unknown nodes flatten to their
/// child text; with neither set they are dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializeOptions {
    #[serde(default = "default_true")]
    pub placeholders: bool,
    #[serde(default)]
    pub fallback_to_paragraph: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            placeholders: true,
            fallback_to_paragraph: false,
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error, PartialEq)]
pub enum TransformError {
    #[error("{side} markdown must not be empty")]
    EmptyMarkdown { side: &'static str },
    #[error("document root must be a \"doc\" node carrying a content array")]
    InvalidDocument,
    #[error("transform failed: {0}")]
    Failed(String),
}

pub(crate) fn utf16_len(text: &str) -> u32 {
    text.encode_utf16().count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_serializes_with_camel_case_wire_names() {
        let op = DocOperation::insert_node(12, vec![2], "## New".to_string(), "heading".to_string(), None);
        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(value["type"], "insert_node");
        assert_eq!(value["markdownPosition"], 12);
        assert_eq!(value["prosemirrorPath"], serde_json::json!([2]));
        assert_eq!(value["nodeType"], "heading");
        assert!(value.get("originalContent").is_none());
    }

    #[test]
    fn block_type_tags_are_snake_case() {
        let value = serde_json::to_value(BlockType::HorizontalRule).unwrap();
        assert_eq!(value, "horizontal_rule");
        assert_eq!(BlockType::ListItem.as_str(), "list_item");
    }

    #[test]
    fn doc_node_round_trips_through_json() {
        let node = DocNode::doc(vec![
            DocNode::element("heading", vec![DocNode::text("Title")]).with_attrs(serde_json::json!({ "level": 2 })),
            DocNode::element(
                "paragraph",
                vec![DocNode::text("linked").with_marks(vec![Mark::link("https://example.com")])],
            ),
        ]);
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["content"][0]["type"], "heading");
        assert_eq!(value["content"][1]["content"][0]["marks"][0]["attrs"]["href"], "https://example.com");
        let back: DocNode = serde_json::from_value(value).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn transform_options_default_from_empty_object() {
        let options: TransformOptions = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(options.preserve_formatting);
        assert!(options.handle_structural_changes);
        assert_eq!(options.granularity, Granularity::Block);
    }

    #[test]
    fn transform_error_messages_are_stable() {
        let error = TransformError::EmptyMarkdown { side: "original" };
        assert_eq!(error.to_string(), "original markdown must not be empty");
    }
}
