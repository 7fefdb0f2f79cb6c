use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

use crate::types::{Block, BlockType, DocNode, InlineToken, Mark, SyntaxValidation};

static HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.*)$").unwrap());
static UNORDERED_LIST_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*([*+-])\s+(.*)$").unwrap());
static ORDERED_LIST_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d+)\.\s+(.*)$").unwrap());
static CODE_FENCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```(\w*)\s*$").unwrap());
static BLOCKQUOTE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*>\s?(.*)$").unwrap());
static HORIZONTAL_RULE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(-{3,}|\*{3,}|_{3,})\s*$").unwrap());

// =============================================================================
// Block parsing
// =============================================================================

fn classify_line(line: &str) -> BlockType {
    if HEADING_RE.is_match(line) {
        BlockType::Heading
    } else if UNORDERED_LIST_RE.is_match(line) || ORDERED_LIST_RE.is_match(line) {
        BlockType::ListItem
    } else if CODE_FENCE_RE.is_match(line) {
        BlockType::CodeBlock
    } else if BLOCKQUOTE_RE.is_match(line) {
        BlockType::Blockquote
    } else if line.trim().is_empty() {
        BlockType::Empty
    } else if HORIZONTAL_RULE_RE.is_match(line) {
        BlockType::HorizontalRule
    } else {
        BlockType::Paragraph
    }
}

// Headings, fence delimiters, rules and blank lines never extend an open
// block; paragraph, list and quote lines continue a same-typed run.
fn always_starts_block(block_type: BlockType) -> bool {
    matches!(
        block_type,
        BlockType::Heading | BlockType::CodeBlock | BlockType::HorizontalRule | BlockType::Empty
    )
}

fn open_block(block_type: BlockType, line: &str, index: u32) -> Block {
    let (level, attrs) = match block_type {
        BlockType::Heading => {
            let level = HEADING_RE.captures(line).map_or(1, |captures| captures[1].len() as u32);
            (Some(level), Some(json!({ "level": level })))
        }
        BlockType::CodeBlock => {
            let language = CODE_FENCE_RE
                .captures(line)
                .and_then(|captures| captures.get(1))
                .map(|matched| matched.as_str())
                .unwrap_or_default();
            let attrs = (!language.is_empty()).then(|| json!({ "language": language }));
            (None, attrs)
        }
        _ => (None, None),
    };
    Block {
        block_type,
        content: vec![line.to_string()],
        start_line: index,
        end_line: index,
        level,
        attrs,
    }
}

/// Splits markdown into typed line-range blocks. Classification is applied
/// per line with no carried state, so the lines inside a fenced region keep
/// their surface classification; consumers pairing fences must handle that.
pub fn parse_to_blocks(markdown: &str) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();
    let mut current: Option<Block> = None;
    for (index, line) in markdown.split('\n').enumerate() {
        let line_type = classify_line(line);
        let starts_new = always_starts_block(line_type)
            || current.as_ref().map_or(true, |block| block.block_type != line_type);
        if starts_new {
            if let Some(block) = current.take() {
                blocks.push(block);
            }
            current = Some(open_block(line_type, line, index as u32));
        } else if let Some(block) = current.as_mut() {
            block.content.push(line.to_string());
            block.end_line = index as u32;
        }
    }
    if let Some(block) = current.take() {
        blocks.push(block);
    }
    blocks
}

// =============================================================================
// Inline parsing
// =============================================================================

// Lazy-match semantics: the closing delimiter is searched past one leading
// character, so the delimited body is never empty and an unbalanced opener
// falls through to the per-character path.
fn delimited_span<'a>(text: &'a str, open: &str, close: &str) -> Option<(&'a str, usize)> {
    let body = text.strip_prefix(open)?;
    let first = body.chars().next()?;
    let search_from = first.len_utf8();
    let found = body[search_from..].find(close)?;
    let inner_end = search_from + found;
    Some((&body[..inner_end], open.len() + inner_end + close.len()))
}

fn link_span(text: &str) -> Option<(&str, &str, usize)> {
    let body = text.strip_prefix('[')?;
    let label_end = body.find("](")?;
    let label = &body[..label_end];
    if label.is_empty() || label.contains(']') {
        return None;
    }
    let target = &body[label_end + 2..];
    let href_end = target.find(')')?;
    let href = &target[..href_end];
    if href.is_empty() {
        return None;
    }
    Some((label, href, 1 + label_end + 2 + href_end + 1))
}

fn merge_tokens(tokens: Vec<InlineToken>) -> Vec<InlineToken> {
    let mut merged: Vec<InlineToken> = Vec::new();
    for token in tokens {
        match merged.last_mut() {
            Some(last) if last.marks == token.marks => last.text.push_str(&token.text),
            _ => merged.push(token),
        }
    }
    merged
}

/// Tokenizes one line of inline markdown into styled runs, trying bold,
/// italic, code and link in that order at each position. Unmatched delimiter
/// characters are emitted as plain text; adjacent runs with equal mark sets
/// are merged.
pub fn parse_inline_markdown(text: &str) -> Vec<InlineToken> {
    let mut tokens: Vec<InlineToken> = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        if let Some((inner, consumed)) = delimited_span(rest, "**", "**") {
            tokens.push(InlineToken {
                text: inner.to_string(),
                marks: vec![Mark::new("bold")],
            });
            rest = &rest[consumed..];
            continue;
        }
        if let Some((inner, consumed)) = delimited_span(rest, "*", "*") {
            tokens.push(InlineToken {
                text: inner.to_string(),
                marks: vec![Mark::new("italic")],
            });
            rest = &rest[consumed..];
            continue;
        }
        if let Some((inner, consumed)) = delimited_span(rest, "`", "`") {
            tokens.push(InlineToken {
                text: inner.to_string(),
                marks: vec![Mark::new("code")],
            });
            rest = &rest[consumed..];
            continue;
        }
        if let Some((label, href, consumed)) = link_span(rest) {
            tokens.push(InlineToken {
                text: label.to_string(),
                marks: vec![Mark::link(href)],
            });
            rest = &rest[consumed..];
            continue;
        }
        let Some(next) = rest.chars().next() else {
            break;
        };
        let width = next.len_utf8();
        tokens.push(InlineToken {
            text: rest[..width].to_string(),
            marks: Vec::new(),
        });
        rest = &rest[width..];
    }
    merge_tokens(tokens)
}

/// Tokenizes `text` and lifts the runs into tree text nodes.
pub fn inline_nodes(text: &str) -> Vec<DocNode> {
    parse_inline_markdown(text)
        .into_iter()
        .filter(|token| !token.text.is_empty())
        .map(|token| {
            let mut node = DocNode::text(token.text);
            if !token.marks.is_empty() {
                node.marks = Some(token.marks);
            }
            node
        })
        .collect()
}

// =============================================================================
// Markdown -> tree
// =============================================================================

pub(crate) fn is_code_fence(line: &str) -> bool {
    CODE_FENCE_RE.is_match(line)
}

pub(crate) fn heading_level(line: &str) -> Option<u32> {
    HEADING_RE.captures(line).map(|captures| captures[1].len() as u32)
}

fn list_item_text(line: &str) -> &str {
    UNORDERED_LIST_RE
        .captures(line)
        .or_else(|| ORDERED_LIST_RE.captures(line))
        .and_then(|captures| captures.get(2))
        .map_or_else(|| line.trim(), |matched| matched.as_str())
}

/// Strips the block-level marker a node type implies, leaving inline text.
pub fn strip_block_marker(node_type: &str, text: &str) -> String {
    match node_type {
        "heading" => HEADING_RE
            .captures(text)
            .and_then(|captures| captures.get(2))
            .map_or_else(|| text.to_string(), |matched| matched.as_str().to_string()),
        "blockquote" => text
            .split('\n')
            .map(|line| {
                BLOCKQUOTE_RE
                    .captures(line)
                    .and_then(|captures| captures.get(1))
                    .map_or(line, |matched| matched.as_str())
            })
            .collect::<Vec<_>>()
            .join("\n"),
        "list_item" | "bullet_list" | "ordered_list" => text
            .split('\n')
            .map(list_item_text)
            .collect::<Vec<_>>()
            .join("\n"),
        "code_block" => text
            .split('\n')
            .filter(|line| !is_code_fence(line))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => text.to_string(),
    }
}

fn list_node(block: &Block) -> DocNode {
    let ordered = block
        .content
        .first()
        .is_some_and(|line| ORDERED_LIST_RE.is_match(line));
    let items = block
        .content
        .iter()
        .map(|line| {
            DocNode::element(
                "list_item",
                vec![DocNode::element("paragraph", inline_nodes(list_item_text(line)))],
            )
        })
        .collect();
    DocNode::element(if ordered { "ordered_list" } else { "bullet_list" }, items)
}

fn block_to_node(block: &Block) -> Option<DocNode> {
    match block.block_type {
        BlockType::Empty => None,
        BlockType::Heading => {
            let line = block.content.first().map(String::as_str).unwrap_or_default();
            let title = strip_block_marker("heading", line);
            let level = block.level.unwrap_or(1);
            Some(DocNode::element("heading", inline_nodes(&title)).with_attrs(json!({ "level": level })))
        }
        BlockType::Paragraph => Some(DocNode::element(
            "paragraph",
            inline_nodes(&block.content.join("\n")),
        )),
        BlockType::Blockquote => {
            let paragraphs = block
                .content
                .iter()
                .map(|line| {
                    DocNode::element(
                        "paragraph",
                        inline_nodes(&strip_block_marker("blockquote", line)),
                    )
                })
                .collect();
            Some(DocNode::element("blockquote", paragraphs))
        }
        BlockType::ListItem => Some(list_node(block)),
        BlockType::HorizontalRule => Some(DocNode::leaf("horizontal_rule")),
        BlockType::CodeBlock => {
            let mut node = DocNode::element("code_block", Vec::new());
            node.attrs = block.attrs.clone();
            Some(node)
        }
    }
}

/// Reconstructs a document tree from markdown. Unlike the stateless block
/// classifier, this pairs fence delimiters so fenced regions come back as a
/// single code_block with the enclosed lines as raw text.
pub fn parse_markdown_to_document(markdown: &str) -> DocNode {
    let blocks = parse_to_blocks(markdown);
    let mut nodes: Vec<DocNode> = Vec::new();
    let mut index = 0;
    while index < blocks.len() {
        let block = &blocks[index];
        if block.block_type == BlockType::CodeBlock {
            let mut code_lines: Vec<String> = Vec::new();
            let mut cursor = index + 1;
            while cursor < blocks.len() && blocks[cursor].block_type != BlockType::CodeBlock {
                code_lines.extend(blocks[cursor].content.iter().cloned());
                cursor += 1;
            }
            let content = if code_lines.is_empty() {
                Vec::new()
            } else {
                vec![DocNode::text(code_lines.join("\n"))]
            };
            let mut node = DocNode::element("code_block", content);
            node.attrs = block.attrs.clone();
            nodes.push(node);
            index = if cursor < blocks.len() { cursor + 1 } else { cursor };
        } else {
            if let Some(node) = block_to_node(block) {
                nodes.push(node);
            }
            index += 1;
        }
    }
    DocNode::doc(nodes)
}

/// Structural syntax check. The line grammar itself never fails; the only
/// detectable defect is a fence left open.
pub fn validate_markdown_syntax(markdown: &str) -> SyntaxValidation {
    let mut open_fence: Option<usize> = None;
    for (index, line) in markdown.split('\n').enumerate() {
        if is_code_fence(line) {
            open_fence = match open_fence {
                Some(_) => None,
                None => Some(index + 1),
            };
        }
    }
    match open_fence {
        Some(line) => SyntaxValidation {
            valid: false,
            error: Some(format!("unclosed code fence opened on line {line}")),
        },
        None => SyntaxValidation { valid: true, error: None },
    }
}
