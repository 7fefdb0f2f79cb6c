use std::collections::HashMap;

use serde_json::Value;

use crate::analyzer;
use crate::types::{DocNode, SerializeOptions};

/// Custom rendering hook for node types the built-in serializer does not know.
pub type NodeConverter = fn(&DocNode) -> String;

pub fn serialize_document(tree: &DocNode, options: &SerializeOptions) -> String {
    serialize_document_with(tree, &HashMap::new(), options)
}

/// Renders a document tree back to markdown. Top-level blocks are separated
/// by blank lines. Unknown node types try `converters` first, then the
/// options policy: placeholder comment, flatten to plain text, or drop.
pub fn serialize_document_with(
    tree: &DocNode,
    converters: &HashMap<String, NodeConverter>,
    options: &SerializeOptions,
) -> String {
    tree.content
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter_map(|node| serialize_block(node, converters, options))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn serialize_block(
    node: &DocNode,
    converters: &HashMap<String, NodeConverter>,
    options: &SerializeOptions,
) -> Option<String> {
    match node.node_type.as_str() {
        "paragraph" => Some(render_children(node)),
        "heading" => {
            let level = attr_u64(node, "level").unwrap_or(1).clamp(1, 6) as usize;
            Some(format!("{} {}", "#".repeat(level), render_children(node)))
        }
        "code_block" => {
            let language = node
                .attrs
                .as_ref()
                .and_then(|attrs| attrs.get("language"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            let code = analyzer::flatten_node_text(node);
            if code.is_empty() {
                Some(format!("```{language}\n```"))
            } else {
                Some(format!("```{language}\n{code}\n```"))
            }
        }
        "blockquote" => Some(
            node.content
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(|child| format!("> {}", render_inline(child)))
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        "bullet_list" => Some(render_list(node, |_| "-".to_string())),
        "ordered_list" => Some(render_list(node, |index| format!("{}.", index + 1))),
        "horizontal_rule" => Some("---".to_string()),
        _ => {
            if let Some(converter) = converters.get(&node.node_type) {
                return Some(converter(node));
            }
            if options.placeholders {
                return Some(format!("<!-- {} -->", node.node_type));
            }
            if options.fallback_to_paragraph {
                return Some(analyzer::flatten_node_text(node));
            }
            None
        }
    }
}

fn render_list(node: &DocNode, marker: impl Fn(usize) -> String) -> String {
    node.content
        .as_deref()
        .unwrap_or_default()
        .iter()
        .enumerate()
        .map(|(index, item)| format!("{} {}", marker(index), render_inline(item)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_inline(node: &DocNode) -> String {
    match &node.text {
        Some(text) => render_text(text, node),
        None => render_children(node),
    }
}

fn render_children(node: &DocNode) -> String {
    node.content
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(render_inline)
        .collect()
}

fn render_text(text: &str, node: &DocNode) -> String {
    let mut rendered = text.to_string();
    for mark in node.marks.as_deref().unwrap_or_default() {
        rendered = match mark.mark_type.as_str() {
            "bold" => format!("**{rendered}**"),
            "italic" => format!("*{rendered}*"),
            "code" => format!("`{rendered}`"),
            "link" => {
                let href = mark
                    .attrs
                    .as_ref()
                    .and_then(|attrs| attrs.get("href"))
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                format!("[{rendered}]({href})")
            }
            _ => rendered,
        };
    }
    rendered
}

fn attr_u64(node: &DocNode, key: &str) -> Option<u64> {
    node.attrs.as_ref()?.get(key)?.as_u64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_markdown_to_document;
    use crate::types::Mark;
    use serde_json::json;

    fn styled(text: &str, mark: Mark) -> DocNode {
        let mut node = DocNode::text(text);
        node.marks = Some(vec![mark]);
        node
    }

    #[test]
    fn headings_render_their_level_and_clamp() {
        let tree = DocNode::doc(vec![
            DocNode::element("heading", vec![DocNode::text("One")]).with_attrs(json!({ "level": 1 })),
            DocNode::element("heading", vec![DocNode::text("Deep")]).with_attrs(json!({ "level": 9 })),
            DocNode::element("heading", vec![DocNode::text("Bare")]),
        ]);
        let markdown = serialize_document(&tree, &SerializeOptions::default());
        assert_eq!(markdown, "# One\n\n###### Deep\n\n# Bare");
    }

    #[test]
    fn marks_render_back_to_markdown_syntax() {
        let tree = DocNode::doc(vec![DocNode::element(
            "paragraph",
            vec![
                DocNode::text("see "),
                styled("bold", Mark::new("bold")),
                DocNode::text(" and "),
                styled("docs", Mark::link("https://example.com")),
            ],
        )]);
        let markdown = serialize_document(&tree, &SerializeOptions::default());
        assert_eq!(markdown, "see **bold** and [docs](https://example.com)");
    }

    #[test]
    fn code_blocks_keep_language_and_handle_empty_bodies() {
        let tree = DocNode::doc(vec![
            DocNode::element("code_block", vec![DocNode::text("let x = 1;")])
                .with_attrs(json!({ "language": "rust" })),
            DocNode::element("code_block", Vec::new()),
        ]);
        let markdown = serialize_document(&tree, &SerializeOptions::default());
        assert_eq!(markdown, "```rust\nlet x = 1;\n```\n\n```\n```");
    }

    #[test]
    fn quotes_and_lists_render_line_per_entry() {
        let tree = DocNode::doc(vec![
            DocNode::element(
                "blockquote",
                vec![
                    DocNode::element("paragraph", vec![DocNode::text("first")]),
                    DocNode::element("paragraph", vec![DocNode::text("second")]),
                ],
            ),
            DocNode::element(
                "ordered_list",
                vec![
                    DocNode::element(
                        "list_item",
                        vec![DocNode::element("paragraph", vec![DocNode::text("alpha")])],
                    ),
                    DocNode::element(
                        "list_item",
                        vec![DocNode::element("paragraph", vec![DocNode::text("beta")])],
                    ),
                ],
            ),
        ]);
        let markdown = serialize_document(&tree, &SerializeOptions::default());
        assert_eq!(markdown, "> first\n> second\n\n1. alpha\n2. beta");
    }

    #[test]
    fn unknown_nodes_follow_the_options_policy() {
        let tree = DocNode::doc(vec![
            DocNode::element("custom_widget", vec![DocNode::text("payload")]),
            DocNode::element("paragraph", vec![DocNode::text("kept")]),
        ]);
        let placeholder = serialize_document(&tree, &SerializeOptions::default());
        assert_eq!(placeholder, "<!-- custom_widget -->\n\nkept");

        let flattened = serialize_document(
            &tree,
            &SerializeOptions {
                placeholders: false,
                fallback_to_paragraph: true,
            },
        );
        assert_eq!(flattened, "payload\n\nkept");

        let dropped = serialize_document(
            &tree,
            &SerializeOptions {
                placeholders: false,
                fallback_to_paragraph: false,
            },
        );
        assert_eq!(dropped, "kept");
    }

    #[test]
    fn converters_win_over_the_placeholder_policy() {
        fn widget(_: &DocNode) -> String {
            ":widget:".to_string()
        }
        let tree = DocNode::doc(vec![DocNode::element("custom_widget", Vec::new())]);
        let mut converters: HashMap<String, NodeConverter> = HashMap::new();
        converters.insert("custom_widget".to_string(), widget);
        let markdown = serialize_document_with(&tree, &converters, &SerializeOptions::default());
        assert_eq!(markdown, ":widget:");
    }

    #[test]
    fn parse_then_serialize_round_trips_common_markdown() {
        let source = "# Title\n\nSome **bold** text\n\n- one\n- two\n\n```rust\nfn main() {}\n```\n\n> quoted\n\n---";
        let tree = parse_markdown_to_document(source);
        let markdown = serialize_document(&tree, &SerializeOptions::default());
        assert_eq!(markdown, source);
    }
}
