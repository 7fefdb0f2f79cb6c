use std::cmp::Ordering;

use serde_json::{json, Map, Value};

use crate::parser;
use crate::types::{DocNode, DocOpKind, DocOperation};

#[derive(Clone, Debug, PartialEq)]
pub struct SkippedOperation {
    pub index: usize,
    pub reason: String,
}

#[derive(Clone, Debug)]
pub struct ApplyOutcome {
    pub document: DocNode,
    pub skipped: Vec<SkippedOperation>,
}

// Deepest paths first; within equal depth, higher indices first, compared
// from the last path component backward. Equal paths keep emission order
// (the sort is stable), which preserves delete-before-insert pairs.
fn apply_order(a: &DocOperation, b: &DocOperation) -> Ordering {
    let path_a = &a.prosemirror_path;
    let path_b = &b.prosemirror_path;
    path_b.len().cmp(&path_a.len()).then_with(|| {
        for (left, right) in path_a.iter().rev().zip(path_b.iter().rev()) {
            match right.cmp(left) {
                Ordering::Equal => continue,
                decided => return decided,
            }
        }
        Ordering::Equal
    })
}

/// Applies `operations` to a deep clone of `tree`, ordered so that no
/// operation invalidates a later operation's path. Operations that fail to
/// resolve are skipped with a reason and the rest still apply.
pub fn apply_operations(tree: &DocNode, operations: &[DocOperation]) -> ApplyOutcome {
    let mut document = tree.clone();
    let mut ordered: Vec<(usize, &DocOperation)> = operations.iter().enumerate().collect();
    ordered.sort_by(|(_, a), (_, b)| apply_order(a, b));

    let mut skipped = Vec::new();
    for (index, operation) in ordered {
        if let Err(reason) = apply_one(&mut document, operation) {
            skipped.push(SkippedOperation { index, reason });
        }
    }
    ApplyOutcome { document, skipped }
}

fn apply_one(document: &mut DocNode, operation: &DocOperation) -> Result<(), String> {
    match operation.op_type {
        DocOpKind::InsertNode => insert_node(document, operation),
        DocOpKind::DeleteNode => delete_node(document, operation),
        DocOpKind::Replace => replace_content(document, operation),
        DocOpKind::ModifyNode => modify_attrs(document, operation),
    }
}

fn node_at_path_mut<'a>(root: &'a mut DocNode, path: &[u32]) -> Result<&'a mut DocNode, String> {
    let mut node = root;
    for (depth, &index) in path.iter().enumerate() {
        let children = node
            .content
            .as_mut()
            .ok_or_else(|| format!("node at {:?} has no children", &path[..depth]))?;
        node = children
            .get_mut(index as usize)
            .ok_or_else(|| format!("child {index} out of range at {:?}", &path[..depth]))?;
    }
    Ok(node)
}

fn split_target(path: &[u32]) -> Result<(&[u32], usize), String> {
    path.split_last()
        .map(|(last, parent)| (parent, *last as usize))
        .ok_or_else(|| "operation path must not be empty".to_string())
}

fn insert_node(document: &mut DocNode, operation: &DocOperation) -> Result<(), String> {
    let (parent_path, index) = split_target(&operation.prosemirror_path)?;
    let parent = node_at_path_mut(document, parent_path)?;
    let children = parent.content.get_or_insert_with(Vec::new);
    let node = build_node(
        operation.node_type.as_deref().unwrap_or("paragraph"),
        operation.node_attrs.clone(),
        operation.content.as_deref().unwrap_or_default(),
    );
    // splice semantics: an index past the end appends
    let index = index.min(children.len());
    children.insert(index, node);
    Ok(())
}

fn delete_node(document: &mut DocNode, operation: &DocOperation) -> Result<(), String> {
    let (parent_path, index) = split_target(&operation.prosemirror_path)?;
    let parent = node_at_path_mut(document, parent_path)?;
    let children = parent
        .content
        .as_mut()
        .ok_or_else(|| "delete target parent has no children".to_string())?;
    if index >= children.len() {
        return Err(format!(
            "delete index {index} out of range ({} children)",
            children.len()
        ));
    }
    children.remove(index);
    Ok(())
}

fn replace_content(document: &mut DocNode, operation: &DocOperation) -> Result<(), String> {
    let content = operation.content.as_deref().unwrap_or_default();
    let target = node_at_path_mut(document, &operation.prosemirror_path)?;
    if target.text.is_some() {
        target.text = Some(content.to_string());
        return Ok(());
    }
    let text = parser::strip_block_marker(&target.node_type, content);
    target.content = Some(parser::inline_nodes(&text));
    Ok(())
}

fn modify_attrs(document: &mut DocNode, operation: &DocOperation) -> Result<(), String> {
    let updates = match &operation.node_attrs {
        Some(Value::Object(map)) => map.clone(),
        Some(_) => return Err("modify_node requires object-valued nodeAttrs".to_string()),
        None => return Err("modify_node carries no nodeAttrs".to_string()),
    };
    let target = node_at_path_mut(document, &operation.prosemirror_path)?;
    let attrs = target.attrs.get_or_insert_with(|| Value::Object(Map::new()));
    match attrs {
        Value::Object(existing) => {
            for (key, value) in updates {
                existing.insert(key, value);
            }
            Ok(())
        }
        _ => Err("target attrs are not an object".to_string()),
    }
}

// Node construction for inserts and replaces. The block marker implied by
// the node type is stripped before inline tokenization so a heading insert
// does not keep its `#` prefix as text.
fn build_node(node_type: &str, node_attrs: Option<Value>, raw: &str) -> DocNode {
    let mut node = match node_type {
        "heading" => {
            let title = parser::strip_block_marker("heading", raw);
            let attrs = node_attrs
                .clone()
                .unwrap_or_else(|| json!({ "level": parser::heading_level(raw).unwrap_or(1) }));
            DocNode::element("heading", parser::inline_nodes(&title)).with_attrs(attrs)
        }
        "bullet_list" | "ordered_list" => {
            let items = raw
                .split('\n')
                .map(|line| {
                    let text = parser::strip_block_marker("list_item", line);
                    DocNode::element(
                        "list_item",
                        vec![DocNode::element("paragraph", parser::inline_nodes(&text))],
                    )
                })
                .collect();
            DocNode::element(node_type, items)
        }
        "list_item" => {
            let text = parser::strip_block_marker("list_item", raw);
            DocNode::element(
                "list_item",
                vec![DocNode::element("paragraph", parser::inline_nodes(&text))],
            )
        }
        "blockquote" => {
            let paragraphs = raw
                .split('\n')
                .map(|line| {
                    let text = parser::strip_block_marker("blockquote", line);
                    DocNode::element("paragraph", parser::inline_nodes(&text))
                })
                .collect();
            DocNode::element("blockquote", paragraphs)
        }
        "code_block" => {
            let code = parser::strip_block_marker("code_block", raw);
            let content = if code.is_empty() {
                Vec::new()
            } else {
                vec![DocNode::text(code)]
            };
            DocNode::element("code_block", content)
        }
        "horizontal_rule" => DocNode::leaf("horizontal_rule"),
        "text" => DocNode::text(raw),
        _ => DocNode::element(node_type, parser::inline_nodes(raw)),
    };
    if node_attrs.is_some() && node.attrs.is_none() {
        node.attrs = node_attrs;
    }
    node
}
