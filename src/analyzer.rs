use std::collections::HashMap;

use serde_json::Value;

use crate::types::{utf16_len, DocNode};

// Node types treated as block-level by the baseline analysis, applied at any
// depth. The depth-1 view used for position mapping adds the list containers
// so a list and its rows are not both counted.
const BLOCK_NODE_TYPES: [&str; 5] = ["paragraph", "heading", "list_item", "code_block", "blockquote"];
const TOP_LEVEL_BLOCK_TYPES: [&str; 7] = [
    "paragraph",
    "heading",
    "list_item",
    "code_block",
    "blockquote",
    "bullet_list",
    "ordered_list",
];

#[derive(Clone, Debug, PartialEq)]
pub struct NodeInfo {
    pub node_type: String,
    pub path: Vec<u32>,
    pub text_offset: u32,
    pub text_length: u32,
    pub attrs: Option<Value>,
    pub children: Vec<Vec<u32>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextPosition {
    pub path: Vec<u32>,
    pub start: u32,
    pub end: u32,
    pub text: String,
}

#[derive(Clone, Debug, Default)]
pub struct DocumentAnalysis {
    pub node_map: HashMap<String, NodeInfo>,
    pub text_positions: Vec<TextPosition>,
    pub block_structure: Vec<NodeInfo>,
}

pub fn path_key(path: &[u32]) -> String {
    path.iter()
        .map(|index| index.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

/// Indexes every node reachable from the root in one traversal, threading a
/// running flattened-text offset counted in UTF-16 code units.
pub fn analyze_document(tree: &DocNode) -> DocumentAnalysis {
    let mut analysis = DocumentAnalysis::default();
    analyze_node(tree, Vec::new(), 0, &mut analysis);
    analysis
}

fn analyze_node(
    node: &DocNode,
    path: Vec<u32>,
    offset: u32,
    analysis: &mut DocumentAnalysis,
) -> (NodeInfo, u32) {
    let mut children: Vec<Vec<u32>> = Vec::new();
    let mut next_offset = offset;
    if let Some(text) = &node.text {
        let length = utf16_len(text);
        analysis.text_positions.push(TextPosition {
            path: path.clone(),
            start: offset,
            end: offset + length,
            text: text.clone(),
        });
        next_offset += length;
    } else if let Some(content) = &node.content {
        for (index, child) in content.iter().enumerate() {
            let mut child_path = path.clone();
            child_path.push(index as u32);
            children.push(child_path.clone());
            let (_, advanced) = analyze_node(child, child_path, next_offset, analysis);
            next_offset = advanced;
        }
    }
    let info = NodeInfo {
        node_type: node.node_type.clone(),
        path: path.clone(),
        text_offset: offset,
        text_length: next_offset - offset,
        attrs: node.attrs.clone(),
        children,
    };
    analysis.node_map.insert(path_key(&path), info.clone());
    if BLOCK_NODE_TYPES.contains(&info.node_type.as_str()) {
        analysis.block_structure.push(info.clone());
    }
    (info, next_offset)
}

/// Block-level view restricted to the root's direct children, in child order.
pub fn block_structure_at_depth1(tree: &DocNode) -> Vec<NodeInfo> {
    let Some(content) = &tree.content else {
        return Vec::new();
    };
    let analysis = analyze_document(tree);
    (0..content.len() as u32)
        .filter_map(|index| analysis.node_map.get(&path_key(&[index])).cloned())
        .filter(|info| TOP_LEVEL_BLOCK_TYPES.contains(&info.node_type.as_str()))
        .collect()
}

pub fn node_at_path<'a>(root: &'a DocNode, path: &[u32]) -> Option<&'a DocNode> {
    let mut node = root;
    for &index in path {
        node = node.content.as_ref()?.get(index as usize)?;
    }
    Some(node)
}

/// Depth-first concatenation of every text leaf under `node`.
pub fn flatten_node_text(node: &DocNode) -> String {
    let mut flattened = String::new();
    collect_text(node, &mut flattened);
    flattened
}

fn collect_text(node: &DocNode, flattened: &mut String) {
    if let Some(text) = &node.text {
        flattened.push_str(text);
    }
    if let Some(content) = &node.content {
        for child in content {
            collect_text(child, flattened);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_tree() -> DocNode {
        DocNode::doc(vec![
            DocNode::element("heading", vec![DocNode::text("Hello")]).with_attrs(json!({ "level": 1 })),
            DocNode::element(
                "bullet_list",
                vec![DocNode::element(
                    "list_item",
                    vec![DocNode::element("paragraph", vec![DocNode::text("item")])],
                )],
            ),
            DocNode::element("paragraph", vec![DocNode::text("World")]),
        ])
    }

    #[test]
    fn every_node_gets_one_map_entry_keyed_by_dot_path() {
        let analysis = analyze_document(&sample_tree());
        // doc + 3 children + list_item + its paragraph + 3 text leaves
        assert_eq!(analysis.node_map.len(), 9);
        assert!(analysis.node_map.contains_key(""));
        assert!(analysis.node_map.contains_key("1.0.0"));
        assert_eq!(analysis.node_map[""].node_type, "doc");
    }

    #[test]
    fn offsets_accumulate_across_text_leaves() {
        let analysis = analyze_document(&sample_tree());
        assert_eq!(analysis.text_positions.len(), 3);
        assert_eq!(analysis.text_positions[0].start, 0);
        assert_eq!(analysis.text_positions[0].end, 5);
        assert_eq!(analysis.text_positions[1].start, 5);
        assert_eq!(analysis.text_positions[1].end, 9);
        assert_eq!(analysis.text_positions[2].text, "World");
        assert_eq!(analysis.node_map[""].text_length, 14);
        assert_eq!(analysis.node_map["2"].text_offset, 9);
    }

    #[test]
    fn offsets_count_utf16_code_units() {
        let tree = DocNode::doc(vec![
            DocNode::element("paragraph", vec![DocNode::text("😀")]),
            DocNode::element("paragraph", vec![DocNode::text("x")]),
        ]);
        let analysis = analyze_document(&tree);
        assert_eq!(analysis.node_map["0"].text_length, 2);
        assert_eq!(analysis.node_map["1"].text_offset, 2);
    }

    #[test]
    fn baseline_block_structure_collects_any_depth_post_order() {
        let analysis = analyze_document(&sample_tree());
        let kinds: Vec<&str> = analysis
            .block_structure
            .iter()
            .map(|info| info.node_type.as_str())
            .collect();
        // nested paragraph closes before its list_item; lists themselves
        // are not in the baseline set
        assert_eq!(kinds, vec!["heading", "paragraph", "list_item", "paragraph"]);
    }

    #[test]
    fn depth1_structure_keeps_list_containers_in_child_order() {
        let blocks = block_structure_at_depth1(&sample_tree());
        let kinds: Vec<&str> = blocks.iter().map(|info| info.node_type.as_str()).collect();
        assert_eq!(kinds, vec!["heading", "bullet_list", "paragraph"]);
        assert_eq!(blocks[1].path, vec![1]);
    }

    #[test]
    fn children_paths_record_direct_children_only() {
        let analysis = analyze_document(&sample_tree());
        let root = &analysis.node_map[""];
        assert_eq!(root.children, vec![vec![0], vec![1], vec![2]]);
        let leaf = &analysis.node_map["0.0"];
        assert!(leaf.children.is_empty());
    }

    #[test]
    fn path_resolution_and_text_flattening_agree() {
        let tree = sample_tree();
        let list = node_at_path(&tree, &[1]).unwrap();
        assert_eq!(list.node_type, "bullet_list");
        assert_eq!(flatten_node_text(list), "item");
        assert!(node_at_path(&tree, &[4]).is_none());
        assert!(node_at_path(&tree, &[0, 0, 0]).is_none());
    }
}
