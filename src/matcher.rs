use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::analyzer::{self, NodeInfo};
use crate::types::{Block, BlockType, DocNode};

const MATCH_THRESHOLD: f64 = 0.7;
const TYPE_WEIGHT: f64 = 0.5;
const TEXT_WEIGHT: f64 = 0.4;
const LENGTH_WEIGHT: f64 = 0.1;

static MARKDOWN_LINK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").unwrap());
static MARKDOWN_SYNTAX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)(\*\*|\*|`|^#{1,6}\s+|^\s*[-+]\s+|^\s*\d+\.\s+|^\s*>\s?)").unwrap());

fn strip_markdown(text: &str) -> String {
    let without_links = MARKDOWN_LINK_RE.replace_all(text, "$1");
    MARKDOWN_SYNTAX_RE.replace_all(&without_links, "").into_owned()
}

fn normalize(text: &str) -> String {
    strip_markdown(text).to_lowercase()
}

fn levenshtein_distance(a: &[u16], b: &[u16]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];
    for (i, &unit_a) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, &unit_b) in b.iter().enumerate() {
            let cost = if unit_a == unit_b { 0 } else { 1 };
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

// Both inputs are already normalized. Exact match and containment get fixed
// scores; everything else decays with edit distance over UTF-16 units.
fn text_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a.contains(b) || b.contains(a) {
        return 0.8;
    }
    let units_a: Vec<u16> = a.encode_utf16().collect();
    let units_b: Vec<u16> = b.encode_utf16().collect();
    let max_len = units_a.len().max(units_b.len());
    let distance = levenshtein_distance(&units_a, &units_b);
    1.0 - distance as f64 / max_len as f64
}

fn length_similarity(a: usize, b: usize) -> f64 {
    let max = a.max(b);
    if max == 0 {
        return 1.0;
    }
    a.min(b) as f64 / max as f64
}

fn type_compatibility(block_type: BlockType, node_type: &str) -> f64 {
    if node_type == block_type.as_str() {
        return 1.0;
    }
    match block_type {
        BlockType::ListItem if node_type == "bullet_list" || node_type == "ordered_list" => 0.8,
        _ => 0.0,
    }
}

/// Aligns markdown blocks with the tree's depth-1 block nodes. Equal counts
/// map positionally; otherwise each block greedily claims the best unused
/// candidate scoring above the acceptance threshold. Unmatched blocks simply
/// get no entry.
pub fn build_block_mapping(blocks: &[Block], tree: &DocNode) -> HashMap<usize, NodeInfo> {
    let tree_blocks = analyzer::block_structure_at_depth1(tree);
    let mut mapping = HashMap::new();
    if blocks.len() == tree_blocks.len() {
        for (index, info) in tree_blocks.into_iter().enumerate() {
            mapping.insert(index, info);
        }
        return mapping;
    }

    let candidates: Vec<(NodeInfo, String)> = tree_blocks
        .into_iter()
        .map(|info| {
            let text = analyzer::node_at_path(tree, &info.path)
                .map(analyzer::flatten_node_text)
                .unwrap_or_default();
            let normalized = normalize(&text);
            (info, normalized)
        })
        .collect();
    let mut used = vec![false; candidates.len()];

    for (index, block) in blocks.iter().enumerate() {
        let block_text = normalize(&block.content.join("\n"));
        let mut best: Option<(usize, f64)> = None;
        for (candidate_index, (info, candidate_text)) in candidates.iter().enumerate() {
            if used[candidate_index] {
                continue;
            }
            let type_score = type_compatibility(block.block_type, &info.node_type);
            if type_score == 0.0 {
                continue;
            }
            let text_score = text_similarity(&block_text, candidate_text);
            let length_score = length_similarity(
                block_text.encode_utf16().count(),
                candidate_text.encode_utf16().count(),
            );
            let score = TYPE_WEIGHT * type_score + TEXT_WEIGHT * text_score + LENGTH_WEIGHT * length_score;
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((candidate_index, score));
            }
        }
        if let Some((candidate_index, score)) = best {
            if score > MATCH_THRESHOLD {
                used[candidate_index] = true;
                mapping.insert(index, candidates[candidate_index].0.clone());
            }
        }
    }
    mapping
}
