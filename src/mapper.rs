use std::collections::HashMap;

use crate::analyzer::{self, NodeInfo};
use crate::matcher;
use crate::types::{utf16_len, Block, BlockDiffKind, BlockDiffOp, BlockType, DocNode, DocOperation};

#[derive(Clone, Debug, Default)]
pub struct MappedOperations {
    pub operations: Vec<DocOperation>,
    pub warnings: Vec<String>,
}

// Fixed block-type to node-type lookup used when constructing inserts.
fn node_type_for(block_type: BlockType) -> &'static str {
    match block_type {
        BlockType::Heading => "heading",
        BlockType::CodeBlock => "code_block",
        BlockType::Blockquote => "blockquote",
        BlockType::ListItem => "bullet_list",
        BlockType::HorizontalRule => "horizontal_rule",
        BlockType::Paragraph | BlockType::Empty => "paragraph",
    }
}

// Character offset of a line start, in UTF-16 units, one per newline.
fn line_offset(source: &str, line: u32) -> u32 {
    source
        .split('\n')
        .take(line as usize)
        .map(|source_line| utf16_len(source_line) + 1)
        .sum()
}

fn target_path(
    mapping: &HashMap<usize, NodeInfo>,
    fallback: &[NodeInfo],
    position: usize,
) -> Option<Vec<u32>> {
    mapping
        .get(&position)
        .map(|info| info.path.clone())
        .or_else(|| fallback.get(position).map(|info| info.path.clone()))
}

fn insert_for_block(block: &Block, position: usize, modified_markdown: &str) -> DocOperation {
    DocOperation::insert_node(
        line_offset(modified_markdown, block.start_line),
        vec![position as u32],
        block.content.join("\n"),
        node_type_for(block.block_type).to_string(),
        block.attrs.clone(),
    )
}

/// Lowers block-diff operations into path-addressed tree operations.
/// Deletes and modifies resolve their target through the block mapping of
/// the original markdown onto the tree, falling back to the depth-1 block
/// at the same position; a block with no target is skipped with a warning.
/// A replace decomposes into delete-then-insert, never an atomic swap.
pub fn map_diff_to_operations(
    block_diff: &[BlockDiffOp],
    tree: &DocNode,
    original_blocks: &[Block],
    original_markdown: &str,
    modified_markdown: &str,
) -> MappedOperations {
    let mapping = matcher::build_block_mapping(original_blocks, tree);
    let fallback = analyzer::block_structure_at_depth1(tree);
    let mut mapped = MappedOperations::default();

    for op in block_diff {
        let position = op.position as usize;
        match op.op_type {
            BlockDiffKind::InsertBlock => {
                let Some(block) = &op.new_block else {
                    mapped.warnings.push(format!("insert_block at {position} has no block payload"));
                    continue;
                };
                mapped.operations.push(insert_for_block(block, position, modified_markdown));
            }
            BlockDiffKind::DeleteBlock => {
                let Some(block) = &op.original_block else {
                    mapped.warnings.push(format!("delete_block at {position} has no block payload"));
                    continue;
                };
                let Some(path) = target_path(&mapping, &fallback, position) else {
                    mapped.warnings.push(format!(
                        "delete_block at {position}: no tree block to target; operation skipped"
                    ));
                    continue;
                };
                mapped.operations.push(DocOperation::delete_node(
                    line_offset(original_markdown, block.start_line),
                    path,
                    Some(block.content.join("\n")),
                ));
            }
            BlockDiffKind::ModifyBlock => {
                let (Some(original_block), Some(new_block)) = (&op.original_block, &op.new_block) else {
                    mapped.warnings.push(format!("modify_block at {position} has no block payload"));
                    continue;
                };
                let Some(path) = target_path(&mapping, &fallback, position) else {
                    mapped.warnings.push(format!(
                        "modify_block at {position}: no tree block to target; operation skipped"
                    ));
                    continue;
                };
                let block_offset = line_offset(original_markdown, original_block.start_line);
                for change in op.content_changes.iter().flatten() {
                    mapped.operations.push(DocOperation::replace(
                        block_offset + change.position,
                        path.clone(),
                        change.length,
                        change.original_text.clone(),
                        change.new_text.clone(),
                    ));
                }
                if original_block.attrs != new_block.attrs {
                    if let Some(attrs) = &new_block.attrs {
                        mapped
                            .operations
                            .push(DocOperation::modify_node(block_offset, path, attrs.clone()));
                    }
                }
            }
            BlockDiffKind::ReplaceBlock => {
                let (Some(original_block), Some(new_block)) = (&op.original_block, &op.new_block) else {
                    mapped.warnings.push(format!("replace_block at {position} has no block payload"));
                    continue;
                };
                let Some(path) = target_path(&mapping, &fallback, position) else {
                    mapped.warnings.push(format!(
                        "replace_block at {position}: no tree block to target; operation skipped"
                    ));
                    continue;
                };
                mapped.operations.push(DocOperation::delete_node(
                    line_offset(original_markdown, original_block.start_line),
                    path,
                    Some(original_block.content.join("\n")),
                ));
                mapped
                    .operations
                    .push(insert_for_block(new_block, position, modified_markdown));
            }
        }
    }
    mapped
}
