use crate::types::{utf16_len, Block, BlockDiffKind, BlockDiffOp, ChangeKind, ContentChange};

// Structural equality for diff purposes. Line numbers are deliberately
// excluded so an unchanged block that merely shifted does not diff.
fn blocks_equal(a: &Block, b: &Block) -> bool {
    a.block_type == b.block_type && a.content == b.content && a.attrs == b.attrs
}

fn whole_block_change(original: &Block, modified: &Block) -> Vec<ContentChange> {
    if original.content == modified.content {
        return Vec::new();
    }
    let original_text = original.content.join("\n");
    let new_text = modified.content.join("\n");
    vec![ContentChange {
        change_type: ChangeKind::TextChange,
        position: 0,
        length: utf16_len(&original_text),
        original_text,
        new_text,
    }]
}

/// Linear two-pointer alignment of two block sequences. Once one side is
/// exhausted the remainder becomes pure inserts or deletes; before that,
/// same-position blocks compare as unchanged, modified (same type) or
/// replaced (type switch). A mid-sequence insertion therefore cascades into
/// replace operations rather than a single insert; that imprecision is part
/// of the output contract.
pub fn compute_block_diff(original: &[Block], modified: &[Block]) -> Vec<BlockDiffOp> {
    let mut operations: Vec<BlockDiffOp> = Vec::new();
    let mut i = 0;
    let mut j = 0;
    while i < original.len() || j < modified.len() {
        if i >= original.len() {
            operations.push(BlockDiffOp {
                op_type: BlockDiffKind::InsertBlock,
                position: j as u32,
                original_block: None,
                new_block: Some(modified[j].clone()),
                content_changes: None,
            });
            j += 1;
            continue;
        }
        if j >= modified.len() {
            operations.push(BlockDiffOp {
                op_type: BlockDiffKind::DeleteBlock,
                position: i as u32,
                original_block: Some(original[i].clone()),
                new_block: None,
                content_changes: None,
            });
            i += 1;
            continue;
        }
        let (old_block, new_block) = (&original[i], &modified[j]);
        if !blocks_equal(old_block, new_block) {
            if old_block.block_type == new_block.block_type {
                operations.push(BlockDiffOp {
                    op_type: BlockDiffKind::ModifyBlock,
                    position: i as u32,
                    original_block: Some(old_block.clone()),
                    new_block: Some(new_block.clone()),
                    content_changes: Some(whole_block_change(old_block, new_block)),
                });
            } else {
                operations.push(BlockDiffOp {
                    op_type: BlockDiffKind::ReplaceBlock,
                    position: i as u32,
                    original_block: Some(old_block.clone()),
                    new_block: Some(new_block.clone()),
                    content_changes: None,
                });
            }
        }
        i += 1;
        j += 1;
    }
    operations
}
