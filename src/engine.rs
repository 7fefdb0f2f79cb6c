use futures_util::future::join_all;
use serde_json::Value;

use crate::applier;
use crate::differ;
use crate::mapper;
use crate::parser;
use crate::types::{
    Block, BlockDiffKind, BlockType, DocNode, DocOpKind, DocOperation, TransformError,
    TransformOptions, TransformRequest, TransformResult, TransformStatistics,
};

// Blank separators never reach the differ. Dropping them keeps block
// positions aligned with the depth-1 children of the document tree.
fn significant_blocks(blocks: Vec<Block>) -> Vec<Block> {
    blocks
        .into_iter()
        .filter(|block| block.block_type != BlockType::Empty)
        .collect()
}

fn compute_statistics(operations: &[DocOperation]) -> TransformStatistics {
    let mut statistics = TransformStatistics::default();
    for operation in operations {
        match operation.op_type {
            DocOpKind::Replace => {
                statistics.text_changes += 1;
                statistics.nodes_modified += 1;
            }
            DocOpKind::InsertNode | DocOpKind::DeleteNode => statistics.structural_changes += 1,
            DocOpKind::ModifyNode => statistics.nodes_modified += 1,
        }
    }
    statistics
}

/// Structural sanity check for trees arriving as raw JSON: the root must be
/// a `doc` node carrying a content array.
pub fn validate_document_tree(tree: &Value) -> bool {
    tree.get("type").and_then(Value::as_str) == Some("doc")
        && tree.get("content").is_some_and(Value::is_array)
}

/// Diffs two markdown revisions and applies the resulting operations to
/// `tree`. Always returns a result; validation failures come back with
/// `success: false` and the input tree untouched, and per-operation problems
/// surface as warnings rather than aborting the batch of edits.
pub fn transform(
    original_markdown: &str,
    modified_markdown: &str,
    tree: &DocNode,
    options: &TransformOptions,
) -> TransformResult {
    if original_markdown.trim().is_empty() {
        let error = TransformError::EmptyMarkdown { side: "original" };
        return TransformResult::failure(tree.clone(), vec![error.to_string()]);
    }
    if modified_markdown.trim().is_empty() {
        let error = TransformError::EmptyMarkdown { side: "modified" };
        return TransformResult::failure(tree.clone(), vec![error.to_string()]);
    }
    if tree.node_type != "doc" || tree.content.is_none() {
        return TransformResult::failure(tree.clone(), vec![TransformError::InvalidDocument.to_string()]);
    }

    let original_blocks = significant_blocks(parser::parse_to_blocks(original_markdown));
    let modified_blocks = significant_blocks(parser::parse_to_blocks(modified_markdown));
    let mut block_diff = differ::compute_block_diff(&original_blocks, &modified_blocks);

    let mut warnings = Vec::new();
    if !options.handle_structural_changes {
        let before = block_diff.len();
        block_diff.retain(|op| op.op_type == BlockDiffKind::ModifyBlock);
        let dropped = before - block_diff.len();
        if dropped > 0 {
            warnings.push(format!(
                "structural changes disabled: dropped {dropped} block operation(s)"
            ));
        }
    }

    let mapped = mapper::map_diff_to_operations(
        &block_diff,
        tree,
        &original_blocks,
        original_markdown,
        modified_markdown,
    );
    warnings.extend(mapped.warnings);

    let outcome = applier::apply_operations(tree, &mapped.operations);
    for skip in &outcome.skipped {
        warnings.push(format!("operation {} skipped: {}", skip.index, skip.reason));
    }

    let statistics = compute_statistics(&mapped.operations);
    TransformResult {
        success: true,
        new_document: outcome.document,
        operations: mapped.operations,
        errors: Vec::new(),
        warnings,
        statistics,
    }
}

/// Convenience wrapper returning only the updated tree.
pub fn transform_document(
    original_markdown: &str,
    modified_markdown: &str,
    tree: &DocNode,
    options: &TransformOptions,
) -> Result<DocNode, TransformError> {
    let result = transform(original_markdown, modified_markdown, tree, options);
    if result.success {
        Ok(result.new_document)
    } else {
        Err(TransformError::Failed(result.errors.join("; ")))
    }
}

/// Runs independent transform requests on blocking worker threads. One bad
/// request never poisons the rest; its slot carries a failed result instead.
pub async fn batch_transform(requests: Vec<TransformRequest>) -> Vec<TransformResult> {
    let tasks = requests.into_iter().map(|request| {
        tokio::task::spawn_blocking(move || {
            let options = request.options.unwrap_or_default();
            match serde_json::from_value::<DocNode>(request.original_tree) {
                Ok(tree) => transform(
                    &request.original_markdown,
                    &request.modified_markdown,
                    &tree,
                    &options,
                ),
                Err(error) => TransformResult::failure(
                    DocNode::doc(Vec::new()),
                    vec![format!("invalid document tree: {error}")],
                ),
            }
        })
    });
    join_all(tasks)
        .await
        .into_iter()
        .map(|joined| match joined {
            Ok(result) => result,
            Err(error) => TransformResult::failure(
                DocNode::doc(Vec::new()),
                vec![format!("batch task failed: {error}")],
            ),
        })
        .collect()
}
