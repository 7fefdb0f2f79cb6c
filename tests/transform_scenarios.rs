use markdown_transform_rs::{
    engine, parser, serializer, DocNode, DocOpKind, SerializeOptions, TransformOptions,
    TransformRequest,
};
use serde_json::{json, Value};

fn tree_from(value: Value) -> DocNode {
    serde_json::from_value(value).unwrap()
}

fn hello_world_tree() -> DocNode {
    tree_from(json!({
        "type": "doc",
        "content": [
            {
                "type": "heading",
                "attrs": { "level": 1 },
                "content": [{ "type": "text", "text": "Hello" }]
            },
            {
                "type": "paragraph",
                "content": [{ "type": "text", "text": "World" }]
            }
        ]
    }))
}

fn root_children(document: &DocNode) -> &Vec<DocNode> {
    document.content.as_ref().unwrap()
}

fn text_of(node: &DocNode) -> String {
    match &node.text {
        Some(text) => text.clone(),
        None => node
            .content
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(text_of)
            .collect(),
    }
}

#[test]
fn appending_a_section_emits_a_single_insert() {
    let tree = hello_world_tree();
    let result = engine::transform(
        "# Hello\n\nWorld",
        "# Hello\n\nWorld\n\n## New Section",
        &tree,
        &TransformOptions::default(),
    );
    assert!(result.success);
    assert!(result.errors.is_empty());
    assert_eq!(result.operations.len(), 1);

    let op = serde_json::to_value(&result.operations[0]).unwrap();
    assert_eq!(op["type"], "insert_node");
    assert_eq!(op["prosemirrorPath"], json!([2]));
    assert_eq!(op["nodeType"], "heading");
    assert_eq!(op["nodeAttrs"]["level"], 2);
    assert_eq!(op["markdownPosition"], 16);
    assert!(op["content"].as_str().unwrap().contains("New Section"));

    let children = root_children(&result.new_document);
    assert_eq!(children.len(), 3);
    assert_eq!(children[2].node_type, "heading");
    assert_eq!(text_of(&children[2]), "New Section");
    assert_eq!(result.statistics.structural_changes, 1);
}

#[test]
fn editing_paragraph_text_emits_a_single_replace() {
    let tree = tree_from(json!({
        "type": "doc",
        "content": [
            {
                "type": "heading",
                "attrs": { "level": 1 },
                "content": [{ "type": "text", "text": "Title" }]
            },
            {
                "type": "paragraph",
                "content": [{ "type": "text", "text": "This is the old text." }]
            }
        ]
    }));
    let result = engine::transform(
        "# Title\n\nThis is the old text.",
        "# Title\n\nThis is the new text.",
        &tree,
        &TransformOptions::default(),
    );
    assert!(result.success);
    assert_eq!(result.operations.len(), 1);

    let op = serde_json::to_value(&result.operations[0]).unwrap();
    assert_eq!(op["type"], "replace");
    assert_eq!(op["prosemirrorPath"], json!([1]));
    assert_eq!(op["markdownPosition"], 9);
    assert_eq!(op["length"], 21);
    assert_eq!(op["originalContent"], "This is the old text.");
    assert_eq!(op["content"], "This is the new text.");

    let children = root_children(&result.new_document);
    assert_eq!(text_of(&children[1]), "This is the new text.");
    assert_eq!(result.statistics.text_changes, 1);
    assert_eq!(result.statistics.structural_changes, 0);
}

#[test]
fn block_type_change_lowers_to_delete_then_insert() {
    let tree = tree_from(json!({
        "type": "doc",
        "content": [
            {
                "type": "paragraph",
                "content": [{ "type": "text", "text": "Intro text" }]
            }
        ]
    }));
    let result = engine::transform(
        "Intro text",
        "# Intro text",
        &tree,
        &TransformOptions::default(),
    );
    assert!(result.success);
    assert_eq!(result.operations.len(), 2);
    assert_eq!(result.operations[0].op_type, DocOpKind::DeleteNode);
    assert_eq!(result.operations[1].op_type, DocOpKind::InsertNode);
    assert_eq!(result.operations[0].prosemirror_path, vec![0]);
    assert_eq!(result.operations[1].prosemirror_path, vec![0]);
    assert_eq!(result.statistics.structural_changes, 2);

    let children = root_children(&result.new_document);
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].node_type, "heading");
    assert_eq!(text_of(&children[0]), "Intro text");
}

#[test]
fn trees_without_content_are_rejected() {
    assert!(!engine::validate_document_tree(&json!({ "type": "doc" })));

    let tree = tree_from(json!({ "type": "doc" }));
    let result = engine::transform("a", "b", &tree, &TransformOptions::default());
    assert!(!result.success);
    assert!(!result.errors.is_empty());
    assert!(result.operations.is_empty());
    assert_eq!(result.new_document, tree);
}

#[tokio::test]
async fn batch_results_stay_positional_and_isolated() {
    let valid_tree = json!({
        "type": "doc",
        "content": [
            { "type": "paragraph", "content": [{ "type": "text", "text": "alpha" }] }
        ]
    });
    let requests = vec![
        TransformRequest {
            original_markdown: "alpha".into(),
            modified_markdown: "alpha beta".into(),
            original_tree: valid_tree.clone(),
            options: None,
        },
        TransformRequest {
            original_markdown: "alpha".into(),
            modified_markdown: "alpha beta".into(),
            original_tree: json!({ "type": "doc", "content": 42 }),
            options: None,
        },
        TransformRequest {
            original_markdown: "alpha".into(),
            modified_markdown: "alpha".into(),
            original_tree: valid_tree,
            options: None,
        },
    ];
    let results = engine::batch_transform(requests).await;
    assert_eq!(results.len(), 3);
    assert!(results[0].success);
    assert!(!results[1].success);
    assert!(!results[1].errors.is_empty());
    assert!(results[2].success);
    assert!(results[2].operations.is_empty());
}

#[test]
fn identical_revisions_are_a_no_op() {
    let source = "# Notes\n\nSome *styled* text\n\n- first\n- second\n\n```rust\nlet x = 1;\n```";
    let tree = parser::parse_markdown_to_document(source);
    let result = engine::transform(source, source, &tree, &TransformOptions::default());
    assert!(result.success);
    assert!(result.operations.is_empty());
    assert!(result.warnings.is_empty());
    assert_eq!(result.new_document, tree);
}

#[test]
fn serialize_then_parse_round_trips() {
    let source = "# Guide\n\nRead *this* and `that` via [docs](https://example.com)\n\n1. first\n2. second";
    let tree = parser::parse_markdown_to_document(source);
    let rendered = serializer::serialize_document(&tree, &SerializeOptions::default());
    assert_eq!(rendered, source);
    assert_eq!(parser::parse_markdown_to_document(&rendered), tree);
}

#[test]
fn mixed_edit_applies_all_operations_without_warnings() {
    let tree = tree_from(json!({
        "type": "doc",
        "content": [
            {
                "type": "heading",
                "attrs": { "level": 1 },
                "content": [{ "type": "text", "text": "A" }]
            },
            { "type": "paragraph", "content": [{ "type": "text", "text": "one" }] },
            { "type": "paragraph", "content": [{ "type": "text", "text": "two" }] }
        ]
    }));
    let result = engine::transform(
        "# A\n\none\n\ntwo",
        "# A\n\none!\n\ntwo\n\n- x\n- y",
        &tree,
        &TransformOptions::default(),
    );
    assert!(result.success);
    assert!(result.warnings.is_empty());
    assert_eq!(result.operations.len(), 2);

    let children = root_children(&result.new_document);
    assert_eq!(children.len(), 4);
    assert_eq!(text_of(&children[1]), "one!");
    assert_eq!(children[3].node_type, "bullet_list");
    assert_eq!(result.statistics.text_changes, 1);
    assert_eq!(result.statistics.structural_changes, 1);
}

#[tokio::test]
async fn binding_surface_accepts_camel_case_json() {
    let tree = json!({
        "type": "doc",
        "content": [
            {
                "type": "heading",
                "attrs": { "level": 1 },
                "content": [{ "type": "text", "text": "Hello" }]
            },
            {
                "type": "paragraph",
                "content": [{ "type": "text", "text": "World" }]
            }
        ]
    });
    let options = json!({ "handleStructuralChanges": true, "granularity": "block" });
    let result = markdown_transform_rs::transform(
        "# Hello\n\nWorld".into(),
        "# Hello\n\nWorld\n\n## New Section".into(),
        tree.clone(),
        Some(options),
    )
    .await
    .unwrap();
    assert_eq!(result["success"], json!(true));
    assert_eq!(result["operations"][0]["type"], "insert_node");
    assert_eq!(result["statistics"]["structuralChanges"], 1);

    let updated = markdown_transform_rs::transform_document(
        "# Hello\n\nWorld".into(),
        "# Hello\n\nWorld2".into(),
        tree,
        None,
    )
    .await
    .unwrap();
    assert_eq!(updated["content"][1]["content"][0]["text"], "World2");

    let rejected = markdown_transform_rs::transform_document(
        "".into(),
        "x".into(),
        json!({ "type": "doc", "content": [] }),
        None,
    )
    .await;
    assert!(rejected.is_err());
}

#[test]
fn syntax_validation_reports_unclosed_fences() {
    let report = markdown_transform_rs::validate_markdown_syntax("```rust\nlet x = 1;".into()).unwrap();
    assert_eq!(report["valid"], json!(false));
    assert!(report["error"].as_str().unwrap().contains("fence"));

    let clean = markdown_transform_rs::validate_markdown_syntax("# ok".into()).unwrap();
    assert_eq!(clean["valid"], json!(true));
}
