pub mod analyzer;
pub mod applier;
pub mod differ;
pub mod engine;
pub mod mapper;
pub mod matcher;
pub mod parser;
pub mod serializer;
pub mod types;

use napi::bindgen_prelude::Result as NapiResult;
use napi_derive::napi;
use serde::de::DeserializeOwned;
use serde_json::Value;

fn to_napi_error(error: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(error.to_string())
}

fn parse_input<T: DeserializeOwned>(value: Value, label: &str) -> NapiResult<T> {
    serde_json::from_value(value).map_err(|error| to_napi_error(format!("Invalid {label}: {error}")))
}

fn parse_options(options: Option<Value>) -> NapiResult<types::TransformOptions> {
    match options {
        Some(value) => parse_input(value, "transform options"),
        None => Ok(types::TransformOptions::default()),
    }
}

#[napi]
pub async fn transform(
    original_markdown: String,
    modified_markdown: String,
    original_tree: Value,
    options: Option<Value>,
) -> NapiResult<Value> {
    let tree = parse_input::<types::DocNode>(original_tree, "document tree")?;
    let options = parse_options(options)?;
    let result = tokio::task::spawn_blocking(move || {
        engine::transform(&original_markdown, &modified_markdown, &tree, &options)
    })
    .await
    .map_err(to_napi_error)?;
    serde_json::to_value(result).map_err(to_napi_error)
}

#[napi(js_name = "transformDocument")]
pub async fn transform_document(
    original_markdown: String,
    modified_markdown: String,
    original_tree: Value,
    options: Option<Value>,
) -> NapiResult<Value> {
    let tree = parse_input::<types::DocNode>(original_tree, "document tree")?;
    let options = parse_options(options)?;
    let updated = tokio::task::spawn_blocking(move || {
        engine::transform_document(&original_markdown, &modified_markdown, &tree, &options)
    })
    .await
    .map_err(to_napi_error)?
    .map_err(to_napi_error)?;
    serde_json::to_value(updated).map_err(to_napi_error)
}

#[napi(js_name = "batchTransform")]
pub async fn batch_transform(requests: Vec<Value>) -> NapiResult<Value> {
    let mut parsed = Vec::with_capacity(requests.len());
    for request in requests {
        parsed.push(parse_input::<types::TransformRequest>(request, "transform request")?);
    }
    let results = engine::batch_transform(parsed).await;
    serde_json::to_value(results).map_err(to_napi_error)
}

#[napi(js_name = "validateDocumentTree")]
pub fn validate_document_tree(tree: Value) -> bool {
    engine::validate_document_tree(&tree)
}

#[napi(js_name = "parseMarkdownToDocument")]
pub fn parse_markdown_to_document(markdown: String) -> NapiResult<Value> {
    serde_json::to_value(parser::parse_markdown_to_document(&markdown)).map_err(to_napi_error)
}

#[napi(js_name = "serializeDocument")]
pub fn serialize_document(tree: Value, options: Option<Value>) -> NapiResult<String> {
    let tree = parse_input::<types::DocNode>(tree, "document tree")?;
    let options = match options {
        Some(value) => parse_input::<types::SerializeOptions>(value, "serialize options")?,
        None => types::SerializeOptions::default(),
    };
    Ok(serializer::serialize_document(&tree, &options))
}

#[napi(js_name = "validateMarkdownSyntax")]
pub fn validate_markdown_syntax(markdown: String) -> NapiResult<Value> {
    serde_json::to_value(parser::validate_markdown_syntax(&markdown)).map_err(to_napi_error)
}

#[napi(js_name = "parseToBlocks")]
pub fn parse_to_blocks(markdown: String) -> NapiResult<Value> {
    serde_json::to_value(parser::parse_to_blocks(&markdown)).map_err(to_napi_error)
}

pub use types::*;
