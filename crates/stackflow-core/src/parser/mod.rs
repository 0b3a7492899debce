//! KDLパーサー
//!
//! スタックファイル（stack.kdl）をパースして [`Stack`] を生成します。

mod resource;

pub use resource::{parse_export, parse_resource, parse_schema};

use crate::error::{Result, StackError};
use crate::model::Stack;
use kdl::KdlDocument;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// KDLファイルをパースしてStackを生成
pub fn parse_stack_file<P: AsRef<Path>>(path: P) -> Result<Stack> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| StackError::ReadError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let name = path
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string();
    parse_stack_string(&content, name)
}

/// KDL文字列をパース
pub fn parse_stack_string(content: &str, default_name: String) -> Result<Stack> {
    let doc: KdlDocument = content.parse()?;

    let mut stack = Stack {
        name: default_name,
        ..Default::default()
    };
    let mut export_names = HashSet::new();

    for node in doc.nodes() {
        match node.name().value() {
            "stack" => {
                if let Some(name) = node.entries().first().and_then(|e| e.value().as_string()) {
                    stack.name = name.to_string();
                }
            }
            "resource" => {
                stack.declarations.push(parse_resource(node)?);
            }
            "schema" => {
                let (resource_type, outputs) = parse_schema(node)?;
                stack.schema.declare(resource_type, outputs);
            }
            "export" => {
                let export = parse_export(node)?;
                if !export_names.insert(export.name.clone()) {
                    return Err(StackError::DuplicateExport(export.name));
                }
                stack.exports.push(export);
            }
            other => {
                tracing::debug!("Ignoring unknown node '{}'", other);
            }
        }
    }

    tracing::debug!(
        resources = stack.declarations.len(),
        exports = stack.exports.len(),
        "Parsed stack '{}'",
        stack.name
    );
    Ok(stack)
}

#[cfg(test)]
mod tests;
