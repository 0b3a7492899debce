//! resource / schema / export ノードのパース

use crate::error::{Result, StackError};
use crate::model::Export;
use kdl::{KdlNode, KdlValue};
use serde_json::{Map, Value};
use stackflow_engine::{Declaration, InputValue, Reference};

/// 最初の引数（名前なしエントリ）を文字列として取得
fn first_argument<'a>(node: &'a KdlNode) -> Option<&'a str> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
}

/// 名前付きプロパティを取得
fn property<'a>(node: &'a KdlNode, key: &str) -> Option<&'a KdlValue> {
    node.entries()
        .iter()
        .find(|e| e.name().map(|n| n.value()) == Some(key))
        .map(|e| e.value())
}

/// ref="target.output" をパース
fn parse_reference(value: &KdlValue, context: impl Into<String>) -> Result<Reference> {
    let raw = value.as_string().unwrap_or_default();
    Reference::parse(raw).ok_or_else(|| StackError::InvalidReference {
        context: context.into(),
        reference: raw.to_string(),
    })
}

/// KDLの値をJSONに変換
fn to_json(value: &KdlValue) -> Result<Value> {
    Ok(match value {
        KdlValue::String(s) => Value::String(s.clone()),
        KdlValue::Integer(i) => {
            let i = i64::try_from(*i).map_err(|_| {
                StackError::InvalidConfig(format!("整数が大きすぎます: {}", i))
            })?;
            Value::from(i)
        }
        KdlValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .ok_or_else(|| StackError::InvalidConfig(format!("無効な浮動小数点数: {}", f)))?,
        KdlValue::Bool(b) => Value::Bool(*b),
        KdlValue::Null => Value::Null,
    })
}

/// プロパティノードをリテラル値に変換
///
/// 引数1つはスカラー、複数は配列、子ブロックはオブジェクトになる。
fn parse_literal(node: &KdlNode, context: &str) -> Result<Value> {
    let args: Vec<&KdlValue> = node
        .entries()
        .iter()
        .filter(|e| e.name().is_none())
        .map(|e| e.value())
        .collect();

    match (args.as_slice(), node.children()) {
        ([], Some(children)) => {
            let mut object = Map::new();
            for child in children.nodes() {
                let key = child.name().value();
                if property(child, "ref").is_some() {
                    return Err(StackError::InvalidConfig(format!(
                        "{}.{}: ref はトップレベルのプロパティでのみ使用できます",
                        context, key
                    )));
                }
                let value = parse_literal(child, &format!("{}.{}", context, key))?;
                object.insert(key.to_string(), value);
            }
            Ok(Value::Object(object))
        }
        ([], None) => Err(StackError::InvalidConfig(format!(
            "{} に値が指定されていません",
            context
        ))),
        (_, Some(_)) => Err(StackError::InvalidConfig(format!(
            "{}: 引数と子ブロックは同時に指定できません",
            context
        ))),
        ([single], None) => to_json(single),
        (many, None) => Ok(Value::Array(
            many.iter().map(|v| to_json(v)).collect::<Result<Vec<_>>>()?,
        )),
    }
}

/// resource ノードをパース
pub fn parse_resource(node: &KdlNode) -> Result<Declaration> {
    let name = first_argument(node)
        .ok_or_else(|| StackError::InvalidConfig("resource requires a name".to_string()))?
        .to_string();
    let resource_type = property(node, "type")
        .and_then(|v| v.as_string())
        .ok_or_else(|| {
            StackError::InvalidConfig(format!("resource '{}' requires type=\"...\"", name))
        })?
        .to_string();

    let mut decl = Declaration::new(name.clone(), resource_type);

    if let Some(children) = node.children() {
        for child in children.nodes() {
            let key = child.name().value().to_string();
            let context = format!("{}.{}", name, key);

            let value = match property(child, "ref") {
                Some(_) if child.entries().iter().any(|e| e.name().is_none())
                    || child.children().is_some() =>
                {
                    return Err(StackError::InvalidConfig(format!(
                        "{}: ref と値は同時に指定できません",
                        context
                    )));
                }
                Some(raw) => InputValue::Reference(parse_reference(raw, context)?),
                None => InputValue::Literal(parse_literal(child, &context)?),
            };

            if decl.inputs.insert(key.clone(), value).is_some() {
                return Err(StackError::InvalidConfig(format!(
                    "resource '{}' のプロパティ '{}' が重複しています",
                    name, key
                )));
            }
        }
    }

    Ok(decl)
}

/// schema ノードをパース
///
/// 例: `schema "vps" { outputs "id" "public_ip" }`
pub fn parse_schema(node: &KdlNode) -> Result<(String, Vec<String>)> {
    let resource_type = first_argument(node)
        .ok_or_else(|| StackError::InvalidConfig("schema requires a type".to_string()))?
        .to_string();

    let mut outputs = Vec::new();
    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "outputs" | "output" => {
                    for entry in child.entries().iter().filter(|e| e.name().is_none()) {
                        let key = entry.value().as_string().ok_or_else(|| {
                            StackError::InvalidConfig(format!(
                                "schema '{}' の出力名は文字列で指定してください",
                                resource_type
                            ))
                        })?;
                        outputs.push(key.to_string());
                    }
                }
                other => {
                    tracing::debug!("Ignoring unknown schema entry '{}'", other);
                }
            }
        }
    }

    Ok((resource_type, outputs))
}

/// export ノードをパース
pub fn parse_export(node: &KdlNode) -> Result<Export> {
    let name = first_argument(node)
        .ok_or_else(|| StackError::InvalidConfig("export requires a name".to_string()))?
        .to_string();
    let raw = property(node, "ref").ok_or_else(|| {
        StackError::InvalidConfig(format!("export '{}' requires ref=\"...\"", name))
    })?;
    let reference = parse_reference(raw, format!("export {}", name))?;
    Ok(Export { name, reference })
}
