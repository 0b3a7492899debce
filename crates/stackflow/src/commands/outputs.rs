use colored::Colorize;
use stackflow_engine::{ResourceStatus, StateManager};
use std::path::Path;

pub async fn handle(file: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let (path, loaded) = super::load(file)?;
    let state = StateManager::new(super::project_root(&path)).load().await?;

    let values: Vec<(&str, Option<&serde_json::Value>)> = loaded
        .stack
        .exports
        .iter()
        .map(|export| {
            let value = state
                .get(&export.reference.target)
                // 失敗したリソースの部分的な出力は使わない
                .filter(|r| r.status == ResourceStatus::Active)
                .and_then(|r| r.outputs.get(&export.reference.output));
            (export.name.as_str(), value)
        })
        .collect();

    if json {
        let object: serde_json::Map<String, serde_json::Value> = values
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    value.cloned().unwrap_or(serde_json::Value::Null),
                )
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&object)?);
        return Ok(());
    }

    if values.is_empty() {
        println!("{}", "エクスポートは定義されていません".yellow());
        return Ok(());
    }
    for (name, value) in values {
        let value = value
            .map(super::format_value)
            .unwrap_or_else(|| "(未適用)".dimmed().to_string());
        println!("{} = {}", name.cyan(), value);
    }
    Ok(())
}
