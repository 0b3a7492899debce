use colored::Colorize;
use stackflow_engine::{ActionType, ChangePlan, StateManager};
use std::path::Path;

pub async fn handle(file: Option<&Path>) -> anyhow::Result<()> {
    let (path, loaded) = super::load(file)?;
    let manager = StateManager::new(super::project_root(&path));
    let prior = manager.load().await?;

    let preview = ChangePlan::preview(&loaded.graph, &loaded.plan, &prior);

    println!("{}", format!("スタック '{}' の実行計画", loaded.stack.name).bold());
    println!();

    let mut current_wave: Option<Option<usize>> = None;
    for action in &preview.actions {
        if current_wave != Some(action.wave) {
            current_wave = Some(action.wave);
            match action.wave {
                Some(wave) => println!("{}", format!("ウェーブ {}", wave).bold()),
                None => println!("{}", "削除（最後に実行）".bold()),
            }
        }
        let symbol = match action.action_type {
            ActionType::Create => "+".green(),
            ActionType::Update => "~".yellow(),
            ActionType::Replace => "±".yellow(),
            ActionType::Delete => "-".red(),
            ActionType::NoOp => "=".dimmed(),
        };
        let mut line = format!("  {} {}", symbol, action.description);
        if let Some(changed) = action.details.get("changed").and_then(|v| v.as_array()) {
            let keys: Vec<String> = changed.iter().map(super::format_value).collect();
            line.push_str(&format!(" ({})", keys.join(", ")).dimmed().to_string());
        }
        if action.details.contains_key("inputs_known_after_apply") {
            line.push_str(&" (入力は適用後に確定)".dimmed().to_string());
        }
        println!("{}", line);
    }

    println!();
    if preview.has_changes {
        println!("計画: {}", preview.summary());
    } else {
        println!("{}", "変更はありません".green());
    }

    Ok(())
}
