use colored::Colorize;
use std::path::Path;

pub fn handle(file: Option<&Path>) -> anyhow::Result<()> {
    println!("{}", "スタックを検証中...".blue());

    let (path, loaded) = super::load(file)?;
    let stack = &loaded.stack;

    println!("スタックファイル: {}", path.display().to_string().cyan());
    println!("{}", "✓ スタックは正常です！".green().bold());
    println!();
    println!("サマリー: {}", stack.name.bold());
    println!("  リソース: {}個", loaded.graph.len());
    for (index, node) in loaded.graph.nodes() {
        let deps: Vec<&str> = loaded
            .graph
            .dependencies(index)
            .iter()
            .map(|&d| loaded.graph.node(d).name.as_str())
            .collect();
        let deps = if deps.is_empty() {
            String::new()
        } else {
            format!(" ← {}", deps.join(", "))
        };
        println!(
            "    - {} ({}, ウェーブ {}){}",
            node.name.cyan(),
            node.resource_type,
            loaded.plan.wave_of(index),
            deps.dimmed()
        );
    }
    println!("  ウェーブ: {}個", loaded.plan.len());
    if !stack.exports.is_empty() {
        println!("  エクスポート: {}個", stack.exports.len());
        for export in &stack.exports {
            println!("    - {} = {}", export.name.cyan(), export.reference);
        }
    }

    Ok(())
}
