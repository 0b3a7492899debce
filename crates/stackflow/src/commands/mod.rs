pub mod down;
pub mod outputs;
pub mod plan;
pub mod up;
pub mod validate;

use anyhow::Context;
use colored::Colorize;
use stackflow_cloud_http::{HttpProvider, HttpProviderConfig};
use stackflow_config::Settings;
use stackflow_core::LoadedStack;
use stackflow_engine::{
    EvaluationReport, NodeOutcome, ResourceProvider, ResourceSchema, SimulatedProvider,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// -f で指定されたファイル、なければ探索結果
pub fn resolve_stack_path(file: Option<&Path>) -> anyhow::Result<PathBuf> {
    match file {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(stackflow_config::find_stack_file()?),
    }
}

/// スタックファイルを読み込んで検証
pub fn load(file: Option<&Path>) -> anyhow::Result<(PathBuf, LoadedStack)> {
    let path = resolve_stack_path(file)?;
    let loaded = stackflow_core::load_stack(&path)
        .with_context(|| format!("スタックの読み込みに失敗しました: {}", path.display()))?;
    Ok((path, loaded))
}

/// 状態ディレクトリ (.stackflow/) を置くプロジェクトルート
pub fn project_root(stack_path: &Path) -> PathBuf {
    let parent = stack_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    // .stackflow/stack.kdl の場合はその親
    if parent.file_name().and_then(|n| n.to_str()) == Some(stackflow_config::PROJECT_DIR) {
        parent.parent().unwrap_or(Path::new(".")).to_path_buf()
    } else {
        parent.to_path_buf()
    }
}

/// 実行に使うプロバイダーを構築
pub fn build_provider(
    settings: &Settings,
    dry_run: bool,
    schema: ResourceSchema,
) -> anyhow::Result<Arc<dyn ResourceProvider>> {
    if dry_run {
        return Ok(Arc::new(SimulatedProvider::new(schema)));
    }
    let config = HttpProviderConfig::new(
        settings.provider.base_url.clone(),
        settings.provider.api_token.clone(),
    )
    .with_timeout(Duration::from_secs(settings.provider.timeout_secs));
    let provider = HttpProvider::new(config)?;
    tracing::debug!("Using provider at {}", provider.base_url());
    Ok(Arc::new(provider))
}

/// Ctrl-C でキャンセルされるトークン
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let on_signal = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!();
            eprintln!(
                "{}",
                "⚠ 中断を受け付けました。実行中のリソースの完了を待っています...".yellow()
            );
            on_signal.cancel();
        }
    });
    token
}

/// JSON値を表示用の文字列に
pub fn format_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 評価結果をウェーブごとに表示
pub fn print_report(report: &EvaluationReport) {
    for (wave, names) in report.waves.iter().enumerate() {
        println!("{}", format!("ウェーブ {}", wave).bold());
        for name in names {
            let Some(result) = report.get(name) else {
                continue;
            };
            let action = result
                .action
                .map(|a| format!(" [{}]", a))
                .unwrap_or_default();
            match &result.outcome {
                NodeOutcome::Succeeded { .. } => println!(
                    "  {} {} ({}){}",
                    "✓".green(),
                    name.cyan(),
                    result.resource_type,
                    action.dimmed()
                ),
                NodeOutcome::Failed { error, .. } => {
                    println!(
                        "  {} {} ({}){}",
                        "✗".red(),
                        name.cyan(),
                        result.resource_type,
                        action.dimmed()
                    );
                    println!("      {}", error.red());
                }
                NodeOutcome::Skipped { reason } => println!(
                    "  {} {} ({}) {}",
                    "-".yellow(),
                    name.cyan(),
                    result.resource_type,
                    format!("スキップ: {}", reason).yellow()
                ),
            }
        }
    }

    if !report.deleted.is_empty() {
        println!("{}", "削除".bold());
        for deleted in &report.deleted {
            match &deleted.error {
                None => println!("  {} {} ({})", "✓".green(), deleted.name, deleted.resource_type),
                Some(error) => {
                    println!("  {} {} ({})", "✗".red(), deleted.name, deleted.resource_type);
                    println!("      {}", error.red());
                }
            }
        }
    }
}
