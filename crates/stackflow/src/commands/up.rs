use colored::Colorize;
use stackflow_config::Settings;
use stackflow_core::LoadedStack;
use stackflow_engine::{Engine, EngineConfig, StateManager};
use std::path::Path;

pub async fn handle(file: Option<&Path>, dry_run: bool, parallel: Option<usize>) -> anyhow::Result<()> {
    let settings = Settings::load()?;
    tracing::debug!(?settings, "Loaded settings");

    let (path, loaded) = super::load(file)?;
    let manager = StateManager::new(super::project_root(&path));

    // ドライランでは状態を書き換えないのでロック不要
    let lock = if dry_run {
        None
    } else {
        Some(manager.acquire_lock().await?)
    };
    let prior = manager.load().await?;

    let LoadedStack { stack, graph, plan } = loaded;
    let provider = super::build_provider(&settings, dry_run, stack.schema.clone())?;
    let engine = Engine::new(provider)
        .with_config(EngineConfig {
            max_parallel: parallel.or(settings.engine.max_parallel),
        })
        .with_cancellation(super::cancel_on_ctrl_c());

    let mode = if dry_run { "（ドライラン）" } else { "" };
    println!(
        "{}",
        format!("スタック '{}' を適用中{}...", stack.name, mode).blue()
    );
    println!();

    let report = engine.run(graph, &plan, Some(&prior)).await?;
    super::print_report(&report);

    if !stack.exports.is_empty() {
        println!();
        println!("{}", "エクスポート".bold());
        for export in &stack.exports {
            let value = report
                .output(&export.reference)
                .map(super::format_value)
                .unwrap_or_else(|| "(未確定)".dimmed().to_string());
            println!("  {} = {}", export.name.cyan(), value);
        }
    }

    if !dry_run {
        let mut state = prior;
        state.apply_report(&report);
        manager.save(&state).await?;
    }
    if let Some(lock) = lock {
        lock.release().await?;
    }

    let summary = report.summary();
    println!();
    if report.cancelled {
        anyhow::bail!("中断されました: {}", summary);
    }
    if !report.is_success() {
        anyhow::bail!("適用に失敗しました: {}", summary);
    }
    println!(
        "{} ({}ms)",
        format!("✓ 適用が完了しました: {}", summary).green().bold(),
        report.duration_ms
    );

    Ok(())
}
