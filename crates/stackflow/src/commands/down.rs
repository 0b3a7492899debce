use colored::Colorize;
use stackflow_config::Settings;
use stackflow_engine::{Engine, StateManager};
use std::path::Path;

pub async fn handle(file: Option<&Path>) -> anyhow::Result<()> {
    // スタックファイルがなくても状態ファイルがあれば削除できる
    let root = match super::resolve_stack_path(file) {
        Ok(path) => super::project_root(&path),
        Err(e) => {
            tracing::debug!("No stack file ({}), using current directory", e);
            std::env::current_dir()?
        }
    };
    let manager = StateManager::new(&root);

    let lock = manager.acquire_lock().await?;
    let mut state = manager.load().await?;
    if state.is_empty() {
        println!("{}", "削除するリソースはありません".yellow());
        lock.release().await?;
        return Ok(());
    }

    let settings = Settings::load()?;
    let provider = super::build_provider(&settings, false, Default::default())?;
    let engine = Engine::new(provider).with_cancellation(super::cancel_on_ctrl_c());

    println!(
        "{}",
        format!("{}個のリソースを削除中...", state.resources.len()).blue()
    );
    let deleted = engine.destroy_all(&state).await;

    let mut failed = 0;
    for result in &deleted {
        match &result.error {
            None => {
                println!("  {} {} ({})", "✓".green(), result.name, result.resource_type);
                state.remove_resource(&result.name);
            }
            Some(error) => {
                failed += 1;
                println!("  {} {} ({})", "✗".red(), result.name, result.resource_type);
                println!("      {}", error.red());
            }
        }
    }

    manager.save(&state).await?;
    lock.release().await?;

    if failed > 0 || !state.is_empty() {
        anyhow::bail!(
            "{}個のリソースが残っています（失敗: {}個）",
            state.resources.len(),
            failed
        );
    }
    println!("{}", "✓ すべてのリソースを削除しました".green().bold());
    Ok(())
}
