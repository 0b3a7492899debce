//! StackFlow 設定管理
//!
//! スタックファイルの探索とユーザー設定の読み込み。

pub mod error;
pub mod settings;

pub use error::*;
pub use settings::{EngineSettings, ProviderSettings, Settings};

use std::path::{Path, PathBuf};

/// スタックファイルのパスを直接指定する環境変数
pub const ENV_STACK_PATH: &str = "STACKFLOW_STACK_PATH";

/// プロジェクト内の状態・設定ディレクトリ
pub const PROJECT_DIR: &str = ".stackflow";

/// 探索するファイル名（優先順）
const CANDIDATES: [&str; 4] = ["stack.local.kdl", ".stack.local.kdl", "stack.kdl", ".stack.kdl"];

/// StackFlowの設定ディレクトリを取得
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("stackflow");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// カレントディレクトリを起点にスタックファイルを探す
pub fn find_stack_file() -> Result<PathBuf> {
    let current_dir = std::env::current_dir()?;
    find_stack_file_from(&current_dir)
}

/// `base` を起点にスタックファイルを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 STACKFLOW_STACK_PATH (直接パス指定)
/// 2. `base`: stack.local.kdl, .stack.local.kdl, stack.kdl, .stack.kdl
/// 3. `base`/.stackflow/ ディレクトリ内: 同様の順序
/// 4. ~/.config/stackflow/stack.kdl (グローバル設定)
pub fn find_stack_file_from(base: &Path) -> Result<PathBuf> {
    if let Ok(path) = std::env::var(ENV_STACK_PATH) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!(
            "{} points to a missing file: {}",
            ENV_STACK_PATH,
            path.display()
        );
    }

    let found = search_dir(base)
        .or_else(|| search_dir(&base.join(PROJECT_DIR)))
        .or_else(|| {
            dirs::config_dir()
                .map(|dir| dir.join("stackflow").join("stack.kdl"))
                .filter(|path| path.is_file())
        });

    match found {
        Some(path) => {
            tracing::debug!("Using stack file {}", path.display());
            Ok(path)
        }
        None => Err(ConfigError::StackFileNotFound),
    }
}

fn search_dir(dir: &Path) -> Option<PathBuf> {
    if !dir.is_dir() {
        return None;
    }
    CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}
