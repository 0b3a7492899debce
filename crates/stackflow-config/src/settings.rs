//! ユーザー設定 (~/.config/stackflow/config.yaml)
//!
//! ```yaml
//! provider:
//!   base_url: https://danubedata.ro/api/v1
//!   api_token: xxxxx
//!   timeout_secs: 60
//! engine:
//!   max_parallel: 4
//! ```

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_BASE_URL: &str = "https://danubedata.ro/api/v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

pub const ENV_API_TOKEN: &str = "DANUBEDATA_API_TOKEN";
pub const ENV_BASE_URL: &str = "DANUBEDATA_BASE_URL";
pub const ENV_MAX_PARALLEL: &str = "STACKFLOW_MAX_PARALLEL";

const SETTINGS_FILE: &str = "config.yaml";

/// 全体設定
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub provider: ProviderSettings,
    pub engine: EngineSettings,
}

/// クラウドAPI設定
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

// トークンはログに出さない
impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("base_url", &self.base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "********"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// 評価エンジン設定
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_parallel: Option<usize>,
}

impl Settings {
    /// 設定ファイルと環境変数から読み込む
    ///
    /// 設定ファイルが存在しない場合はデフォルト値を使用します。
    pub fn load() -> Result<Self> {
        let mut settings = match dirs::config_dir() {
            Some(dir) => {
                let path = dir.join("stackflow").join(SETTINGS_FILE);
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
            None => Self::default(),
        };
        settings.apply_env()?;
        Ok(settings)
    }

    /// YAMLファイルから読み込む（環境変数は適用しない）
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// 環境変数で上書き
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(token) = std::env::var(ENV_API_TOKEN)
            && !token.is_empty()
        {
            self.provider.api_token = Some(token);
        }
        if let Ok(url) = std::env::var(ENV_BASE_URL)
            && !url.is_empty()
        {
            self.provider.base_url = url;
        }
        if let Ok(value) = std::env::var(ENV_MAX_PARALLEL) {
            let parsed = value
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidValue {
                    key: ENV_MAX_PARALLEL.to_string(),
                    value: value.clone(),
                })?;
            self.engine.max_parallel = Some(parsed);
        }
        Ok(())
    }
}
