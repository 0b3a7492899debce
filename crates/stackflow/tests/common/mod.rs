#![allow(deprecated)]

use assert_cmd::Command;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// 一時ディレクトリ上のプロジェクト
pub struct TestProject {
    pub root: TempDir,
    config_home: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().unwrap(),
            config_home: tempfile::tempdir().unwrap(),
        }
    }

    pub fn write_stack(&self, content: &str) {
        fs::write(self.stack_path(), content).unwrap();
    }

    pub fn stack_path(&self) -> PathBuf {
        self.root.path().join("stack.kdl")
    }

    /// .stackflow/state.json を直接書き込む
    pub fn write_state(&self, content: &str) {
        let dir = self.root.path().join(".stackflow");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("state.json"), content).unwrap();
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    /// ユーザー設定や認証情報の影響を受けないコマンド
    pub fn bare_command(&self) -> Command {
        let mut cmd = Command::cargo_bin("stack").unwrap();
        cmd.env("XDG_CONFIG_HOME", self.config_home.path())
            .env("NO_COLOR", "1")
            .env_remove("STACKFLOW_STACK_PATH")
            .env_remove("STACKFLOW_MAX_PARALLEL")
            .env_remove("DANUBEDATA_API_TOKEN")
            .env_remove("DANUBEDATA_BASE_URL")
            .env_remove("RUST_LOG");
        cmd
    }

    /// -f でスタックファイルを指定したコマンド
    pub fn command(&self) -> Command {
        let mut cmd = self.bare_command();
        cmd.arg("-f").arg(self.stack_path());
        cmd
    }
}
