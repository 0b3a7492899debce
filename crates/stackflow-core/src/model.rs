//! スタックのデータモデル

use serde::{Deserialize, Serialize};
use stackflow_engine::{Declaration, Reference, ResourceSchema};

/// スタックファイル全体
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stack {
    /// スタック名
    pub name: String,
    /// リソース宣言（宣言順）
    pub declarations: Vec<Declaration>,
    /// タイプごとの出力スキーマ
    pub schema: ResourceSchema,
    /// 評価後に公開する出力
    pub exports: Vec<Export>,
}

impl Stack {
    pub fn declaration(&self, name: &str) -> Option<&Declaration> {
        self.declarations.iter().find(|d| d.logical_name == name)
    }

    pub fn export(&self, name: &str) -> Option<&Export> {
        self.exports.iter().find(|e| e.name == name)
    }
}

/// 名前付きエクスポート
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Export {
    pub name: String,
    pub reference: Reference,
}
