use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StackError {
    #[error("KDLパースエラー: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("ファイル読み込みエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("スタックファイルを読み込めません: {path}\n理由: {message}")]
    ReadError { path: PathBuf, message: String },

    #[error("無効な設定: {0}")]
    InvalidConfig(String),

    #[error("無効な参照 '{reference}' ({context})\nヒント: 参照は \"リソース名.出力名\" の形式で指定してください")]
    InvalidReference { context: String, reference: String },

    #[error("エクスポート '{0}' が重複しています")]
    DuplicateExport(String),

    #[error(transparent)]
    Graph(#[from] stackflow_engine::EngineError),
}

pub type Result<T> = std::result::Result<T, StackError>;
