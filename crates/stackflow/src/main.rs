mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stack")]
#[command(about = "宣言する。つながる。インフラは依存の順に立ち上がる。", long_about = None)]
struct Cli {
    /// スタックファイル（省略時は stack.kdl を探索）
    #[arg(short = 'f', long = "file", env = "STACKFLOW_STACK_PATH", global = true)]
    file: Option<PathBuf>,

    /// 詳細なログを出力
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// スタックファイルを検証
    Validate,
    /// 実行計画を表示（プロバイダーは呼び出さない）
    Plan,
    /// スタックを適用
    Up {
        /// シミュレーションのみ（API呼び出し・状態保存なし）
        #[arg(long)]
        dry_run: bool,
        /// ウェーブ内の最大並列数
        #[arg(short, long)]
        parallel: Option<usize>,
    },
    /// 状態ファイルに記録された全リソースを削除
    Down,
    /// エクスポートされた出力を表示
    Outputs {
        /// JSON形式で出力
        #[arg(long)]
        json: bool,
    },
    /// バージョン情報を表示
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let file = cli.file.as_deref();
    match cli.command {
        Commands::Validate => commands::validate::handle(file)?,
        Commands::Plan => commands::plan::handle(file).await?,
        Commands::Up { dry_run, parallel } => {
            commands::up::handle(file, dry_run, parallel).await?;
        }
        Commands::Down => commands::down::handle(file).await?,
        Commands::Outputs { json } => commands::outputs::handle(file, json).await?,
        Commands::Version => {
            println!("stackflow {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
