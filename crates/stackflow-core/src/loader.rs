//! 統合ローダー
//!
//! パース、グラフ構築、エクスポート検証を統合

use crate::error::Result;
use crate::model::Stack;
use crate::parser::parse_stack_file;
use stackflow_engine::{EvaluationPlan, GraphBuilder, ResourceGraph};
use std::path::Path;
use tracing::{debug, info, instrument};

/// 検証済みのスタック
#[derive(Debug, Clone)]
pub struct LoadedStack {
    pub stack: Stack,
    pub graph: ResourceGraph,
    pub plan: EvaluationPlan,
}

/// スタックファイルを読み込んで検証
///
/// 以下の処理を実行:
/// 1. KDLパース
/// 2. グラフ構築（スキーマ検証・循環検出）
/// 3. ウェーブ分割
/// 4. エクスポートの参照検証
#[instrument(fields(path = %path.display()))]
pub fn load_stack(path: &Path) -> Result<LoadedStack> {
    debug!("Step 1: Parsing KDL");
    let stack = parse_stack_file(path)?;
    build_stack(stack)
}

/// パース済みのスタックからグラフと実行計画を構築
pub fn build_stack(stack: Stack) -> Result<LoadedStack> {
    debug!("Step 2: Building resource graph");
    let graph = GraphBuilder::new()
        .with_schema(stack.schema.clone())
        .build(stack.declarations.clone())?;

    debug!("Step 3: Scheduling waves");
    let plan = EvaluationPlan::schedule(&graph)?;

    debug!("Step 4: Checking exports");
    for export in &stack.exports {
        graph.check_reference(&export.reference)?;
    }

    info!(
        resources = graph.len(),
        waves = plan.len(),
        "Stack '{}' loaded successfully",
        stack.name
    );
    Ok(LoadedStack { stack, graph, plan })
}
