//! 技能图操作：应用修改集、生成节点 / 边 id、检查悬挂边
//!
//! 应用顺序固定：删节点（连同关联边）→ 更新节点 → 追加节点 → 删边 → 追加边。
//! 先删后加，避免 id 冲突与悬挂边。

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::{SkillEdge, SkillNode};
use crate::error::ToolError;
use crate::skills::SkillModifications;
use crate::tools::schema::{check_params, parameters_schema, parse_params};
use crate::tools::Tool;

pub const GRAPH_OPS_TOOL_ID: &str = "graph-ops";

/// 应用修改集后的结果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphApplication {
    pub nodes: Vec<SkillNode>,
    pub edges: Vec<SkillEdge>,
    /// 因 id 已存在而跳过的新增节点
    pub skipped_nodes: Vec<String>,
    /// 引用了不存在节点的边
    pub dangling_edges: Vec<SkillEdge>,
}

impl GraphApplication {
    pub fn is_consistent(&self) -> bool {
        self.dangling_edges.is_empty()
    }
}

/// 将修改集应用到节点/边列表（不修改入参）
pub fn apply_modifications(
    nodes: &[SkillNode],
    edges: &[SkillEdge],
    mods: &SkillModifications,
) -> GraphApplication {
    let removed: HashSet<&str> = mods.remove_nodes.iter().map(String::as_str).collect();

    let mut nodes: Vec<SkillNode> = nodes
        .iter()
        .filter(|n| !removed.contains(n.id.as_str()))
        .cloned()
        .collect();
    for node in &mut nodes {
        node.prerequisites.retain(|p| !removed.contains(p.as_str()));
    }
    let mut edges: Vec<SkillEdge> = edges
        .iter()
        .filter(|e| !removed.contains(e.source.as_str()) && !removed.contains(e.target.as_str()))
        .cloned()
        .collect();

    for update in &mods.update_nodes {
        match nodes.iter_mut().find(|n| n.id == update.id) {
            Some(node) => update.updates.apply(node),
            None => tracing::warn!(node = %update.id, "update for unknown node ignored"),
        }
    }

    let mut skipped_nodes = Vec::new();
    for node in &mods.add_nodes {
        if nodes.iter().any(|n| n.id == node.id) {
            tracing::warn!(node = %node.id, "added node collides with existing id, skipped");
            skipped_nodes.push(node.id.clone());
        } else {
            nodes.push(node.clone());
        }
    }

    let removed_edges: HashSet<&str> = mods.remove_edges.iter().map(String::as_str).collect();
    edges.retain(|e| !removed_edges.contains(e.id.as_str()));

    for edge in &mods.add_edges {
        let mut edge = edge.clone();
        if edge.id.is_empty() {
            edge.id = edge_id(&edge.source, &edge.target);
        }
        if !edges.iter().any(|e| e.id == edge.id) {
            edges.push(edge);
        }
    }

    let dangling_edges = dangling_edges(&nodes, &edges).into_iter().cloned().collect();

    GraphApplication {
        nodes,
        edges,
        skipped_nodes,
        dangling_edges,
    }
}

/// 由名称生成小写连字符 id，与 existing 冲突时追加 -2、-3 …
pub fn generate_node_id(name: &str, existing: &HashSet<String>) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    let base = if slug.is_empty() { "skill" } else { slug };

    if !existing.contains(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !existing.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// 确定性的边 id
pub fn edge_id(source: &str, target: &str) -> String {
    format!("{source}-to-{target}")
}

/// 引用了不存在节点的边
pub fn dangling_edges<'a>(nodes: &[SkillNode], edges: &'a [SkillEdge]) -> Vec<&'a SkillEdge> {
    let ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    edges
        .iter()
        .filter(|e| !ids.contains(e.source.as_str()) || !ids.contains(e.target.as_str()))
        .collect()
}

/// 所有边都引用已存在的节点
pub fn validate_edges(nodes: &[SkillNode], edges: &[SkillEdge]) -> bool {
    dangling_edges(nodes, edges).is_empty()
}

/// graph-ops 工具参数
#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
struct GraphOpsParams {
    /// apply / validate
    operation: String,
    #[serde(default)]
    nodes: Vec<SkillNode>,
    #[serde(default)]
    edges: Vec<SkillEdge>,
    #[serde(default)]
    modifications: Option<SkillModifications>,
}

/// 以工具形式暴露图操作，供 hook 通过注册表调用
#[derive(Debug, Default)]
pub struct GraphOpsTool;

#[async_trait]
impl Tool for GraphOpsTool {
    fn id(&self) -> &str {
        GRAPH_OPS_TOOL_ID
    }

    fn description(&self) -> &str {
        "Apply a skill-graph modification set or check edges for dangling references. Params: {\"operation\": \"apply\"|\"validate\", \"nodes\": [...], \"edges\": [...], \"modifications\": {...}}"
    }

    fn parameters_schema(&self) -> Option<Value> {
        Some(parameters_schema::<GraphOpsParams>())
    }

    fn validate_params(&self, params: &Value) -> Result<(), String> {
        check_params::<GraphOpsParams>(params)
    }

    async fn execute(&self, params: Value) -> Result<Value, ToolError> {
        let params: GraphOpsParams = parse_params(GRAPH_OPS_TOOL_ID, params)?;

        let failed = |e: serde_json::Error| ToolError::Failed {
            tool: GRAPH_OPS_TOOL_ID.to_string(),
            detail: e.to_string(),
        };

        match params.operation.as_str() {
            "apply" => {
                let mods = params.modifications.unwrap_or_default();
                let applied = apply_modifications(&params.nodes, &params.edges, &mods);
                serde_json::to_value(applied).map_err(failed)
            }
            "validate" => {
                let dangling: Vec<&str> = dangling_edges(&params.nodes, &params.edges)
                    .into_iter()
                    .map(|e| e.id.as_str())
                    .collect();
                Ok(serde_json::json!({
                    "valid": dangling.is_empty(),
                    "danglingEdges": dangling,
                }))
            }
            other => Err(ToolError::InvalidParams {
                tool: GRAPH_OPS_TOOL_ID.to_string(),
                detail: format!("unknown operation `{other}`"),
            }),
        }
    }
}
