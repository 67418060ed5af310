//! 技能共享的响应 schema 与调用方结果类型
//!
//! 模型输出使用 camelCase 字段（与前端一致）。`modifications` 省略或为 null 时统一规范化为空集合，
//! 调用方只需判断 `is_empty()`。

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

use crate::context::{SkillEdge, SkillNode};
use crate::skills::MatchType;
use crate::tools::graph_ops::{self, GraphApplication};

/// 节点的部分字段补丁
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SkillNodePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prerequisites: Option<Vec<String>>,
}

impl SkillNodePatch {
    pub fn apply(&self, node: &mut SkillNode) {
        if let Some(v) = &self.name {
            node.name = v.clone();
        }
        if let Some(v) = &self.description {
            node.description = v.clone();
        }
        if let Some(v) = &self.icon {
            node.icon = v.clone();
        }
        if let Some(v) = self.level {
            node.level = v;
        }
        if let Some(v) = &self.category {
            node.category = v.clone();
        }
        if let Some(v) = self.progress {
            node.progress = v;
        }
        if let Some(v) = &self.prerequisites {
            node.prerequisites = v.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeUpdate {
    pub id: String,
    #[serde(default)]
    pub updates: SkillNodePatch,
}

/// 技能图修改集：引擎唯一被授权提出的变更，由调用方负责落库
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SkillModifications {
    #[serde(default)]
    pub add_nodes: Vec<SkillNode>,
    #[serde(default)]
    pub update_nodes: Vec<NodeUpdate>,
    #[serde(default)]
    pub remove_nodes: Vec<String>,
    #[serde(default)]
    pub add_edges: Vec<SkillEdge>,
    #[serde(default)]
    pub remove_edges: Vec<String>,
}

impl SkillModifications {
    pub fn is_empty(&self) -> bool {
        self.add_nodes.is_empty()
            && self.update_nodes.is_empty()
            && self.remove_nodes.is_empty()
            && self.add_edges.is_empty()
            && self.remove_edges.is_empty()
    }

    /// 把修改集应用到现有节点/边上（不修改入参），并报告悬挂边
    pub fn apply_to(&self, nodes: &[SkillNode], edges: &[SkillEdge]) -> GraphApplication {
        graph_ops::apply_modifications(nodes, edges, self)
    }
}

/// 学习资源
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LearningResource {
    pub title: String,
    pub url: String,
    /// course / documentation / video / book / article / tutorial
    #[serde(rename = "type", default = "default_resource_kind")]
    pub kind: String,
    #[serde(default)]
    pub description: String,
}

fn default_resource_kind() -> String {
    "article".to_string()
}

/// 搜索结果引用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SourceCitation {
    pub title: String,
    pub url: String,
}

/// null 与缺省都视为默认值
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// expand：必须给出修改集
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModificationResponse {
    /// 给用户看的简短说明
    pub message: String,
    pub modifications: SkillModifications,
    #[serde(default)]
    pub is_off_topic: bool,
}

/// chat：修改集可省略（闲聊、离题时）
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OptionalModificationResponse {
    pub message: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub modifications: SkillModifications,
    #[serde(default)]
    pub is_off_topic: bool,
}

/// trending：修改集可省略，附带搜索来源
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrendingResponse {
    pub message: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub modifications: SkillModifications,
    #[serde(default)]
    pub sources: Vec<SourceCitation>,
    #[serde(default)]
    pub is_off_topic: bool,
}

/// resources：资源列表必填
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesResponse {
    pub message: String,
    pub resources: Vec<LearningResource>,
    #[serde(default)]
    pub sources: Vec<SourceCitation>,
    #[serde(default)]
    pub is_off_topic: bool,
}

/// 调用方结果：所有技能共用的形状，未使用的字段为空
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SkillResult {
    /// 产生该结果的技能 id（由 Engine 填写）
    #[serde(default)]
    pub skill_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_type: Option<MatchType>,
    pub message: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub modifications: SkillModifications,
    #[serde(default)]
    pub resources: Vec<LearningResource>,
    #[serde(default)]
    pub sources: Vec<SourceCitation>,
    #[serde(default)]
    pub is_off_topic: bool,
}

impl SkillResult {
    /// 由已通过 schema 校验的对象构造结果（无 postProcess 时使用）
    pub fn from_validated(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::ResponseSchema;
    use serde_json::json;

    #[test]
    fn test_omitted_and_null_modifications_normalize_to_empty() {
        let schema = ResponseSchema::of::<OptionalModificationResponse>("chat");
        for raw in [
            json!({"message": "Sorry, off topic", "isOffTopic": true}),
            json!({"message": "Sorry, off topic", "isOffTopic": true, "modifications": null}),
        ] {
            let validated = schema.validate(raw).unwrap();
            let result = SkillResult::from_validated(validated).unwrap();
            assert!(result.is_off_topic);
            assert!(result.modifications.is_empty());
        }
    }

    #[test]
    fn test_expand_schema_requires_modifications() {
        let schema = ResponseSchema::of::<ModificationResponse>("expand");
        let err = schema.validate(json!({"message": "hi"})).unwrap_err();
        assert!(err.contains("modifications"));
        assert!(schema
            .validate(json!({"message": "hi", "modifications": {}}))
            .is_ok());
    }

    #[test]
    fn test_resource_kind_uses_type_field() {
        let schema = ResponseSchema::of::<ResourcesResponse>("resources");
        let validated = schema
            .validate(json!({
                "message": "Here you go",
                "resources": [
                    {"title": "Rust Book", "url": "https://doc.rust-lang.org/book/", "type": "book"},
                    {"title": "Blog", "url": "https://example.com"}
                ]
            }))
            .unwrap();
        let result = SkillResult::from_validated(validated).unwrap();
        assert_eq!(result.resources[0].kind, "book");
        assert_eq!(result.resources[1].kind, "article");
    }

    #[test]
    fn test_patch_applies_only_present_fields() {
        let mut node = SkillNode {
            id: "react".into(),
            name: "React".into(),
            description: "UI library".into(),
            icon: String::new(),
            level: 2,
            category: "Framework".into(),
            progress: 10,
            prerequisites: vec![],
        };
        SkillNodePatch {
            level: Some(4),
            progress: Some(80),
            ..Default::default()
        }
        .apply(&mut node);
        assert_eq!(node.level, 4);
        assert_eq!(node.progress, 80);
        assert_eq!(node.name, "React");
    }
}
