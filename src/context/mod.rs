//! 上下文层：完整应用上下文（调用方传入）与按技能裁剪后的最小上下文
//!
//! - **FullContext**: 职业信息、当前技能节点/边、完整对话历史、用户的其他技能图
//! - **SkillContext**: 仅包含技能声明需要的字段，外加 preExecute 可写入的 custom_data
//! - **builder**: 默认裁剪策略与 prompt 片段格式化

pub mod builder;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::llm::Message;

pub use builder::{
    estimate_tokens, format_skills_for_prompt, format_user_maps, summarize_skills,
    ContextBuilder, DEFAULT_HISTORY_LIMIT,
};

/// 技能树节点（由持久层拥有，引擎只读取并提出修改）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SkillNode {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    /// 难度等级 1-5
    #[serde(default)]
    pub level: u8,
    #[serde(default)]
    pub category: String,
    /// 掌握进度 0-100
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub prerequisites: Vec<String>,
}

/// 前置关系边：source 是 target 的前置技能
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SkillEdge {
    #[serde(default)]
    pub id: String,
    pub source: String,
    pub target: String,
}

/// 用户保存的其他技能图（仅用于提示模型避免重复）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMap {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub career_title: String,
}

/// 压缩后的节点：只保留展示所需字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillSummary {
    pub id: String,
    pub name: String,
    pub level: u8,
    pub category: String,
}

/// 调用方可见的完整上下文
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FullContext {
    pub locale: String,
    pub career_title: String,
    pub career_description: String,
    pub nodes: Vec<SkillNode>,
    pub edges: Vec<SkillEdge>,
    pub chat_history: Vec<Message>,
    pub user_maps: Vec<UserMap>,
}

/// 单次调用内按技能裁剪的上下文；未声明的字段保持 None
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillContext {
    pub locale: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub career_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub career_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills: Option<Vec<SkillSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_history: Option<Vec<Message>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_maps: Option<Vec<UserMap>>,
    /// 开放数据袋：路由参数（routeParams）、工具结果（如 searchResults）
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub custom_data: Map<String, Value>,
}

/// custom_data 中路由参数所在的键
pub const ROUTE_PARAMS_KEY: &str = "routeParams";

/// custom_data 中全部现有节点 id 所在的键
pub const EXISTING_NODE_IDS_KEY: &str = "existingNodeIds";

impl SkillContext {
    pub fn custom_str(&self, key: &str) -> Option<&str> {
        self.custom_data.get(key).and_then(Value::as_str)
    }

    /// 读取路由提取的参数（斜杠命令的 args 或意图匹配的命名捕获组）
    pub fn route_param(&self, key: &str) -> Option<&str> {
        self.custom_data
            .get(ROUTE_PARAMS_KEY)
            .and_then(|p| p.get(key))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// 读取 existingNodeIds；未注入时为空
    pub fn existing_node_ids(&self) -> impl Iterator<Item = &str> {
        self.custom_data
            .get(EXISTING_NODE_IDS_KEY)
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
    }

    pub fn career_title_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.career_title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(fallback)
    }

    /// 用 `declared` 中已声明的字段补回被 hook 清空的字段（hook 只允许追加 custom_data）
    pub(crate) fn restore_declared_from(&mut self, declared: &SkillContext) {
        if self.career_title.is_none() {
            self.career_title = declared.career_title.clone();
        }
        if self.career_description.is_none() {
            self.career_description = declared.career_description.clone();
        }
        if self.skills.is_none() {
            self.skills = declared.skills.clone();
        }
        if self.chat_history.is_none() {
            self.chat_history = declared.chat_history.clone();
        }
        if self.user_maps.is_none() {
            self.user_maps = declared.user_maps.clone();
        }
    }
}
