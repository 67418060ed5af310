//! 上下文构造器：按技能声明的需求裁剪 FullContext，控制 prompt 体积
//!
//! 默认策略：locale 始终保留；职业信息、技能列表（压缩 + 截断）、最近 N 条对话、
//! 用户其他技能图按 flags 注入。技能若提供 custom_builder，则完全由其接管。

use serde_json::Value;

use crate::context::{
    FullContext, SkillContext, SkillNode, SkillSummary, UserMap, EXISTING_NODE_IDS_KEY,
};
use crate::skills::SkillDefinition;

/// 注入 prompt 的最近对话条数
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// 上下文构造器（无状态，可跨调用共享）
#[derive(Debug, Clone, Copy)]
pub struct ContextBuilder {
    history_limit: usize,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl ContextBuilder {
    pub fn new(history_limit: usize) -> Self {
        Self { history_limit }
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// 为指定技能构造最小上下文；不修改 full
    pub fn build(&self, skill: &SkillDefinition, full: &FullContext) -> SkillContext {
        let req = &skill.context;
        if let Some(custom) = req.custom_builder {
            return custom(full);
        }

        let mut ctx = SkillContext {
            locale: full.locale.clone(),
            ..SkillContext::default()
        };

        if req.needs_career_info {
            ctx.career_title = Some(full.career_title.clone());
            ctx.career_description = Some(full.career_description.clone());
        }

        if req.needs_skill_list {
            let mut skills = summarize_skills(&full.nodes);
            if req.max_skills_in_context > 0 {
                skills.truncate(req.max_skills_in_context);
            }
            ctx.skills = Some(skills);
        }

        if req.needs_chat_history {
            let start = full.chat_history.len().saturating_sub(self.history_limit);
            ctx.chat_history = Some(full.chat_history[start..].to_vec());
        }

        if req.needs_user_maps {
            ctx.user_maps = Some(full.user_maps.clone());
        }

        if req.needs_node_ids {
            let ids = full.nodes.iter().map(|n| Value::String(n.id.clone())).collect();
            ctx.custom_data
                .insert(EXISTING_NODE_IDS_KEY.to_string(), Value::Array(ids));
        }

        ctx
    }
}

/// 压缩节点列表：只保留 id / name / level / category
pub fn summarize_skills(nodes: &[SkillNode]) -> Vec<SkillSummary> {
    nodes
        .iter()
        .map(|n| SkillSummary {
            id: n.id.clone(),
            name: n.name.clone(),
            level: n.level,
            category: n.category.clone(),
        })
        .collect()
}

/// 技能列表的 prompt 片段（每行一条）
pub fn format_skills_for_prompt(skills: &[SkillSummary]) -> String {
    if skills.is_empty() {
        return "(no skills yet)".to_string();
    }
    skills
        .iter()
        .map(|s| {
            if s.category.is_empty() {
                format!("- {} (id: {}, level {})", s.name, s.id, s.level)
            } else {
                format!(
                    "- {} (id: {}, level {}, {})",
                    s.name, s.id, s.level, s.category
                )
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// 用户其他技能图的 prompt 片段
pub fn format_user_maps(maps: &[UserMap]) -> String {
    if maps.is_empty() {
        return "(no other maps)".to_string();
    }
    maps.iter()
        .map(|m| {
            if m.career_title.is_empty() {
                format!("- {} (id: {})", m.title, m.id)
            } else {
                format!("- {} [{}] (id: {})", m.title, m.career_title, m.id)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// 粗略估算上下文的 token 数：序列化后的字符数 / 4（仅用于诊断）
pub fn estimate_tokens(ctx: &SkillContext) -> usize {
    serde_json::to_string(ctx)
        .map(|s| s.chars().count() / 4)
        .unwrap_or(0)
}
