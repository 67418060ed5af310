//! 内置技能：expand / trending / resources / chat（兜底）
//!
//! 注册顺序即意图匹配顺序。

mod chat;
mod expand;
mod resources;
mod trending;

use std::sync::Arc;

use serde_json::{json, Value};

use crate::context::{format_skills_for_prompt, format_user_maps, SkillContext};
use crate::error::SkillError;
use crate::skills::{ResponseSchema, SkillDefinition, SkillRouter, SourceCitation};
use crate::tools::{SearchHit, ToolRegistry, NO_SEARCH_DATA, WEB_SEARCH_TOOL_ID};

/// custom_data 键：格式化后的搜索文本
pub const SEARCH_RESULTS_KEY: &str = "searchResults";
/// custom_data 键：搜索结果的 title/url 列表
pub const SEARCH_SOURCES_KEY: &str = "searchSources";

/// 按注册顺序返回内置技能
pub fn builtin_skills() -> Result<Vec<SkillDefinition>, SkillError> {
    Ok(vec![
        expand::skill()?,
        trending::skill()?,
        resources::skill()?,
        chat::skill(),
    ])
}

/// 由内置技能构建的路由表
pub fn default_router() -> Result<SkillRouter, SkillError> {
    SkillRouter::new(builtin_skills()?)
}

fn validation_error(skill: &'static str) -> impl Fn(serde_json::Error) -> SkillError {
    move |e| SkillError::ResponseValidation {
        skill: skill.to_string(),
        detail: e.to_string(),
    }
}

fn career_block(ctx: &SkillContext) -> String {
    let title = ctx.career_title_or("(unspecified career)");
    match ctx.career_description.as_deref().map(str::trim) {
        Some(desc) if !desc.is_empty() => format!("Career: {title}\nDescription: {desc}"),
        _ => format!("Career: {title}"),
    }
}

fn skills_block(ctx: &SkillContext) -> String {
    format_skills_for_prompt(ctx.skills.as_deref().unwrap_or_default())
}

fn user_maps_block(ctx: &SkillContext) -> String {
    format_user_maps(ctx.user_maps.as_deref().unwrap_or_default())
}

fn search_block(ctx: &SkillContext) -> &str {
    ctx.custom_str(SEARCH_RESULTS_KEY).unwrap_or(NO_SEARCH_DATA)
}

fn output_rules(ctx: &SkillContext, schema: &ResponseSchema) -> String {
    let locale = if ctx.locale.trim().is_empty() {
        "en"
    } else {
        ctx.locale.trim()
    };
    format!(
        "Write the \"message\" field in the language of locale \"{locale}\".\n\
         If the request has nothing to do with careers, skills or learning, set \"isOffTopic\" to true, \
         reply with a short polite redirect and propose no changes.\n\
         Respond ONLY with a single JSON object matching this JSON Schema:\n{}",
        schema.describe()
    )
}

/// 通过注册表调用 web-search，把文本与来源写入 custom_data；任何失败都降级
async fn stash_search(ctx: &mut SkillContext, tools: &ToolRegistry, query: &str, mode: &str) {
    let params = json!({ "query": query, "mode": mode });
    let (text, hits) = match tools.execute_tool(WEB_SEARCH_TOOL_ID, params).await {
        Ok(out) => {
            let text = out
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or(NO_SEARCH_DATA)
                .to_string();
            let hits: Vec<SearchHit> = out
                .get("results")
                .cloned()
                .and_then(|r| serde_json::from_value(r).ok())
                .unwrap_or_default();
            (text, hits)
        }
        Err(e) => {
            tracing::warn!(error = %e, "web search unavailable, continuing without results");
            (NO_SEARCH_DATA.to_string(), Vec::new())
        }
    };

    let sources: Vec<SourceCitation> = hits
        .into_iter()
        .map(|h| SourceCitation {
            title: h.title,
            url: h.url,
        })
        .collect();
    ctx.custom_data
        .insert(SEARCH_RESULTS_KEY.to_string(), Value::String(text));
    ctx.custom_data
        .insert(SEARCH_SOURCES_KEY.to_string(), json!(sources));
}

/// 模型未给出来源时，用搜索结果补齐
fn sources_from_search(ctx: &SkillContext) -> Vec<SourceCitation> {
    ctx.custom_data
        .get(SEARCH_SOURCES_KEY)
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

/// preExecute 中读取工具注册表的共享句柄
type Tools = Arc<ToolRegistry>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::MatchType;

    #[test]
    fn test_builtin_registry_is_valid() {
        let router = default_router().unwrap();
        assert_eq!(router.fallback().id, "chat");
        let commands: Vec<String> = router
            .list_commands()
            .into_iter()
            .map(|c| c.command)
            .collect();
        assert_eq!(commands, vec!["/chat", "/expand", "/resources", "/trending"]);
    }

    #[test]
    fn test_builtin_intent_routing() {
        let router = default_router().unwrap();
        let cases = [
            ("add more testing skills", "expand", MatchType::Intent),
            ("Expand my tree with cloud topics", "expand", MatchType::Intent),
            ("what's trending in data engineering?", "trending", MatchType::Intent),
            ("any emerging tools I should know", "trending", MatchType::Intent),
            ("resources for learning Rust", "resources", MatchType::Intent),
            ("How do I learn Kubernetes?", "resources", MatchType::Intent),
            ("hello there", "chat", MatchType::Fallback),
            ("/trending", "trending", MatchType::SlashCommand),
            ("/learn react", "resources", MatchType::SlashCommand),
        ];
        for (message, skill, match_type) in cases {
            let r = router.route(message);
            assert_eq!(r.skill.id, skill, "message {message:?}");
            assert_eq!(r.match_type, match_type, "message {message:?}");
        }

        let r = router.route("How do I learn Kubernetes?");
        assert_eq!(r.params.unwrap()["skill"], "Kubernetes");
    }
}
