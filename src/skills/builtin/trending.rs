//! trending：联网搜索某领域的热门技术，并建议加入技能树

use futures_util::future::BoxFuture;
use serde_json::Value;

use super::{
    career_block, output_rules, search_block, skills_block, sources_from_search, stash_search,
    validation_error, Tools,
};
use crate::context::SkillContext;
use crate::error::SkillError;
use crate::skills::{
    ContextRequirements, ResponseSchema, SkillDefinition, SkillResult, SystemPrompt,
    TrendingResponse,
};
use crate::tools::{GRAPH_OPS_TOOL_ID, WEB_SEARCH_TOOL_ID};

fn schema() -> ResponseSchema {
    ResponseSchema::of::<TrendingResponse>("trending")
}

pub(super) fn skill() -> Result<SkillDefinition, SkillError> {
    SkillDefinition::new(
        "trending",
        "Trending Tech",
        "Find trending technologies in your field",
        SystemPrompt::Dynamic(system_prompt),
        schema(),
    )
    .with_slash_command("/trending")
    .with_aliases(["trends", "hot", "emerging"])
    .with_intent_patterns(&[
        r"(?i)\b(?:trending|trends?|emerging|in[- ]demand|hottest|cutting[- ]edge)\b",
        r"(?i)\bwhat(?:'s|\s+is|\s+are)\s+(?:new|hot|popular)\b",
    ])
    .map(|s| {
        s.with_context(ContextRequirements {
            needs_career_info: true,
            needs_skill_list: true,
            max_skills_in_context: 40,
            needs_chat_history: false,
            needs_user_maps: false,
            needs_node_ids: false,
            custom_builder: None,
        })
        .with_tools([WEB_SEARCH_TOOL_ID, GRAPH_OPS_TOOL_ID])
        .with_pre_execute(pre_execute)
        .with_post_process(post_process)
        .with_temperature(0.6)
        .with_max_tokens(3000)
    })
}

/// 搜索领域：斜杠参数 > 职业名
fn search_field(ctx: &SkillContext) -> String {
    ctx.route_param("args")
        .map(str::to_string)
        .unwrap_or_else(|| ctx.career_title_or("software development").to_string())
}

fn pre_execute(mut ctx: SkillContext, tools: Tools) -> BoxFuture<'static, SkillContext> {
    Box::pin(async move {
        let field = search_field(&ctx);
        stash_search(&mut ctx, &tools, &field, "trending").await;
        ctx
    })
}

fn system_prompt(ctx: &SkillContext) -> String {
    format!(
        "You are a technology trend analyst for career growth. Identify technologies, tools and \
         practices that are gaining momentum in \"{field}\" and propose adding the most relevant ones \
         to the user's skill tree.\n\n\
         {career}\n\n\
         Current skills in the tree:\n{skills}\n\n\
         Recent web search results:\n{search}\n\n\
         Rules:\n\
         - Suggest 2 to 5 trending skills the tree does not already contain, as \"addNodes\" \
         (unique lowercase hyphenated ids, level 1-5, progress 0, one emoji icon) with prerequisite edges \
         to existing skills where it makes sense.\n\
         - Explain in \"message\" why each one is trending.\n\
         - Cite the search results you relied on in \"sources\" (title and url). Never invent urls.\n\n\
         {rules}",
        field = search_field(ctx),
        career = career_block(ctx),
        skills = skills_block(ctx),
        search = search_block(ctx),
        rules = output_rules(ctx, &schema()),
    )
}

fn post_process(value: Value, ctx: &SkillContext) -> Result<SkillResult, SkillError> {
    let mut result = SkillResult::from_validated(value).map_err(validation_error("trending"))?;
    if result.sources.is_empty() {
        result.sources = sources_from_search(ctx);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ROUTE_PARAMS_KEY;
    use crate::skills::builtin::{SEARCH_RESULTS_KEY, SEARCH_SOURCES_KEY};
    use crate::tools::{ToolRegistry, WebSearchTool, NO_SEARCH_DATA};
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_search_field_prefers_slash_args() {
        let mut ctx = SkillContext {
            career_title: Some("Data Engineer".into()),
            ..Default::default()
        };
        assert_eq!(search_field(&ctx), "Data Engineer");
        ctx.custom_data
            .insert(ROUTE_PARAMS_KEY.into(), json!({"args": "rust"}));
        assert_eq!(search_field(&ctx), "rust");
    }

    #[tokio::test]
    async fn test_pre_execute_degrades_without_search_backend() {
        let mut tools = ToolRegistry::new();
        tools.register(WebSearchTool::unavailable());
        let ctx = pre_execute(SkillContext::default(), Arc::new(tools)).await;
        assert_eq!(ctx.custom_str(SEARCH_RESULTS_KEY), Some(NO_SEARCH_DATA));
        assert_eq!(ctx.custom_data[SEARCH_SOURCES_KEY], json!([]));

        let ctx = pre_execute(SkillContext::default(), Arc::new(ToolRegistry::new())).await;
        assert_eq!(ctx.custom_str(SEARCH_RESULTS_KEY), Some(NO_SEARCH_DATA));
    }

    #[test]
    fn test_post_process_fills_sources_from_search() {
        let mut ctx = SkillContext::default();
        ctx.custom_data.insert(
            SEARCH_SOURCES_KEY.into(),
            json!([{"title": "State of JS", "url": "https://stateofjs.com"}]),
        );
        let result = post_process(json!({"message": "Bun is rising"}), &ctx).unwrap();
        assert_eq!(result.sources.len(), 1);
        assert_eq!(result.sources[0].url, "https://stateofjs.com");
        assert!(result.modifications.is_empty());
    }
}
